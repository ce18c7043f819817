//! # texpaper worker
//!
//! Runs texpaper parses off the calling thread.
//!
//! A [`ParseWorker`] is one OS thread owning one [`texpaper_core::Parser`].
//! It takes [`WorkerRequest`]s from a channel and answers each with a
//! [`WorkerResponse`] carrying the same id, strictly one request at a time.
//! A [`WorkerHost`] wraps a worker behind an async `parse` call that
//! correlates responses by id, and a [`WorkerPool`] spreads documents over
//! several hosts.
//!
//! ```rust
//! use texpaper_core::Options;
//! use texpaper_worker::WorkerHost;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let host = WorkerHost::new(Options::default());
//! let rendered = host.parse(r"Let $x$ be \emph{small}.").await.unwrap();
//! assert!(rendered.html.contains(r"<p>Let \(x\) be <em>small</em>.</p>"));
//! # }
//! ```

pub mod error;
pub mod host;
pub mod message;
pub mod pool;
pub mod worker;

pub use error::{HostError, WorkerError};
pub use host::{Rendered, WorkerHost};
pub use message::{Diagnostic, WorkerRequest, WorkerResponse};
pub use pool::WorkerPool;
pub use worker::ParseWorker;
