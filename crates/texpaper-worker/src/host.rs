//! Async front end to a [`ParseWorker`].
//!
//! The host tags each request with a fresh id and parks a oneshot sender
//! under that id. The worker's output callback looks the id up and completes
//! the matching receiver, so callers can have several parses outstanding on
//! one host and each gets its own answer.
//!
//! When there is no worker to talk to (it failed to spawn, its channel is
//! closed, or it went away before answering) the host parses on the calling
//! thread instead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use texpaper_core::{Options, Parser};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::HostError;
use crate::message::{Diagnostic, WorkerRequest, WorkerResponse};
use crate::worker::{handle_request, ParseWorker};

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<WorkerResponse>>>>;

fn lock(pending: &Pending) -> MutexGuard<'_, HashMap<String, oneshot::Sender<WorkerResponse>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A successful parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub id: String,
    pub html: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl WorkerResponse {
    /// Turn a response into the caller-facing result.
    pub fn into_result(self) -> Result<Rendered, HostError> {
        match self {
            WorkerResponse::Success {
                id,
                html,
                diagnostics,
            } => Ok(Rendered {
                id,
                html,
                diagnostics,
            }),
            WorkerResponse::Failure { id, error } => Err(HostError::Parse { id, message: error }),
        }
    }
}

/// Routes worker responses to the callers waiting on them.
///
/// Owned by the worker's output callback, so it is dropped when the worker
/// thread exits. Dropping it drops every parked sender, which wakes the
/// waiting callers with an error and sends them to the fallback path.
struct Dispatcher {
    pending: Pending,
}

impl Dispatcher {
    fn deliver(&self, response: WorkerResponse) {
        let sender = lock(&self.pending).remove(response.id());
        match sender {
            Some(sender) => {
                // the caller may have stopped waiting
                let _ = sender.send(response);
            }
            None => debug!(id = %response.id(), "dropping response nobody is waiting for"),
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        lock(&self.pending).clear();
    }
}

/// One worker plus the bookkeeping to await its answers.
pub struct WorkerHost {
    name: String,
    options: Options,
    worker: Option<ParseWorker>,
    pending: Pending,
    next_id: AtomicU64,
}

impl WorkerHost {
    /// Start a host with a worker thread named `texpaper-worker`.
    pub fn new(options: Options) -> Self {
        Self::with_name("texpaper-worker", options)
    }

    /// Start a host whose worker thread, and request ids, carry `name`.
    pub fn with_name(name: impl Into<String>, options: Options) -> Self {
        let name = name.into();
        let pending = Pending::default();
        let dispatcher = Dispatcher {
            pending: Arc::clone(&pending),
        };

        let worker = match ParseWorker::spawn(name.clone(), options.clone(), move |response| {
            dispatcher.deliver(response)
        }) {
            Ok(worker) => Some(worker),
            Err(err) => {
                warn!(worker = %name, error = %err, "falling back to parsing on the calling thread");
                None
            }
        };

        Self {
            name,
            options,
            worker,
            pending,
            next_id: AtomicU64::new(0),
        }
    }

    /// A host with no worker thread; every parse runs on the caller.
    pub fn local(options: Options) -> Self {
        Self {
            name: "local".to_string(),
            options,
            worker: None,
            pending: Pending::default(),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True while the worker has requests queued or running.
    pub fn is_busy(&self) -> bool {
        self.worker.as_ref().is_some_and(ParseWorker::is_busy)
    }

    /// Number of callers currently waiting on the worker.
    pub fn pending(&self) -> usize {
        lock(&self.pending).len()
    }

    fn request(&self, source: String) -> WorkerRequest {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        WorkerRequest::new(format!("{}-{n}", self.name), source)
    }

    /// Parse a document on the worker and wait for the answer.
    pub async fn parse(&self, source: impl Into<String>) -> Result<Rendered, HostError> {
        let request = self.request(source.into());
        self.dispatch(request).await
    }

    /// Like [`parse`](Self::parse), but give up after `timeout`.
    ///
    /// A parse cannot be interrupted: on timeout the worker still finishes
    /// it, and its response is discarded.
    pub async fn parse_with_timeout(
        &self,
        source: impl Into<String>,
        timeout: Duration,
    ) -> Result<Rendered, HostError> {
        let request = self.request(source.into());
        let id = request.id.clone();
        match tokio::time::timeout(timeout, self.dispatch(request)).await {
            Ok(result) => result,
            Err(_) => {
                lock(&self.pending).remove(&id);
                warn!(%id, ?timeout, "parse timed out");
                Err(HostError::Timeout { id, after: timeout })
            }
        }
    }

    async fn dispatch(&self, request: WorkerRequest) -> Result<Rendered, HostError> {
        let Some(worker) = &self.worker else {
            return self.parse_locally(request);
        };

        let (sender, receiver) = oneshot::channel();
        lock(&self.pending).insert(request.id.clone(), sender);

        if let Err(err) = worker.send(request.clone()) {
            lock(&self.pending).remove(&request.id);
            warn!(id = %request.id, error = %err, "falling back to parsing on the calling thread");
            return self.parse_locally(request);
        }

        match receiver.await {
            Ok(response) => response.into_result(),
            Err(_) => {
                warn!(id = %request.id, worker = %self.name, "worker went away before answering");
                self.parse_locally(request)
            }
        }
    }

    fn parse_locally(&self, request: WorkerRequest) -> Result<Rendered, HostError> {
        debug!(id = %request.id, "parsing on the calling thread");
        let mut parser = Parser::new(self.options.clone());
        handle_request(&mut parser, request).into_result()
    }

    /// Stop the worker after the queued requests finish.
    pub fn shutdown(self) {
        if let Some(worker) = self.worker {
            worker.shutdown();
        }
    }
}
