//! One parse thread.
//!
//! A worker is Idle until a request arrives, Parsing while it runs the
//! pipeline, and Idle again once the response has been handed to its output
//! callback. Requests queue in the channel and are taken one at a time, so
//! parses never interleave on one worker. Nothing but the [`Parser`] and
//! its read-only configuration survives from one request to the next.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use texpaper_core::{FatalError, Options, ParseResult, Parser};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::WorkerError;
use crate::message::{Diagnostic, WorkerRequest, WorkerResponse};

/// Handle to a running worker thread.
pub struct ParseWorker {
    name: String,
    sender: mpsc::UnboundedSender<WorkerRequest>,
    /// Requests sent but not yet answered.
    in_flight: Arc<AtomicUsize>,
    handle: thread::JoinHandle<()>,
}

impl ParseWorker {
    /// Start a worker thread. Every response is passed to `on_output` on the
    /// worker thread, in request order.
    pub fn spawn<F>(name: impl Into<String>, options: Options, on_output: F) -> Result<Self, WorkerError>
    where
        F: Fn(WorkerResponse) + Send + 'static,
    {
        let name = name.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn({
                let in_flight = Arc::clone(&in_flight);
                move || run(receiver, options, in_flight, on_output)
            })
            .map_err(|source| WorkerError::Spawn {
                name: name.clone(),
                source,
            })?;

        debug!(worker = %name, "worker started");
        Ok(Self {
            name,
            sender,
            in_flight,
            handle,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a request.
    pub fn send(&self, request: WorkerRequest) -> Result<(), WorkerError> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        self.sender.send(request).map_err(|_| {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            WorkerError::Disconnected {
                name: self.name.clone(),
            }
        })
    }

    /// True while a request is queued or being parsed.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }

    /// Stop taking requests, let the queued ones finish, and wait for the
    /// thread to exit.
    pub fn shutdown(self) {
        let Self {
            name, sender, handle, ..
        } = self;
        drop(sender);
        if handle.join().is_err() {
            warn!(worker = %name, "worker thread panicked");
        }
    }
}

fn run<F>(
    mut receiver: mpsc::UnboundedReceiver<WorkerRequest>,
    options: Options,
    in_flight: Arc<AtomicUsize>,
    on_output: F,
) where
    F: Fn(WorkerResponse),
{
    let mut parser = Parser::new(options);

    while let Some(request) = receiver.blocking_recv() {
        debug!(id = %request.id, bytes = request.source_text.len(), "request received");
        let response = handle_request(&mut parser, request);
        in_flight.fetch_sub(1, Ordering::AcqRel);
        debug!(id = %response.id(), ok = response.is_success(), "responding");
        on_output(response);
    }

    debug!("worker channel closed");
}

/// Parse one request into its response. Fatal errors and panics both become
/// failure responses echoing the request id.
pub fn handle_request(parser: &mut Parser, request: WorkerRequest) -> WorkerResponse {
    let WorkerRequest { id, source_text } = request;
    respond(id, || parser.parse(&source_text))
}

fn respond<F>(id: String, parse: F) -> WorkerResponse
where
    F: FnOnce() -> Result<ParseResult, FatalError>,
{
    match panic::catch_unwind(AssertUnwindSafe(parse)) {
        Ok(Ok(result)) => WorkerResponse::Success {
            id,
            html: result.html,
            diagnostics: result.errors.iter().map(Diagnostic::from).collect(),
        },
        Ok(Err(fatal)) => WorkerResponse::Failure {
            id,
            error: fatal.to_string(),
        },
        Err(payload) => {
            let error = panic_message(payload.as_ref());
            warn!(%id, %error, "parse panicked");
            WorkerResponse::Failure { id, error }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("parser panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("parser panicked: {message}")
    } else {
        "parser panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fatal_error_becomes_failure() {
        let mut parser = Parser::new(Options {
            max_input_bytes: 4,
            ..Options::default()
        });
        let response = handle_request(&mut parser, WorkerRequest::new("r1", "too long"));
        assert_eq!(
            response,
            WorkerResponse::Failure {
                id: "r1".into(),
                error: "input is 8 bytes, limit is 4".into()
            }
        );
    }

    #[test]
    fn diagnostics_travel_with_success() {
        let mut parser = Parser::default();
        let response = handle_request(&mut parser, WorkerRequest::new("r2", r"\textbf{open"));
        let WorkerResponse::Success { id, diagnostics, .. } = response else {
            panic!("expected success");
        };
        assert_eq!(id, "r2");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, "unbalanced-brace");
        assert_eq!(diagnostics[0].stage, "inline");
    }

    #[test]
    fn panic_becomes_failure() {
        let response = respond("r3".into(), || panic!("stage exploded"));
        assert_eq!(
            response,
            WorkerResponse::Failure {
                id: "r3".into(),
                error: "parser panicked: stage exploded".into()
            }
        );
    }
}
