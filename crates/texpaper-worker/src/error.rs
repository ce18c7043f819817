use std::time::Duration;

use thiserror::Error;

/// Failures of the worker thread itself.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn worker thread `{name}`")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker `{name}` has shut down")]
    Disconnected { name: String },
}

/// Failures seen by a caller awaiting a parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The worker answered with an error response.
    #[error("request {id} failed: {message}")]
    Parse { id: String, message: String },

    /// No response arrived in time. The parse itself is not interrupted.
    #[error("request {id} timed out after {after:?}")]
    Timeout { id: String, after: Duration },
}

impl HostError {
    /// Id of the request this error belongs to.
    pub fn id(&self) -> &str {
        match self {
            HostError::Parse { id, .. } | HostError::Timeout { id, .. } => id,
        }
    }
}
