//! Error types for branchwatch.

use thiserror::Error;

use crate::job::JobState;

#[derive(Debug, Error)]
pub enum Error {
    /// Branch listing or clone failed (network, auth, not found, garbled output).
    #[error("remote error for {url}: {message}")]
    Remote { url: String, message: String },

    /// The scoped working directory for a job could not be created.
    #[error("workspace error: {0}")]
    Workspace(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid job state transition: {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn remote(url: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Remote {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Whether this error should abort the whole run rather than a single entry or job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Workspace(_) | Error::Cache(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
