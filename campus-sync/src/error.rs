//! Error types for task execution.

use thiserror::Error;

/// Errors a task handler can produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The mutation failed in a way that may succeed on retry; drives
    /// the backoff ladder.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The task payload is malformed; the task is dropped, not retried.
    #[error("validation failure: {0}")]
    Validation(String),
}
