//! Worker pool error types.

use std::fmt;

/// Errors reported by the pool, either on a batch's result stream or from
/// [`close`](super::WorkerPool::close).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool has been shut down.
    Closed,

    /// The caller's context was cancelled.
    Cancelled,

    /// The caller's context deadline passed.
    DeadlineExceeded,

    /// An action panicked while running on a worker.
    WorkerPanic(String),

    /// Failure returned by an action.
    Execution(String),
}

impl PoolError {
    /// Check if this is a closed-pool error.
    pub fn is_closed(&self) -> bool {
        matches!(self, PoolError::Closed)
    }

    /// Check if this error comes from the caller's context.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PoolError::Cancelled | PoolError::DeadlineExceeded)
    }

    /// Get the error message for logging.
    pub fn message(&self) -> &str {
        match self {
            PoolError::Closed => "Pool closed",
            PoolError::Cancelled => "Cancelled",
            PoolError::DeadlineExceeded => "Deadline exceeded",
            PoolError::WorkerPanic(_) => "Worker panic",
            PoolError::Execution(msg) => msg,
        }
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Closed => write!(f, "pool already closed"),
            PoolError::Cancelled => write!(f, "context canceled"),
            PoolError::DeadlineExceeded => write!(f, "context deadline exceeded"),
            PoolError::WorkerPanic(msg) => write!(f, "action panicked: {}", msg),
            PoolError::Execution(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for PoolError {}

impl From<String> for PoolError {
    fn from(msg: String) -> Self {
        PoolError::Execution(msg)
    }
}

impl From<&str> for PoolError {
    fn from(msg: &str) -> Self {
        PoolError::Execution(msg.to_string())
    }
}

/// Result type alias for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
