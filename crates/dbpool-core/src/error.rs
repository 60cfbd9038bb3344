//! Error types for dbpool

use thiserror::Error;

/// Core error type for pool and driver operations
#[derive(Error, Debug)]
pub enum DbPoolError {
    /// The factory could not open a physical connection
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// Every slot up to the ceiling is checked out
    #[error("Connection pool exhausted (max_size: {max_size})")]
    PoolExhausted { max_size: usize },

    /// A handle that is not currently checked out from this pool was returned
    #[error("Unknown connection: {0}")]
    UnknownConnection(String),

    /// The pool was shut down with `close_all`
    #[error("Connection pool is closed")]
    PoolClosed,

    /// One or more handles failed to close during a bulk shutdown
    #[error("Failed to close {failed} of {total} connections: {}", errors.join("; "))]
    CloseFailed {
        failed: usize,
        total: usize,
        errors: Vec<String>,
    },

    #[error("Query error: {0}")]
    Query(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbPoolError {
    /// Whether a caller may reasonably retry the operation later
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbPoolError::PoolExhausted { .. })
    }
}

/// Result type alias for dbpool operations
pub type Result<T> = std::result::Result<T, DbPoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_failed_message_lists_every_error() {
        let err = DbPoolError::CloseFailed {
            failed: 2,
            total: 5,
            errors: vec!["a: broken pipe".into(), "b: timeout".into()],
        };
        assert_eq!(
            err.to_string(),
            "Failed to close 2 of 5 connections: a: broken pipe; b: timeout"
        );
    }

    #[test]
    fn test_only_exhaustion_is_retryable() {
        assert!(DbPoolError::PoolExhausted { max_size: 3 }.is_retryable());
        assert!(!DbPoolError::PoolClosed.is_retryable());
        assert!(!DbPoolError::ConnectFailed("refused".into()).is_retryable());
    }
}
