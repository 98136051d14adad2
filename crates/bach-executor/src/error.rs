//! Error types for the parallel executor

use std::time::Duration;
use thiserror::Error;

/// Error returned by a transaction's action
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The action reported a failure
    #[error("task failed: {0}")]
    Failed(String),

    /// The action panicked
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Convenience constructor for [`TaskError::Failed`]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// A task touched an address that another in-flight task holds
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task {task} conflicts on in-flight address {address}")]
pub struct AddressConflict {
    /// Id of the task that was refused
    pub task: String,
    /// First address found to be claimed
    pub address: String,
}

/// Errors that fail a whole `execute_parallel` call
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The batch did not finish before the deadline
    #[error("batch timed out after {elapsed:?} ({completed}/{total} tasks finished)")]
    BatchTimeout {
        /// Time spent before giving up
        elapsed: Duration,
        /// Tasks that had finished when the deadline hit
        completed: usize,
        /// Tasks in the batch
        total: usize,
    },

    /// The executor has been shut down
    #[error("executor has been shut down")]
    ShutDown,

    /// The async runtime could not be built
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    /// `execute_parallel` was called from inside an async runtime
    #[error("execute_parallel must not be called from within an async runtime")]
    NestedRuntime,

    /// A group unit could not be joined
    #[error("group execution unit failed: {0}")]
    Join(String),

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExecutorError::BatchTimeout {
            elapsed: Duration::from_secs(30),
            completed: 3,
            total: 10,
        };
        assert!(err.to_string().contains("3/10"));

        let err = AddressConflict {
            task: "tx-1".into(),
            address: "acct:alice".into(),
        };
        assert!(err.to_string().contains("tx-1"));
        assert!(err.to_string().contains("acct:alice"));

        assert!(TaskError::failed("insufficient balance")
            .to_string()
            .contains("insufficient balance"));
        assert!(ExecutorError::ShutDown.to_string().contains("shut down"));
    }
}
