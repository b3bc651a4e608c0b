//! Error types for the worker pool

use std::time::Duration;
use thiserror::Error;

use sigrun_interfaces::OffloadError;

/// Why a pool submission did not produce a result
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoolError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Task queue is full ({0} tasks waiting)")]
    QueueFull(usize),

    #[error("Task timed out after {0:?}")]
    Timeout(Duration),

    #[error("Worker crashed: {0}")]
    WorkerCrashed(String),

    /// The operation ran and reported an error
    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Worker pool is shutting down")]
    ShuttingDown,

    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// The pool's actor is gone
    #[error("Worker pool is not running")]
    Unavailable,
}

impl From<sigrun_ipc::IpcError> for PoolError {
    fn from(err: sigrun_ipc::IpcError) -> Self {
        match err {
            sigrun_ipc::IpcError::UnknownOperation(name) => PoolError::UnknownOperation(name),
            other => PoolError::Ipc(other.to_string()),
        }
    }
}

impl From<PoolError> for OffloadError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Timeout(after) => OffloadError::Timeout(after),
            PoolError::WorkerCrashed(_) | PoolError::TaskFailed(_) | PoolError::Ipc(_) => {
                OffloadError::Failed(err.to_string())
            }
            PoolError::UnknownOperation(_)
            | PoolError::QueueFull(_)
            | PoolError::ShuttingDown
            | PoolError::Spawn(_)
            | PoolError::InvalidConfig(_)
            | PoolError::Unavailable => OffloadError::Rejected(err.to_string()),
        }
    }
}
