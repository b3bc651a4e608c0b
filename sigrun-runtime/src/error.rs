//! Runtime error types

use thiserror::Error;

/// Errors raised while running a worker-side operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    /// Payload did not match the operation's expected shape
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Numeric precondition failed (e.g. cutoff above Nyquist)
    #[error("Computation error: {0}")]
    Computation(String),

    /// Name not in the dispatch table
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Nested batch operations are not supported")]
    NestedBatch,
}

impl From<serde_json::Error> for OperationError {
    fn from(err: serde_json::Error) -> Self {
        OperationError::InvalidPayload(err.to_string())
    }
}
