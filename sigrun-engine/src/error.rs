use std::time::Duration;

use sigrun_caching::CacheError;
use sigrun_core::{AlgorithmOutput, CoreError, OutputMetadata};
use sigrun_interfaces::ComputeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Algorithm not found: {0}")]
    AlgorithmNotFound(String),

    #[error("Input validation failed: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] CoreError),

    #[error(transparent)]
    Compute(#[from] ComputeError),

    #[error("Execution timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl EngineError {
    /// The envelope a caller receives for this failure
    pub fn to_output(&self, algorithm_id: &str, metadata: OutputMetadata) -> AlgorithmOutput {
        match self {
            EngineError::Cancelled => AlgorithmOutput::cancelled(algorithm_id, metadata),
            other => AlgorithmOutput::failed(algorithm_id, other.to_string(), metadata),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
