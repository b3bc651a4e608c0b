//! Executor interface definitions
//!
//! An executor is the in-process body of one algorithm. The engine owns
//! everything around it: lookup, caching, config merging, routing, timeouts.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sigrun_core::{AlgorithmCategory, AlgorithmInput, ComputeOutput, CoreError, ValidationOutcome};
use sigrun_ipc::OperationKind;
use thiserror::Error;

/// Failure raised by [`AlgorithmExecutor::compute`]
#[derive(Debug, Error)]
pub enum ComputeError {
    /// Input did not have the shape the algorithm needs
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Merged configuration could not be used
    #[error(transparent)]
    Config(#[from] CoreError),

    /// Computation itself failed
    #[error("{0}")]
    Failed(String),

    /// The executor has no worker-side counterpart
    #[error("Algorithm {0} cannot run on a worker")]
    NotOffloadable(String),
}

/// A worker operation equivalent to one `compute` call
#[derive(Debug, Clone, PartialEq)]
pub struct OffloadRequest {
    pub operation: OperationKind,
    pub payload: JsonValue,
}

impl OffloadRequest {
    pub fn new(operation: OperationKind, payload: JsonValue) -> Self {
        Self { operation, payload }
    }
}

/// Core algorithm execution interface
#[async_trait]
pub trait AlgorithmExecutor: Send + Sync {
    /// Stable identifier, also the registry key
    fn id(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Semver version string
    fn version(&self) -> &str;

    fn category(&self) -> AlgorithmCategory;

    /// Check input and caller config before anything runs.
    ///
    /// `config` is what the caller passed, before merging with defaults.
    fn validate(&self, input: &AlgorithmInput, config: &JsonValue) -> ValidationOutcome;

    /// Every configuration key the algorithm accepts, with its default
    fn default_config(&self) -> JsonValue;

    /// Run the algorithm with an already merged configuration
    async fn compute(&self, input: &AlgorithmInput, config: &JsonValue) -> Result<ComputeOutput, ComputeError>;

    /// The worker operation that performs the same computation, if any.
    ///
    /// Returning `None` keeps the execution in-process regardless of size.
    fn offload_request(&self, _input: &AlgorithmInput, _config: &JsonValue) -> Option<OffloadRequest> {
        None
    }

    /// Build the output from the JSON result the worker returned
    fn from_offloaded(
        &self,
        _input: &AlgorithmInput,
        _config: &JsonValue,
        _result: JsonValue,
    ) -> Result<ComputeOutput, ComputeError> {
        Err(ComputeError::NotOffloadable(self.id().to_string()))
    }
}
