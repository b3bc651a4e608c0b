//! Core domain models and types for Sigrun
//!
//! This crate contains the fundamental types used throughout the Sigrun
//! workspace: algorithm inputs, the result envelope every execution
//! returns, per-call execution context and history records, and the
//! typed configuration merge shared by all executors.

pub mod config;
pub mod error;
pub mod execution;
pub mod input;
pub mod output;
pub mod types;
pub mod validation;

// Re-export commonly used types at the crate root
pub use config::{merge_config, typed_config};
pub use error::{CoreError, Result};
pub use execution::{
    ContextOverrides, ExecutionContext, ExecutionId, ExecutionRecord, ExecutionStatus,
    ProgressCallback, ProgressUpdate, DEFAULT_EXECUTION_TIMEOUT,
};
pub use input::{AlgorithmInput, EquipmentContext, SignalData};
pub use output::{AlgorithmOutput, ComputeOutput, Diagnosis, OutputMetadata, OutputStatus};
pub use types::{AlgorithmCategory, Priority, Severity, TriggerKind};
pub use validation::ValidationOutcome;

// Cancellation handle accepted by `ContextOverrides::with_cancellation`
pub use tokio_util::sync::CancellationToken;
