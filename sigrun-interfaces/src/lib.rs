//! # Sigrun Interfaces
//!
//! The seams between the execution engine and its collaborators.
//!
//! ## Main Interfaces
//!
//! - [`AlgorithmExecutor`] - In-process algorithm implementation
//! - [`ContextProvider`] - Optional enrichment of inputs before compute
//! - [`TaskOffloader`] - Moves a computation off the caller's process

pub mod enrichment;
pub mod execution;
pub mod offload;

// Re-export commonly used types
pub use enrichment::{ContextProvider, EnrichmentError};
pub use execution::{AlgorithmExecutor, ComputeError, OffloadRequest};
pub use offload::{OffloadError, SubmitOptions, TaskOffloader};
