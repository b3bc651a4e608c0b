//! # Sigrun Engine
//!
//! Algorithm registry, routing policy and the execution engine that ties the
//! cache, history, enrichment and offloading together.

pub mod algorithms;
pub mod engine;
pub mod error;
pub mod history;
pub mod registry;
pub mod routing;

// Re-export main types
pub use engine::{EngineConfig, EngineStats, ExecutionEngine, ExecutionEngineBuilder};
pub use error::{EngineError, Result};
pub use history::ExecutionHistory;
pub use registry::{AlgorithmDescriptor, AlgorithmFilter, AlgorithmMetadata, AlgorithmRegistry, AlgorithmSummary};
pub use routing::{should_offload, RoutingPolicy};
