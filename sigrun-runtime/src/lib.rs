//! Worker-side runtime for Sigrun
//!
//! This crate holds the numeric operations a worker process can run and the
//! loop that serves them over the IPC protocol.

pub mod error;
pub mod operations;
pub mod worker;

// Re-export commonly used types
pub use error::OperationError;
pub use operations::{dispatch, dispatch_named};
pub use worker::{worker_main, Worker};
