//! Sigrun worker pool
//!
//! A fixed-size pool of OS-process workers with a bounded priority queue,
//! per-task timeouts, crash detection, staleness checks, periodic recycling
//! and graceful shutdown.

pub mod config;
pub mod error;
mod handle;
pub mod pool;
pub mod queue;
pub mod stats;

// Re-export main types
pub use config::{PoolConfig, WorkerCommand, WORKER_BINARY};
pub use error::PoolError;
pub use pool::{TaskTicket, WorkerPool};
pub use queue::TaskQueue;
pub use stats::PoolStats;

// Submission types callers need alongside the pool
pub use sigrun_interfaces::SubmitOptions;
pub use sigrun_ipc::OperationKind;
