//! Logging initialisation for Sigrun
//!
//! Library crates emit through `tracing` (or the `log` facade, bridged by
//! `tracing-subscriber`). Binaries call one of the initialisers here once at
//! startup.

pub mod init;

pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing, init_worker_tracing};
pub use sigrun_config::{LogFormat, LogLevel, LoggingConfig};
