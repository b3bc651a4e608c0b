//! Domain-driven configuration management for Sigrun
//!
//! Configuration is split by functional domain (worker pool, engine, result
//! cache, logging). Every domain has serde defaults, validates itself and can
//! be overridden through `SIGRUN_*` environment variables.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    cache::CacheSettings,
    engine::EngineSettings,
    logging::{LogFormat, LogLevel, LoggingConfig},
    pool::PoolSettings,
    SigrunConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration;
