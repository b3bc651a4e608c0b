//! Domain-specific configuration modules

pub mod cache;
pub mod engine;
pub mod logging;
pub mod pool;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main Sigrun configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SigrunConfig {
    /// Worker pool configuration
    #[serde(default)]
    pub pool: pool::PoolSettings,

    /// Execution engine configuration
    #[serde(default)]
    pub engine: engine::EngineSettings,

    /// Result cache configuration
    #[serde(default)]
    pub cache: cache::CacheSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl SigrunConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.pool.validate()?;
        self.engine.validate()?;
        self.cache.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = SigrunConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
