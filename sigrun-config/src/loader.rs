//! Configuration loading and environment variable handling

use crate::domains::SigrunConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "SIGRUN".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<SigrunConfig> {
        let path = path.as_ref();
        log::debug!("Loading configuration from {}", path.display());

        let content = std::fs::read_to_string(path)?;
        let mut config: SigrunConfig = serde_yaml::from_str(&content)?;

        // Apply environment variable overrides
        self.apply_env_overrides(&mut config)?;

        // Validate all domains
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<SigrunConfig> {
        let mut config = SigrunConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<SigrunConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut SigrunConfig) -> ConfigResult<()> {
        self.apply_pool_overrides(&mut config.pool)?;
        self.apply_engine_overrides(&mut config.engine)?;
        self.apply_cache_overrides(&mut config.cache)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    /// Apply worker pool overrides
    fn apply_pool_overrides(
        &self,
        config: &mut crate::domains::pool::PoolSettings,
    ) -> ConfigResult<()> {
        if let Some(count) = self.parse_env("WORKER_COUNT")? {
            config.worker_count = count;
        }

        if let Some(size) = self.parse_env("MAX_QUEUE_SIZE")? {
            config.max_queue_size = size;
        }

        if let Some(seconds) = self.parse_env("TASK_TIMEOUT_SECONDS")? {
            config.task_timeout = Duration::from_secs(seconds);
        }

        if let Some(max_tasks) = self.parse_env("MAX_TASKS_PER_WORKER")? {
            config.max_tasks_per_worker = max_tasks;
        }

        if let Ok(command) = self.get_env_var("WORKER_COMMAND") {
            config.worker_command = Some(PathBuf::from(command));
        }

        Ok(())
    }

    /// Apply execution engine overrides
    fn apply_engine_overrides(
        &self,
        config: &mut crate::domains::engine::EngineSettings,
    ) -> ConfigResult<()> {
        if let Some(size) = self.parse_env("MAX_HISTORY_SIZE")? {
            config.max_history_size = size;
        }

        Ok(())
    }

    /// Apply result cache overrides
    fn apply_cache_overrides(
        &self,
        config: &mut crate::domains::cache::CacheSettings,
    ) -> ConfigResult<()> {
        if let Some(enabled) = self.parse_env("CACHE_ENABLED")? {
            config.enabled = enabled;
        }

        if let Some(max_entries) = self.parse_env("CACHE_MAX_ENTRIES")? {
            config.max_entries = max_entries;
        }

        if let Some(seconds) = self.parse_env("CACHE_TTL_SECONDS")? {
            config.ttl = Duration::from_secs(seconds);
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Parse an optional prefixed variable
    fn parse_env<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_var(name) {
            Ok(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", name, e))),
            Err(_) => Ok(None),
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
