//! Cache configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sigrun_config::domains::cache::CacheSettings;

use crate::errors::{CacheError, CacheResult};

/// Default number of cached results
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Default time-to-live of a cached result
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Result cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCacheConfig {
    /// Enable execution result caching
    pub enabled: bool,

    /// Maximum number of results to cache
    pub max_entries: usize,

    /// TTL applied when `put` is not given one
    pub default_ttl: Duration,
}

impl Default for ResultCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl: DEFAULT_TTL,
        }
    }
}

impl ResultCacheConfig {
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> CacheResult<()> {
        if self.max_entries == 0 {
            return Err(CacheError::InvalidConfiguration(
                "max_entries must be greater than 0".to_string(),
            ));
        }
        if self.default_ttl.is_zero() {
            return Err(CacheError::InvalidConfiguration(
                "default_ttl must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&CacheSettings> for ResultCacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            max_entries: settings.max_entries,
            default_ttl: settings.ttl,
        }
    }
}
