//! Result cache configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::validation::{Validatable, validate_duration, validate_positive};
use crate::error::ConfigResult;

/// Result cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Whether execution results are cached
    #[serde(default = "crate::domains::utils::default_true")]
    pub enabled: bool,

    /// Maximum number of cached results
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Time-to-live of a cached result
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_ttl")]
    pub ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_max_entries(),
            ttl: default_ttl(),
        }
    }
}

impl Validatable for CacheSettings {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.max_entries, "max_entries", self.domain_name())?;
        validate_duration(self.ttl, "ttl", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "cache"
    }
}

fn default_max_entries() -> usize {
    100
}

fn default_ttl() -> Duration {
    Duration::from_secs(300)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_settings_defaults() {
        let settings = CacheSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.max_entries, 100);
        assert_eq!(settings.ttl, Duration::from_secs(300));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_cache_settings_validation() {
        let settings = CacheSettings {
            max_entries: 0,
            ..CacheSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
