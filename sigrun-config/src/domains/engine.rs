//! Execution engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::validation::{Validatable, validate_duration, validate_positive};
use crate::error::ConfigResult;

/// Execution engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Timeout for an execution when the caller does not give one
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_timeout")]
    pub default_timeout: Duration,

    /// Number of execution records kept in history
    #[serde(default = "default_max_history_size")]
    pub max_history_size: usize,

    /// Whether large computations may be handed to the worker pool
    #[serde(default = "crate::domains::utils::default_true")]
    pub offload_enabled: bool,

    /// Input size above which CPU-intensive algorithms are offloaded
    #[serde(default = "default_offload_threshold")]
    pub offload_threshold: usize,

    /// Input size above which any other algorithm is offloaded
    #[serde(default = "default_general_offload_threshold")]
    pub general_offload_threshold: usize,

    /// Share of the execution timeout, in percent, an offload attempt may use
    /// before the engine gives up on it and computes in-process
    #[serde(default = "default_offload_budget_percent")]
    pub offload_budget_percent: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_timeout: default_timeout(),
            max_history_size: default_max_history_size(),
            offload_enabled: true,
            offload_threshold: default_offload_threshold(),
            general_offload_threshold: default_general_offload_threshold(),
            offload_budget_percent: default_offload_budget_percent(),
        }
    }
}

impl Validatable for EngineSettings {
    fn validate(&self) -> ConfigResult<()> {
        validate_duration(self.default_timeout, "default_timeout", self.domain_name())?;
        validate_positive(self.max_history_size, "max_history_size", self.domain_name())?;

        if self.general_offload_threshold < self.offload_threshold {
            return Err(self.validation_error(
                "general_offload_threshold must not be below offload_threshold",
            ));
        }

        if !(1..=99).contains(&self.offload_budget_percent) {
            return Err(self.validation_error("offload_budget_percent must be between 1 and 99"));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "engine"
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_history_size() -> usize {
    1000
}

fn default_offload_threshold() -> usize {
    1024
}

fn default_general_offload_threshold() -> usize {
    8192
}

fn default_offload_budget_percent() -> u32 {
    75
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_settings_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.default_timeout, Duration::from_secs(60));
        assert_eq!(settings.max_history_size, 1000);
        assert!(settings.offload_enabled);
        assert_eq!(settings.offload_threshold, 1024);
        assert_eq!(settings.general_offload_threshold, 8192);
        assert_eq!(settings.offload_budget_percent, 75);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let settings = EngineSettings {
            offload_threshold: 10_000,
            ..EngineSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_offload_budget_must_leave_room_for_fallback() {
        for percent in [0, 100] {
            let settings = EngineSettings {
                offload_budget_percent: percent,
                ..EngineSettings::default()
            };
            assert!(settings.validate().is_err(), "{} accepted", percent);
        }
    }
}
