//! Worker pool configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use crate::validation::{Validatable, validate_duration, validate_positive};
use crate::error::ConfigResult;

/// Upper bound for the CPU-derived default worker count
const MAX_DEFAULT_WORKERS: usize = 4;

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Number of worker processes
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Maximum number of tasks waiting for a worker
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Timeout of a single task unless the submitter overrides it
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_task_timeout")]
    pub task_timeout: Duration,

    /// Tasks a worker runs before it is replaced
    #[serde(default = "default_max_tasks_per_worker")]
    pub max_tasks_per_worker: u64,

    /// Interval between worker health checks
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_health_check_interval"
    )]
    pub health_check_interval: Duration,

    /// How long shutdown waits for in-flight tasks
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_shutdown_deadline")]
    pub shutdown_deadline: Duration,

    /// Worker executable; the binary installed next to the host when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_command: Option<PathBuf>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            max_queue_size: default_max_queue_size(),
            task_timeout: default_task_timeout(),
            max_tasks_per_worker: default_max_tasks_per_worker(),
            health_check_interval: default_health_check_interval(),
            shutdown_deadline: default_shutdown_deadline(),
            worker_command: None,
        }
    }
}

impl Validatable for PoolSettings {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.worker_count, "worker_count", self.domain_name())?;
        validate_positive(self.max_queue_size, "max_queue_size", self.domain_name())?;
        validate_positive(self.max_tasks_per_worker, "max_tasks_per_worker", self.domain_name())?;
        validate_duration(self.task_timeout, "task_timeout", self.domain_name())?;
        validate_duration(
            self.health_check_interval,
            "health_check_interval",
            self.domain_name(),
        )?;

        if let Some(command) = &self.worker_command {
            if command.as_os_str().is_empty() {
                return Err(self.validation_error("worker_command cannot be empty"));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "pool"
    }
}

/// One worker per core, leaving a core for the host, between 1 and 4
pub fn default_worker_count() -> usize {
    num_cpus::get()
        .saturating_sub(1)
        .clamp(1, MAX_DEFAULT_WORKERS)
}

fn default_max_queue_size() -> usize {
    1000
}

fn default_task_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_tasks_per_worker() -> u64 {
    500
}

fn default_health_check_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_shutdown_deadline() -> Duration {
    Duration::from_secs(10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_settings_defaults() {
        let settings = PoolSettings::default();
        assert!((1..=4).contains(&settings.worker_count));
        assert_eq!(settings.max_queue_size, 1000);
        assert_eq!(settings.task_timeout, Duration::from_secs(30));
        assert_eq!(settings.max_tasks_per_worker, 500);
        assert_eq!(settings.health_check_interval, Duration::from_secs(30));
        assert_eq!(settings.shutdown_deadline, Duration::from_secs(10));
        assert!(settings.worker_command.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_pool_settings_validation() {
        let mut settings = PoolSettings {
            worker_count: 0,
            ..PoolSettings::default()
        };
        assert!(settings.validate().is_err());

        settings.worker_count = 2;
        settings.task_timeout = Duration::ZERO;
        assert!(settings.validate().is_err());

        settings.task_timeout = Duration::from_secs(1);
        settings.worker_command = Some(PathBuf::new());
        assert!(settings.validate().is_err());
    }
}
