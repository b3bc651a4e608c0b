//! Worker pool configuration

use std::path::PathBuf;
use std::time::Duration;

use sigrun_config::PoolSettings;

use crate::error::PoolError;

/// File name of the worker executable
pub const WORKER_BINARY: &str = "sigrun-worker";

/// How to launch one worker process. `--worker-id <id>` is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl Default for WorkerCommand {
    /// The worker binary next to the current executable, else from `PATH`
    fn default() -> Self {
        let sibling = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(WORKER_BINARY)))
            .filter(|path| path.exists());
        Self::new(sibling.unwrap_or_else(|| PathBuf::from(WORKER_BINARY)))
    }
}

/// Configuration for the worker pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub worker_count: usize,
    /// Tasks allowed to wait for a worker before submissions are rejected
    pub max_queue_size: usize,
    /// Default per-task timeout
    pub task_timeout: Duration,
    /// A worker is replaced after running this many tasks
    pub max_tasks_per_worker: u64,
    pub health_check_interval: Duration,
    pub worker_command: WorkerCommand,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().saturating_sub(1).clamp(1, 4),
            max_queue_size: 1000,
            task_timeout: Duration::from_secs(30),
            max_tasks_per_worker: 500,
            health_check_interval: Duration::from_secs(30),
            worker_command: WorkerCommand::default(),
        }
    }
}

impl From<&PoolSettings> for PoolConfig {
    fn from(settings: &PoolSettings) -> Self {
        Self {
            worker_count: settings.worker_count,
            max_queue_size: settings.max_queue_size,
            task_timeout: settings.task_timeout,
            max_tasks_per_worker: settings.max_tasks_per_worker,
            health_check_interval: settings.health_check_interval,
            worker_command: settings
                .worker_command
                .as_ref()
                .map(|program| WorkerCommand::new(program.clone()))
                .unwrap_or_default(),
        }
    }
}

impl PoolConfig {
    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_worker_command(mut self, command: WorkerCommand) -> Self {
        self.worker_command = command;
        self
    }

    /// A busy worker older than this is presumed hung, unless its task was
    /// given a timeout long enough to push the limit further out
    pub fn stale_after(&self) -> Duration {
        self.task_timeout * 2
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        let problem = if self.worker_count == 0 {
            Some("worker_count must be at least 1")
        } else if self.task_timeout.is_zero() {
            Some("task_timeout must be greater than zero")
        } else if self.max_tasks_per_worker == 0 {
            Some("max_tasks_per_worker must be at least 1")
        } else if self.health_check_interval.is_zero() {
            Some("health_check_interval must be greater than zero")
        } else {
            None
        };

        match problem {
            Some(reason) => Err(PoolError::InvalidConfig(reason.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert!((1..=4).contains(&config.worker_count));
        assert_eq!(config.max_queue_size, 1000);
        assert_eq!(config.task_timeout, Duration::from_secs(30));
        assert_eq!(config.stale_after(), Duration::from_secs(60));
        assert_eq!(config.max_tasks_per_worker, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(PoolConfig::default().with_workers(0).validate().is_err());

        let config = PoolConfig {
            task_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_settings() {
        let settings = PoolSettings {
            worker_count: 3,
            max_queue_size: 10,
            task_timeout: Duration::from_secs(5),
            worker_command: Some(PathBuf::from("/usr/local/bin/sigrun-worker")),
            ..PoolSettings::default()
        };
        let config = PoolConfig::from(&settings);
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.max_queue_size, 10);
        assert_eq!(config.task_timeout, Duration::from_secs(5));
        assert_eq!(config.stale_after(), Duration::from_secs(10));
        assert_eq!(
            config.worker_command.program,
            PathBuf::from("/usr/local/bin/sigrun-worker")
        );
    }

    #[test]
    fn test_worker_command_args() {
        let command = WorkerCommand::new("/opt/sigrun/bin/sigrun-worker").with_arg("--quiet");
        assert_eq!(command.program, PathBuf::from("/opt/sigrun/bin/sigrun-worker"));
        assert_eq!(command.args, vec!["--quiet"]);
    }
}
