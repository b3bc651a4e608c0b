//! Execution context and history records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::input::AlgorithmInput;
use crate::output::AlgorithmOutput;
use crate::types::{Priority, TriggerKind};

/// Default per-execution timeout
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Unique identifier for an execution (newtype pattern for type safety)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub Uuid);

impl ExecutionId {
    /// Create a new random execution ID
    pub fn new() -> Self {
        ExecutionId(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ExecutionId {
    fn from(uuid: Uuid) -> Self {
        ExecutionId(uuid)
    }
}

/// Execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Execution accepted, not yet started
    Pending,
    /// Execution is currently running
    Running,
    /// Execution completed successfully
    Completed,
    /// Execution failed with an error
    Failed,
    /// Execution was cancelled by its caller
    Cancelled,
}

impl ExecutionStatus {
    /// Check if the execution is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress notification emitted while an execution advances
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub execution_id: ExecutionId,
    pub stage: &'static str,
    /// 0..=100
    pub percent: u8,
}

/// Caller-supplied progress sink
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Optional per-call overrides used to build an [`ExecutionContext`]
#[derive(Clone, Default)]
pub struct ContextOverrides {
    pub requester_id: Option<String>,
    pub equipment_id: Option<String>,
    pub timeout: Option<Duration>,
    pub cache_enabled: Option<bool>,
    pub priority: Option<Priority>,
    pub trigger: Option<TriggerKind>,
    pub progress: Option<ProgressCallback>,
    pub cancellation: Option<CancellationToken>,
}

impl ContextOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trigger(mut self, trigger: TriggerKind) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = Some(enabled);
        self
    }

    pub fn with_equipment(mut self, equipment_id: impl Into<String>) -> Self {
        self.equipment_id = Some(equipment_id.into());
        self
    }

    pub fn with_requester(mut self, requester_id: impl Into<String>) -> Self {
        self.requester_id = Some(requester_id.into());
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

impl fmt::Debug for ContextOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextOverrides")
            .field("requester_id", &self.requester_id)
            .field("equipment_id", &self.equipment_id)
            .field("timeout", &self.timeout)
            .field("cache_enabled", &self.cache_enabled)
            .field("priority", &self.priority)
            .field("trigger", &self.trigger)
            .field("progress", &self.progress.is_some())
            .field("cancellation", &self.cancellation.is_some())
            .finish()
    }
}

/// Fully resolved parameters of one execution
#[derive(Clone)]
pub struct ExecutionContext {
    pub execution_id: ExecutionId,
    pub requester_id: Option<String>,
    pub equipment_id: Option<String>,
    pub timeout: Duration,
    pub cache_enabled: bool,
    pub priority: Priority,
    pub trigger: TriggerKind,
    progress: Option<ProgressCallback>,
    cancellation: CancellationToken,
}

impl ExecutionContext {
    /// Resolve overrides against defaults.
    ///
    /// A manual trigger always disables the cache, whatever the caller asked.
    pub fn resolve(overrides: ContextOverrides, default_timeout: Duration) -> Self {
        let trigger = overrides.trigger.unwrap_or_default();
        let cache_enabled = match trigger {
            TriggerKind::Manual => false,
            _ => overrides.cache_enabled.unwrap_or(true),
        };

        Self {
            execution_id: ExecutionId::new(),
            requester_id: overrides.requester_id,
            equipment_id: overrides.equipment_id,
            timeout: overrides.timeout.unwrap_or(default_timeout),
            cache_enabled,
            priority: overrides.priority.unwrap_or_default(),
            trigger,
            progress: overrides.progress,
            cancellation: overrides.cancellation.unwrap_or_default(),
        }
    }

    /// Report progress to the caller, if it asked for it
    pub fn report(&self, stage: &'static str, percent: u8) {
        if let Some(progress) = &self.progress {
            progress(ProgressUpdate {
                execution_id: self.execution_id,
                stage,
                percent: percent.min(100),
            });
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::resolve(ContextOverrides::default(), DEFAULT_EXECUTION_TIMEOUT)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("execution_id", &self.execution_id)
            .field("requester_id", &self.requester_id)
            .field("equipment_id", &self.equipment_id)
            .field("timeout", &self.timeout)
            .field("cache_enabled", &self.cache_enabled)
            .field("priority", &self.priority)
            .field("trigger", &self.trigger)
            .finish()
    }
}

/// Append-only history entry for one execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: ExecutionId,
    pub algorithm_id: String,
    pub status: ExecutionStatus,
    pub input: AlgorithmInput,
    pub config: JsonValue,
    pub output: Option<AlgorithmOutput>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub trigger: TriggerKind,
    pub cache_hit: bool,
    pub offloaded: bool,
}

impl ExecutionRecord {
    /// Start a record in the `Pending` state
    pub fn pending(context: &ExecutionContext, algorithm_id: &str, input: &AlgorithmInput, config: &JsonValue) -> Self {
        Self {
            execution_id: context.execution_id,
            algorithm_id: algorithm_id.to_string(),
            status: ExecutionStatus::Pending,
            input: input.clone(),
            config: config.clone(),
            output: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: 0,
            error: None,
            trigger: context.trigger,
            cache_hit: false,
            offloaded: false,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = ExecutionStatus::Running;
    }

    /// Close the record with the envelope the caller received
    pub fn finish(&mut self, status: ExecutionStatus, output: &AlgorithmOutput) {
        let completed_at = Utc::now();
        self.status = status;
        self.duration_ms = (completed_at - self.started_at).num_milliseconds().max(0) as u64;
        self.completed_at = Some(completed_at);
        self.error = output.error.clone();
        self.cache_hit = output.metadata.cache_hit;
        self.offloaded = output.metadata.offloaded;
        self.output = Some(output.clone());
    }
}
