//! IPC protocol definitions and message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::IpcError;

/// IPC protocol version for compatibility checking
pub const IPC_PROTOCOL_VERSION: u32 = 1;

/// Operations a worker process knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Statistics,
    Fft,
    Filter,
    Envelope,
    Correlation,
    /// Diagnostic: hold the worker for `ms` milliseconds
    Sleep,
    /// Several named operations in one round trip
    Batch,
}

impl OperationKind {
    const ALL: [OperationKind; 7] = [
        OperationKind::Statistics,
        OperationKind::Fft,
        OperationKind::Filter,
        OperationKind::Envelope,
        OperationKind::Correlation,
        OperationKind::Sleep,
        OperationKind::Batch,
    ];

    pub fn all() -> &'static [OperationKind] {
        &Self::ALL
    }

    /// Wire name of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Statistics => "statistics",
            OperationKind::Fft => "fft",
            OperationKind::Filter => "filter",
            OperationKind::Envelope => "envelope",
            OperationKind::Correlation => "correlation",
            OperationKind::Sleep => "sleep",
            OperationKind::Batch => "batch",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = IpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| IpcError::UnknownOperation(s.to_string()))
    }
}

/// A unit of work sent from the pool to one worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerTask {
    pub task_id: Uuid,
    /// Wire name; kept as a string so a worker can report names it does not know
    pub operation: String,
    pub payload: JsonValue,
    pub timeout_ms: u64,
}

impl WorkerTask {
    pub fn new(operation: OperationKind, payload: JsonValue, timeout: Duration) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            operation: operation.as_str().to_string(),
            payload,
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Resolve the wire name back into a known operation
    pub fn kind(&self) -> Result<OperationKind, IpcError> {
        self.operation.parse()
    }
}

/// Outcome of one [`WorkerTask`], correlated by `task_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub task_id: Uuid,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl WorkerResponse {
    /// Create a successful response
    pub fn success(task_id: Uuid, result: JsonValue, duration: Duration) -> Self {
        Self {
            task_id,
            success: true,
            result: Some(result),
            error: None,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Create a failed response
    pub fn failure(task_id: Uuid, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            task_id,
            success: false,
            result: None,
            error: Some(error.into()),
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Messages sent from the pool to a worker process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
    /// Run a task
    Execute(WorkerTask),

    /// Liveness probe
    Ping,

    /// Finish and exit
    Shutdown,
}

/// Messages sent from a worker process to the pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerReply {
    /// Worker ready for work
    Ready { worker_id: u64, pid: u32 },

    /// Task outcome
    Result(WorkerResponse),

    /// Liveness answer
    Pong { worker_id: u64, tasks_executed: u64 },

    /// A request could not be understood
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_id: Option<Uuid>,
        error: String,
    },
}

/// Message envelope for all IPC communications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    pub protocol_version: u32,
    pub timestamp: DateTime<Utc>,
    pub message: T,
}

impl<T> MessageEnvelope<T> {
    /// Create a new message envelope
    pub fn new(message: T) -> Self {
        Self {
            protocol_version: IPC_PROTOCOL_VERSION,
            timestamp: Utc::now(),
            message,
        }
    }

    /// Check if protocol version is compatible
    pub fn is_compatible(&self) -> bool {
        self.protocol_version == IPC_PROTOCOL_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_names() {
        for kind in OperationKind::all() {
            assert_eq!(kind.as_str().parse::<OperationKind>().unwrap(), *kind);
        }
        assert_eq!(OperationKind::Fft.to_string(), "fft");

        let err = "wavelet_packet".parse::<OperationKind>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown operation: wavelet_packet");
    }

    #[test]
    fn test_task_keeps_unknown_name() {
        let mut task = WorkerTask::new(OperationKind::Sleep, json!({"ms": 5}), Duration::from_secs(2));
        assert_eq!(task.timeout_ms, 2000);
        assert_eq!(task.kind().unwrap(), OperationKind::Sleep);

        task.operation = "mystery".to_string();
        assert!(matches!(task.kind(), Err(IpcError::UnknownOperation(name)) if name == "mystery"));
    }

    #[test]
    fn test_request_wire_shape() {
        let task = WorkerTask::new(OperationKind::Fft, json!({"values": [1.0]}), Duration::from_millis(500));
        let value = serde_json::to_value(WorkerRequest::Execute(task.clone())).unwrap();

        assert_eq!(value["type"], "execute");
        assert_eq!(value["operation"], "fft");
        assert_eq!(value["timeout_ms"], 500);

        let back: WorkerRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back, WorkerRequest::Execute(task));
    }

    #[test]
    fn test_failure_response_omits_result() {
        let response = WorkerResponse::failure(Uuid::new_v4(), "bad payload", Duration::from_millis(3));
        let value = serde_json::to_value(WorkerReply::Result(response)).unwrap();

        assert_eq!(value["type"], "result");
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "bad payload");
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_message_envelope() {
        let envelope = MessageEnvelope::new(WorkerRequest::Ping);
        assert_eq!(envelope.protocol_version, IPC_PROTOCOL_VERSION);
        assert!(envelope.is_compatible());

        let json = serde_json::to_string(&envelope).unwrap();
        let deserialized: MessageEnvelope<WorkerRequest> = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.message, WorkerRequest::Ping);
    }
}
