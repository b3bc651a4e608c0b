//! Several named operations in one worker round trip

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use sigrun_ipc::OperationKind;
use std::collections::BTreeMap;

use super::run_single;
use crate::error::OperationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchEntry {
    pub operation: String,
    #[serde(default)]
    pub payload: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchPayload {
    pub operations: BTreeMap<String, BatchEntry>,
}

/// Entries run in name order; a failing entry is reported in place and
/// never fails the batch.
pub async fn run(payload: BatchPayload) -> Result<JsonValue, OperationError> {
    let mut results = Map::new();
    for (name, entry) in payload.operations {
        let outcome = match entry.operation.parse::<OperationKind>() {
            Ok(kind) => run_single(kind, entry.payload).await,
            Err(_) => Err(OperationError::UnknownOperation(entry.operation)),
        };
        let value = match outcome {
            Ok(result) => json!({ "ok": true, "result": result }),
            Err(e) => json!({ "ok": false, "error": e.to_string() }),
        };
        results.insert(name, value);
    }
    Ok(JsonValue::Object(results))
}

#[cfg(test)]
mod tests {
    use super::super::dispatch;
    use super::*;

    #[tokio::test]
    async fn test_batch_reports_entries_independently() {
        let payload = json!({
            "operations": {
                "stats": {"operation": "statistics", "payload": {"values": [3.0, 4.0]}},
                "broken": {"operation": "statistics", "payload": {"values": []}},
                "mystery": {"operation": "hologram", "payload": {}},
                "nested": {"operation": "batch", "payload": {"operations": {}}}
            }
        });

        let result = dispatch(OperationKind::Batch, payload).await.unwrap();

        assert_eq!(result["stats"]["ok"], true);
        assert_eq!(result["stats"]["result"]["max"], 4.0);
        assert_eq!(result["broken"]["ok"], false);
        assert_eq!(result["broken"]["error"], "Invalid payload: values must not be empty");
        assert_eq!(result["mystery"]["error"], "Unknown operation: hologram");
        assert_eq!(result["nested"]["error"], "Nested batch operations are not supported");
    }

    #[tokio::test]
    async fn test_malformed_batch_fails() {
        let err = dispatch(OperationKind::Batch, json!({"ops": {}})).await.unwrap_err();
        assert!(matches!(err, OperationError::InvalidPayload(_)));
    }
}
