//! Worker-side operations
//!
//! Every [`OperationKind`] maps to exactly one handler here. Payloads are
//! parsed into typed structs that reject unknown fields.

pub mod batch;
pub mod correlation;
pub mod dsp;
pub mod filter;
pub mod spectral;
pub mod statistics;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sigrun_ipc::OperationKind;
use std::time::Duration;

use crate::error::OperationError;

pub use correlation::{CorrelationPayload, CorrelationReport};
pub use filter::{FilterKind, FilterPayload, FilterReport};
pub use spectral::{EnvelopePayload, EnvelopeReport, FftPayload, FftReport};
pub use statistics::{StatisticsPayload, StatisticsReport};

/// Run one operation. Batches fan out to their entries.
pub async fn dispatch(kind: OperationKind, payload: JsonValue) -> Result<JsonValue, OperationError> {
    match kind {
        OperationKind::Batch => batch::run(parse(payload)?).await,
        other => run_single(other, payload).await,
    }
}

/// Like [`dispatch`] but starting from a wire name
pub async fn dispatch_named(name: &str, payload: JsonValue) -> Result<JsonValue, OperationError> {
    let kind = name
        .parse::<OperationKind>()
        .map_err(|_| OperationError::UnknownOperation(name.to_string()))?;
    dispatch(kind, payload).await
}

pub(crate) async fn run_single(kind: OperationKind, payload: JsonValue) -> Result<JsonValue, OperationError> {
    match kind {
        OperationKind::Statistics => to_json(statistics::run(parse(payload)?)?),
        OperationKind::Fft => to_json(spectral::fft(parse(payload)?)?),
        OperationKind::Filter => to_json(filter::run(parse(payload)?)?),
        OperationKind::Envelope => to_json(spectral::envelope(parse(payload)?)?),
        OperationKind::Correlation => to_json(correlation::run(parse(payload)?)?),
        OperationKind::Sleep => sleep(parse(payload)?).await,
        OperationKind::Batch => Err(OperationError::NestedBatch),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SleepPayload {
    pub ms: u64,
}

async fn sleep(payload: SleepPayload) -> Result<JsonValue, OperationError> {
    tokio::time::sleep(Duration::from_millis(payload.ms)).await;
    Ok(serde_json::json!({ "slept_ms": payload.ms }))
}

pub(crate) fn parse<T: DeserializeOwned>(payload: JsonValue) -> Result<T, OperationError> {
    Ok(serde_json::from_value(payload)?)
}

fn to_json<T: Serialize>(report: T) -> Result<JsonValue, OperationError> {
    serde_json::to_value(report).map_err(|e| OperationError::Computation(e.to_string()))
}

pub(crate) fn require_signal(values: &[f64], field: &str) -> Result<(), OperationError> {
    if values.is_empty() {
        return Err(OperationError::InvalidPayload(format!("{field} must not be empty")));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(OperationError::InvalidPayload(format!("{field} must contain only finite numbers")));
    }
    Ok(())
}

pub(crate) fn require_sample_rate(sample_rate: f64) -> Result<(), OperationError> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(())
    } else {
        Err(OperationError::InvalidPayload(format!(
            "sample_rate must be a positive number, got {sample_rate}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_dispatch_statistics() {
        let result = dispatch(OperationKind::Statistics, json!({"values": [1.0, -1.0, 1.0, -1.0]}))
            .await
            .unwrap();
        assert_eq!(result["count"], 4);
        assert_eq!(result["rms"], 1.0);
    }

    #[tokio::test]
    async fn test_unknown_fields_rejected() {
        let err = dispatch(OperationKind::Statistics, json!({"values": [1.0], "extra": true}))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn test_dispatch_named_unknown() {
        let err = dispatch_named("wavelet_packet", json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown operation: wavelet_packet");
    }

    #[tokio::test]
    async fn test_sleep() {
        let result = dispatch(OperationKind::Sleep, json!({"ms": 5})).await.unwrap();
        assert_eq!(result, json!({"slept_ms": 5}));
    }

    #[test]
    fn test_signal_checks() {
        assert!(require_signal(&[1.0], "values").is_ok());
        assert!(require_signal(&[], "values").is_err());
        assert!(require_signal(&[f64::NAN], "values").is_err());
        assert!(require_sample_rate(0.0).is_err());
        assert!(require_sample_rate(f64::INFINITY).is_err());
    }
}
