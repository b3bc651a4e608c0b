//! Shipped algorithms
//!
//! Each executor builds the payload of one worker operation, so the same
//! computation runs in-process through [`sigrun_runtime::dispatch`] or on a
//! worker through the offloader, and both paths share one interpretation of
//! the result.

mod correlation;
mod filter;
mod spectrum;
mod statistics;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use sigrun_core::{typed_config, AlgorithmInput, CoreError, ValidationOutcome};
use sigrun_interfaces::{ComputeError, OffloadRequest};
use sigrun_runtime::OperationError;

use crate::registry::{AlgorithmDescriptor, AlgorithmMetadata};

pub use correlation::CorrelationAlgorithm;
pub use filter::FilterAlgorithm;
pub use spectrum::{EnvelopeAlgorithm, FftAlgorithm};
pub use statistics::StatisticsAlgorithm;

/// Descriptors for every shipped algorithm
pub fn builtin_algorithms() -> Vec<AlgorithmDescriptor> {
    vec![
        AlgorithmDescriptor::new(
            Arc::new(StatisticsAlgorithm),
            AlgorithmMetadata::new("Time-domain statistics with impulsiveness screening")
                .with_tags(["time-domain", "screening"]),
        ),
        AlgorithmDescriptor::new(
            Arc::new(FftAlgorithm),
            AlgorithmMetadata::new("Amplitude spectrum with dominant peaks and shaft orders")
                .with_tags(["frequency-domain", "imbalance", "misalignment"])
                .with_device_types(["motor", "pump", "fan", "gearbox", "compressor"]),
        ),
        AlgorithmDescriptor::new(
            Arc::new(EnvelopeAlgorithm),
            AlgorithmMetadata::new("Envelope spectrum for bearing defect detection")
                .with_tags(["frequency-domain", "bearing"])
                .with_device_types(["motor", "pump", "fan", "gearbox"]),
        ),
        AlgorithmDescriptor::new(
            Arc::new(FilterAlgorithm),
            AlgorithmMetadata::new("Low-pass, high-pass and band-pass filtering")
                .with_tags(["preprocessing"]),
        ),
        AlgorithmDescriptor::new(
            Arc::new(CorrelationAlgorithm),
            AlgorithmMetadata::new("Correlation and lag between two channels")
                .with_tags(["multi-channel", "propagation"]),
        ),
    ]
}

/// Serialised default of a typed config
fn defaults_of<T: Serialize + Default>() -> JsonValue {
    serde_json::to_value(T::default()).unwrap_or_else(|_| JsonValue::Object(Default::default()))
}

/// Typed config from defaults overlaid with `config`
fn config_of<T: DeserializeOwned>(defaults: &JsonValue, config: &JsonValue) -> Result<T, ComputeError> {
    Ok(typed_config(defaults, config)?)
}

/// Record a problem with the caller's config on `outcome`
fn check_config<T: DeserializeOwned>(outcome: &mut ValidationOutcome, defaults: &JsonValue, config: &JsonValue) -> Option<T> {
    match typed_config::<T>(defaults, config) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            outcome.push(err.to_string());
            None
        }
    }
}

/// Common checks on a sampled signal
fn check_signal(input: &AlgorithmInput, min_points: usize, needs_sample_rate: bool) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::valid();
    let points = input.data_points();

    outcome.require(points > 0, "Input data must not be empty");
    if points > 0 {
        outcome.require(
            points >= min_points,
            format!("At least {min_points} samples are required, got {points}"),
        );
    }
    outcome.require(
        input.data.primary().iter().all(|v| v.is_finite()),
        "Input data must contain only finite numbers",
    );
    if needs_sample_rate {
        outcome.require(
            input.sample_rate.is_some_and(|rate| rate.is_finite() && rate > 0.0),
            "A positive sampleRate is required",
        );
    }
    outcome
}

fn sample_rate(input: &AlgorithmInput) -> Result<f64, ComputeError> {
    input
        .sample_rate
        .ok_or_else(|| ComputeError::InvalidInput("sampleRate is required".to_string()))
}

/// Run the worker operation on the current task
async fn run_in_process(request: OffloadRequest) -> Result<JsonValue, ComputeError> {
    sigrun_runtime::dispatch(request.operation, request.payload)
        .await
        .map_err(operation_error)
}

fn operation_error(err: OperationError) -> ComputeError {
    match err {
        OperationError::InvalidPayload(message) => ComputeError::InvalidInput(message),
        other => ComputeError::Failed(other.to_string()),
    }
}

/// Decode a worker result into its report type
fn report_of<T: DeserializeOwned>(result: JsonValue) -> Result<T, ComputeError> {
    serde_json::from_value(result)
        .map_err(|e| ComputeError::Failed(format!("Malformed operation result: {e}")))
}

fn payload_of<T: Serialize>(payload: &T) -> Result<JsonValue, ComputeError> {
    serde_json::to_value(payload).map_err(|e| ComputeError::Config(CoreError::Serialization(e)))
}
