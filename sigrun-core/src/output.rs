//! Result envelope returned by every execution

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::execution::ExecutionId;
use crate::types::Severity;

/// Terminal status of an execution as seen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Human-facing conclusion drawn from an algorithm's results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub summary: String,
    pub severity: Severity,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
}

impl Diagnosis {
    /// A healthy diagnosis with full confidence
    pub fn normal(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            severity: Severity::Normal,
            confidence: 1.0,
            fault_type: None,
            recommendations: Vec::new(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_fault(mut self, fault_type: impl Into<String>) -> Self {
        self.fault_type = Some(fault_type.into());
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendations.push(recommendation.into());
        self
    }

    /// Diagnosis attached to a failed execution
    pub fn execution_failed(error: &str) -> Self {
        Self {
            summary: format!("Algorithm execution failed: {}", error),
            severity: Severity::Critical,
            confidence: 0.0,
            fault_type: None,
            recommendations: vec!["Check the input data and algorithm configuration".to_string()],
        }
    }
}

/// What an executor's compute step produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeOutput {
    pub diagnosis: Diagnosis,
    pub results: JsonValue,
}

impl ComputeOutput {
    pub fn new(diagnosis: Diagnosis, results: JsonValue) -> Self {
        Self { diagnosis, results }
    }
}

/// Execution metadata attached to the envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputMetadata {
    pub execution_id: ExecutionId,
    pub execution_time_ms: u64,
    pub input_data_points: usize,
    pub algorithm_version: String,
    pub parameters: JsonValue,
    #[serde(default)]
    pub cache_hit: bool,
    #[serde(default)]
    pub offloaded: bool,
}

/// The envelope every `execute` call returns, success or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmOutput {
    pub algorithm_id: String,
    pub status: OutputStatus,
    pub diagnosis: Diagnosis,
    pub results: JsonValue,
    pub metadata: OutputMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AlgorithmOutput {
    /// Wrap a successful compute result
    pub fn completed(algorithm_id: impl Into<String>, output: ComputeOutput, metadata: OutputMetadata) -> Self {
        Self {
            algorithm_id: algorithm_id.into(),
            status: OutputStatus::Completed,
            diagnosis: output.diagnosis,
            results: output.results,
            metadata,
            error: None,
        }
    }

    /// Build a failure envelope carrying a readable error
    pub fn failed(algorithm_id: impl Into<String>, error: impl Into<String>, metadata: OutputMetadata) -> Self {
        let error = error.into();
        Self {
            algorithm_id: algorithm_id.into(),
            status: OutputStatus::Failed,
            diagnosis: Diagnosis::execution_failed(&error),
            results: JsonValue::Object(Default::default()),
            metadata,
            error: Some(error),
        }
    }

    /// Build an envelope for an execution cancelled by its caller
    pub fn cancelled(algorithm_id: impl Into<String>, metadata: OutputMetadata) -> Self {
        Self {
            algorithm_id: algorithm_id.into(),
            status: OutputStatus::Cancelled,
            diagnosis: Diagnosis::normal("Execution cancelled before completion").with_confidence(0.0),
            results: JsonValue::Object(Default::default()),
            metadata,
            error: Some("Execution cancelled".to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutputStatus::Completed
    }
}
