use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use sigrun_core::{AlgorithmCategory, AlgorithmInput, ComputeOutput, Diagnosis, SignalData, ValidationOutcome};
use sigrun_interfaces::{AlgorithmExecutor, ComputeError, OffloadRequest};
use sigrun_ipc::OperationKind;
use sigrun_runtime::operations::{CorrelationPayload, CorrelationReport};

use super::{check_config, config_of, defaults_of, payload_of, report_of, run_in_process};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorrelationConfig {
    /// First channel name; the first channel when unset
    pub channel_a: Option<String>,
    /// Second channel name; the second channel when unset
    pub channel_b: Option<String>,
    pub max_lag: Option<usize>,
    /// |r| at or above this counts as strongly correlated
    pub strong_threshold: f64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            channel_a: None,
            channel_b: None,
            max_lag: None,
            strong_threshold: 0.8,
        }
    }
}

/// The two channels to correlate
fn channel_pair(input: &AlgorithmInput, config: &CorrelationConfig) -> Result<(Vec<f64>, Vec<f64>), String> {
    match &input.data {
        SignalData::Channels(channels) => {
            let mut names = channels.keys();
            let a = config
                .channel_a
                .clone()
                .or_else(|| names.next().cloned())
                .ok_or("Input has no channels")?;
            let b = config
                .channel_b
                .clone()
                .or_else(|| channels.keys().find(|name| **name != a).cloned())
                .ok_or("Correlation needs two channels")?;
            let lookup = |name: &str| {
                channels
                    .get(name)
                    .cloned()
                    .ok_or_else(|| format!("Channel {name} not found"))
            };
            Ok((lookup(&a)?, lookup(&b)?))
        }
        SignalData::Matrix(rows) if rows.len() >= 2 => Ok((rows[0].clone(), rows[1].clone())),
        _ => Err("Correlation needs two channels or a two-row matrix".to_string()),
    }
}

pub struct CorrelationAlgorithm;

impl CorrelationAlgorithm {
    fn request(&self, input: &AlgorithmInput, config: &JsonValue) -> Result<OffloadRequest, ComputeError> {
        let config: CorrelationConfig = config_of(&self.default_config(), config)?;
        let (a, b) = channel_pair(input, &config).map_err(ComputeError::InvalidInput)?;
        let payload = CorrelationPayload {
            a,
            b,
            max_lag: config.max_lag,
        };
        Ok(OffloadRequest::new(OperationKind::Correlation, payload_of(&payload)?))
    }

    fn interpret(&self, input: &AlgorithmInput, report: CorrelationReport, config: &CorrelationConfig) -> ComputeOutput {
        let strong = report.best_correlation.abs() >= config.strong_threshold;
        let lag_seconds = input
            .sample_rate
            .filter(|rate| *rate > 0.0)
            .map(|rate| report.best_lag as f64 / rate);

        let summary = if strong {
            format!(
                "Channels strongly correlated (r={:.3}) at lag {} samples",
                report.best_correlation, report.best_lag
            )
        } else {
            format!("Channels weakly correlated (best r={:.3})", report.best_correlation)
        };

        let results = json!({
            "coefficient": report.coefficient,
            "best_lag": report.best_lag,
            "best_lag_seconds": lag_seconds,
            "best_correlation": report.best_correlation,
            "max_lag": report.max_lag,
            "correlation": report.correlation,
        });
        ComputeOutput::new(Diagnosis::normal(summary), results)
    }
}

#[async_trait]
impl AlgorithmExecutor for CorrelationAlgorithm {
    fn id(&self) -> &str {
        "correlation"
    }

    fn name(&self) -> &str {
        "Cross-Correlation"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn category(&self) -> AlgorithmCategory {
        AlgorithmCategory::Correlation
    }

    fn validate(&self, input: &AlgorithmInput, config: &JsonValue) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::valid();
        if let Some(parsed) = check_config::<CorrelationConfig>(&mut outcome, &self.default_config(), config) {
            match channel_pair(input, &parsed) {
                Ok((a, b)) => {
                    outcome.require(a.len().min(b.len()) >= 2, "Each channel needs at least two samples");
                    outcome.require(
                        a.iter().chain(&b).all(|v| v.is_finite()),
                        "Input data must contain only finite numbers",
                    );
                }
                Err(reason) => outcome.push(reason),
            }
        }
        outcome
    }

    fn default_config(&self) -> JsonValue {
        defaults_of::<CorrelationConfig>()
    }

    async fn compute(&self, input: &AlgorithmInput, config: &JsonValue) -> Result<ComputeOutput, ComputeError> {
        let result = run_in_process(self.request(input, config)?).await?;
        self.from_offloaded(input, config, result)
    }

    fn offload_request(&self, input: &AlgorithmInput, config: &JsonValue) -> Option<OffloadRequest> {
        self.request(input, config).ok()
    }

    fn from_offloaded(
        &self,
        input: &AlgorithmInput,
        config: &JsonValue,
        result: JsonValue,
    ) -> Result<ComputeOutput, ComputeError> {
        let config: CorrelationConfig = config_of(&self.default_config(), config)?;
        Ok(self.interpret(input, report_of(result)?, &config))
    }
}
