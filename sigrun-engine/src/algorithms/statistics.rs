use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sigrun_core::{AlgorithmCategory, AlgorithmInput, ComputeOutput, Diagnosis, Severity, ValidationOutcome};
use sigrun_interfaces::{AlgorithmExecutor, ComputeError, OffloadRequest};
use sigrun_ipc::OperationKind;
use sigrun_runtime::operations::{StatisticsPayload, StatisticsReport};

use super::{check_config, check_signal, config_of, defaults_of, payload_of, report_of, run_in_process};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatisticsConfig {
    /// Crest factor above which the signal counts as impulsive
    pub crest_factor_limit: f64,
    /// Kurtosis above which the signal counts as impulsive
    pub kurtosis_limit: f64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            crest_factor_limit: 6.0,
            kurtosis_limit: 4.0,
        }
    }
}

pub struct StatisticsAlgorithm;

impl StatisticsAlgorithm {
    fn request(&self, input: &AlgorithmInput) -> Result<OffloadRequest, ComputeError> {
        let payload = StatisticsPayload {
            values: input.data.primary(),
        };
        Ok(OffloadRequest::new(OperationKind::Statistics, payload_of(&payload)?))
    }

    fn interpret(&self, report: StatisticsReport, config: &StatisticsConfig) -> Result<ComputeOutput, ComputeError> {
        let crest_high = report.crest_factor > config.crest_factor_limit;
        let kurtosis_high = report.kurtosis > config.kurtosis_limit;

        let diagnosis = match (crest_high, kurtosis_high) {
            (true, true) => Diagnosis::normal(format!(
                "Impulsive signal: crest factor {:.2}, kurtosis {:.2}",
                report.crest_factor, report.kurtosis
            ))
            .with_severity(Severity::Warning)
            .with_confidence(0.8)
            .with_fault("impulsive")
            .with_recommendation("Inspect bearings and gear meshes for impacts"),
            (true, false) | (false, true) => Diagnosis::normal(format!(
                "Elevated impulsiveness: crest factor {:.2}, kurtosis {:.2}",
                report.crest_factor, report.kurtosis
            ))
            .with_severity(Severity::Attention)
            .with_confidence(0.6)
            .with_recommendation("Trend this measurement"),
            (false, false) => Diagnosis::normal("Signal statistics within limits").with_confidence(0.9),
        };

        let results = serde_json::to_value(&report)
            .map_err(|e| ComputeError::Failed(e.to_string()))?;
        Ok(ComputeOutput::new(diagnosis, results))
    }
}

#[async_trait]
impl AlgorithmExecutor for StatisticsAlgorithm {
    fn id(&self) -> &str {
        "statistics"
    }

    fn name(&self) -> &str {
        "Descriptive Statistics"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn category(&self) -> AlgorithmCategory {
        AlgorithmCategory::Statistical
    }

    fn validate(&self, input: &AlgorithmInput, config: &JsonValue) -> ValidationOutcome {
        let mut outcome = check_signal(input, 1, false);
        check_config::<StatisticsConfig>(&mut outcome, &self.default_config(), config);
        outcome
    }

    fn default_config(&self) -> JsonValue {
        defaults_of::<StatisticsConfig>()
    }

    async fn compute(&self, input: &AlgorithmInput, config: &JsonValue) -> Result<ComputeOutput, ComputeError> {
        let result = run_in_process(self.request(input)?).await?;
        self.from_offloaded(input, config, result)
    }

    fn offload_request(&self, input: &AlgorithmInput, _config: &JsonValue) -> Option<OffloadRequest> {
        self.request(input).ok()
    }

    fn from_offloaded(
        &self,
        _input: &AlgorithmInput,
        config: &JsonValue,
        result: JsonValue,
    ) -> Result<ComputeOutput, ComputeError> {
        let config: StatisticsConfig = config_of(&self.default_config(), config)?;
        self.interpret(report_of(result)?, &config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_smooth_signal_is_normal() {
        let values: Vec<f64> = (0..256).map(|i| (i as f64 * 0.1).sin()).collect();
        let input = AlgorithmInput::series(values, 100.0);

        let output = StatisticsAlgorithm.compute(&input, &json!({})).await.unwrap();
        assert_eq!(output.diagnosis.severity, Severity::Normal);
        assert_eq!(output.results["count"], 256);
    }

    #[tokio::test]
    async fn test_impulsive_signal_is_flagged() {
        let mut values = vec![0.01; 500];
        values[250] = 10.0;
        let input = AlgorithmInput::series(values, 100.0);

        let output = StatisticsAlgorithm.compute(&input, &json!({})).await.unwrap();
        assert_eq!(output.diagnosis.severity, Severity::Warning);
        assert_eq!(output.diagnosis.fault_type.as_deref(), Some("impulsive"));
    }

    #[test]
    fn test_validation() {
        let empty = AlgorithmInput::series(vec![], 100.0);
        assert!(!StatisticsAlgorithm.validate(&empty, &json!({})).valid);

        let input = AlgorithmInput::series(vec![1.0, 2.0], 100.0);
        let outcome = StatisticsAlgorithm.validate(&input, &json!({"kurtosis_limt": 3.0}));
        assert!(!outcome.valid);
        assert!(outcome.message().contains("kurtosis_limt"));
    }
}
