use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use sigrun_core::{AlgorithmCategory, AlgorithmInput, ComputeOutput, Diagnosis, ValidationOutcome};
use sigrun_interfaces::{AlgorithmExecutor, ComputeError, OffloadRequest};
use sigrun_ipc::OperationKind;
use sigrun_runtime::operations::{FilterKind, FilterPayload, FilterReport};

use super::{check_config, check_signal, config_of, defaults_of, payload_of, report_of, run_in_process, sample_rate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    pub kind: FilterKind,
    /// Highpass cutoff and lower band edge, in Hz
    pub low_cutoff: Option<f64>,
    /// Lowpass cutoff and upper band edge, in Hz
    pub high_cutoff: Option<f64>,
    pub order: usize,
    /// Return the filtered samples
    pub include_values: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            kind: FilterKind::Lowpass,
            low_cutoff: None,
            high_cutoff: None,
            order: 2,
            include_values: true,
        }
    }
}

pub struct FilterAlgorithm;

impl FilterAlgorithm {
    fn request(&self, input: &AlgorithmInput, config: &JsonValue) -> Result<OffloadRequest, ComputeError> {
        let config: FilterConfig = config_of(&self.default_config(), config)?;
        let payload = FilterPayload {
            values: input.data.primary(),
            sample_rate: sample_rate(input)?,
            kind: config.kind,
            low_cutoff: config.low_cutoff,
            high_cutoff: config.high_cutoff,
            order: config.order,
        };
        Ok(OffloadRequest::new(OperationKind::Filter, payload_of(&payload)?))
    }

    fn interpret(&self, report: FilterReport, config: &FilterConfig) -> ComputeOutput {
        let retained = if report.rms_before > 0.0 {
            report.rms_after / report.rms_before
        } else {
            1.0
        };
        // Fully suppressed output has no finite attenuation
        let attenuation_db = (retained > 0.0).then(|| -20.0 * retained.log10());

        let mut results = json!({
            "rms_before": report.rms_before,
            "rms_after": report.rms_after,
            "attenuation_db": attenuation_db,
            "samples": report.values.len(),
        });
        if config.include_values {
            results["values"] = json!(report.values);
        }

        let diagnosis = Diagnosis::normal(format!(
            "Filtered signal retains {:.1}% of its RMS",
            retained * 100.0
        ));
        ComputeOutput::new(diagnosis, results)
    }
}

#[async_trait]
impl AlgorithmExecutor for FilterAlgorithm {
    fn id(&self) -> &str {
        "filter"
    }

    fn name(&self) -> &str {
        "Signal Filter"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn category(&self) -> AlgorithmCategory {
        AlgorithmCategory::Filtering
    }

    fn validate(&self, input: &AlgorithmInput, config: &JsonValue) -> ValidationOutcome {
        let mut outcome = check_signal(input, 2, true);
        if let Some(parsed) = check_config::<FilterConfig>(&mut outcome, &self.default_config(), config) {
            match parsed.kind {
                FilterKind::Lowpass => outcome.require(parsed.high_cutoff.is_some(), "lowpass needs high_cutoff"),
                FilterKind::Highpass => outcome.require(parsed.low_cutoff.is_some(), "highpass needs low_cutoff"),
                FilterKind::Bandpass => outcome.require(
                    parsed.low_cutoff.is_some() && parsed.high_cutoff.is_some(),
                    "bandpass needs low_cutoff and high_cutoff",
                ),
            }
            if let (Some(nyquist), Some(cutoff)) = (
                input.sample_rate.map(|rate| rate / 2.0),
                parsed.high_cutoff.or(parsed.low_cutoff),
            ) {
                outcome.require(cutoff < nyquist, format!("cutoff {cutoff} Hz must be below Nyquist ({nyquist} Hz)"));
            }
            outcome.require(parsed.order > 0, "order must be at least 1");
        }
        outcome
    }

    fn default_config(&self) -> JsonValue {
        defaults_of::<FilterConfig>()
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
        _input: &AlgorithmInput,
        config: &JsonValue,
        result: JsonValue,
    ) -> Result<ComputeOutput, ComputeError> {
        let config: FilterConfig = config_of(&self.default_config(), config)?;
        Ok(self.interpret(report_of(result)?, &config))
    }
}
