use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use sigrun_core::{AlgorithmCategory, AlgorithmInput, ComputeOutput, Diagnosis, Severity, ValidationOutcome};
use sigrun_interfaces::{AlgorithmExecutor, ComputeError, OffloadRequest};
use sigrun_ipc::OperationKind;
use sigrun_runtime::operations::dsp::{Peak, Window};
use sigrun_runtime::operations::{EnvelopePayload, EnvelopeReport, FftPayload, FftReport};

use super::{check_config, check_signal, config_of, defaults_of, payload_of, report_of, run_in_process, sample_rate};

/// Fewer samples than this give a useless spectrum
const MIN_SPECTRUM_POINTS: usize = 8;

/// Orders closer than this to an integer are attributed to it
const ORDER_TOLERANCE: f64 = 0.1;

/// Shaft rotation frequency in Hz, when the equipment speed is known
fn shaft_frequency(input: &AlgorithmInput) -> Option<f64> {
    input
        .equipment
        .as_ref()
        .and_then(|e| e.running_speed_rpm.or(e.rated_speed_rpm))
        .filter(|rpm| *rpm > 0.0)
        .map(|rpm| rpm / 60.0)
}

/// Attach shaft-order information for `dominant` to `results`
fn add_orders(results: &mut JsonValue, input: &AlgorithmInput, dominant: Option<&Peak>) -> Option<f64> {
    let shaft = shaft_frequency(input)?;
    let order = dominant.map(|peak| peak.frequency / shaft);
    if let JsonValue::Object(map) = results {
        map.insert("shaft_frequency".to_string(), json!(shaft));
        map.insert("dominant_order".to_string(), json!(order));
    }
    order
}

fn near_order(order: f64, target: f64) -> bool {
    (order - target).abs() < ORDER_TOLERANCE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FftConfig {
    pub window: Window,
    /// Number of peaks reported
    pub peaks: usize,
    /// Include the full spectrum in the results
    pub include_spectrum: bool,
    /// Dominant amplitude above which the spectrum is flagged
    pub amplitude_limit: Option<f64>,
}

impl Default for FftConfig {
    fn default() -> Self {
        Self {
            window: Window::Hann,
            peaks: 5,
            include_spectrum: false,
            amplitude_limit: None,
        }
    }
}

pub struct FftAlgorithm;

impl FftAlgorithm {
    fn request(&self, input: &AlgorithmInput, config: &JsonValue) -> Result<OffloadRequest, ComputeError> {
        let config: FftConfig = config_of(&self.default_config(), config)?;
        let payload = FftPayload {
            values: input.data.primary(),
            sample_rate: sample_rate(input)?,
            window: config.window,
            peaks: config.peaks,
            include_spectrum: config.include_spectrum,
        };
        Ok(OffloadRequest::new(OperationKind::Fft, payload_of(&payload)?))
    }

    fn interpret(&self, input: &AlgorithmInput, report: FftReport, config: &FftConfig) -> Result<ComputeOutput, ComputeError> {
        let mut results = serde_json::to_value(&report).map_err(|e| ComputeError::Failed(e.to_string()))?;
        let order = add_orders(&mut results, input, report.dominant.as_ref());

        let Some(dominant) = report.dominant else {
            let diagnosis = Diagnosis::normal("No spectral peaks found").with_confidence(0.5);
            return Ok(ComputeOutput::new(diagnosis, results));
        };

        let exceeded = config
            .amplitude_limit
            .is_some_and(|limit| dominant.magnitude > limit);

        let diagnosis = if exceeded {
            let base = Diagnosis::normal(format!(
                "Dominant component at {:.2} Hz with amplitude {:.4} exceeds limit",
                dominant.frequency, dominant.magnitude
            ))
            .with_severity(Severity::Warning)
            .with_confidence(0.7);

            match order {
                Some(o) if near_order(o, 1.0) => base
                    .with_fault("imbalance")
                    .with_recommendation("Check rotor balance"),
                Some(o) if near_order(o, 2.0) => base
                    .with_fault("misalignment")
                    .with_recommendation("Check shaft alignment and coupling"),
                _ => base.with_recommendation("Identify the source of the dominant component"),
            }
        } else {
            Diagnosis::normal(format!(
                "Dominant component at {:.2} Hz within limits",
                dominant.frequency
            ))
            .with_confidence(0.9)
        };

        Ok(ComputeOutput::new(diagnosis, results))
    }
}

#[async_trait]
impl AlgorithmExecutor for FftAlgorithm {
    fn id(&self) -> &str {
        "fft"
    }

    fn name(&self) -> &str {
        "FFT Spectrum Analysis"
    }

    fn version(&self) -> &str {
        "1.2.0"
    }

    fn category(&self) -> AlgorithmCategory {
        AlgorithmCategory::Spectral
    }

    fn validate(&self, input: &AlgorithmInput, config: &JsonValue) -> ValidationOutcome {
        let mut outcome = check_signal(input, MIN_SPECTRUM_POINTS, true);
        if let Some(parsed) = check_config::<FftConfig>(&mut outcome, &self.default_config(), config) {
            outcome.require(parsed.peaks > 0, "peaks must be at least 1");
        }
        outcome
    }

    fn default_config(&self) -> JsonValue {
        defaults_of::<FftConfig>()
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
        let config: FftConfig = config_of(&self.default_config(), config)?;
        self.interpret(input, report_of(result)?, &config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvelopeConfig {
    /// Lower edge of the demodulation band in Hz
    pub band_low: Option<f64>,
    /// Upper edge of the demodulation band in Hz
    pub band_high: Option<f64>,
    pub peaks: usize,
    /// Envelope RMS above which a bearing defect is suspected
    pub envelope_rms_limit: Option<f64>,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            band_low: None,
            band_high: None,
            peaks: 5,
            envelope_rms_limit: None,
        }
    }
}

impl EnvelopeConfig {
    fn band(&self) -> Option<[f64; 2]> {
        match (self.band_low, self.band_high) {
            (Some(low), Some(high)) => Some([low, high]),
            _ => None,
        }
    }
}

pub struct EnvelopeAlgorithm;

impl EnvelopeAlgorithm {
    fn request(&self, input: &AlgorithmInput, config: &JsonValue) -> Result<OffloadRequest, ComputeError> {
        let config: EnvelopeConfig = config_of(&self.default_config(), config)?;
        let payload = EnvelopePayload {
            values: input.data.primary(),
            sample_rate: sample_rate(input)?,
            band: config.band(),
            peaks: config.peaks,
        };
        Ok(OffloadRequest::new(OperationKind::Envelope, payload_of(&payload)?))
    }

    fn interpret(&self, input: &AlgorithmInput, report: EnvelopeReport, config: &EnvelopeConfig) -> Result<ComputeOutput, ComputeError> {
        let mut results = serde_json::to_value(&report).map_err(|e| ComputeError::Failed(e.to_string()))?;
        add_orders(&mut results, input, report.dominant.as_ref());

        let exceeded = config
            .envelope_rms_limit
            .is_some_and(|limit| report.envelope_rms > limit);

        let diagnosis = if exceeded {
            let mut diagnosis = Diagnosis::normal(format!(
                "Envelope RMS {:.4} exceeds limit",
                report.envelope_rms
            ))
            .with_severity(Severity::Warning)
            .with_confidence(0.7)
            .with_fault("bearing_defect")
            .with_recommendation("Compare envelope peaks with bearing defect frequencies");
            if let Some(peak) = report.dominant {
                diagnosis.summary.push_str(&format!(", strongest modulation at {:.2} Hz", peak.frequency));
            }
            diagnosis
        } else {
            Diagnosis::normal("Envelope energy within limits").with_confidence(0.85)
        };

        Ok(ComputeOutput::new(diagnosis, results))
    }
}

#[async_trait]
impl AlgorithmExecutor for EnvelopeAlgorithm {
    fn id(&self) -> &str {
        "envelope"
    }

    fn name(&self) -> &str {
        "Envelope Demodulation"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn category(&self) -> AlgorithmCategory {
        AlgorithmCategory::Spectral
    }

    fn validate(&self, input: &AlgorithmInput, config: &JsonValue) -> ValidationOutcome {
        let mut outcome = check_signal(input, MIN_SPECTRUM_POINTS, true);
        if let Some(parsed) = check_config::<EnvelopeConfig>(&mut outcome, &self.default_config(), config) {
            match (parsed.band_low, parsed.band_high) {
                (Some(low), Some(high)) => {
                    outcome.require(low > 0.0 && low < high, "band_low must be positive and below band_high")
                }
                (None, None) => {}
                _ => outcome.push("band_low and band_high must be given together"),
            }
            outcome.require(parsed.peaks > 0, "peaks must be at least 1");
        }
        outcome
    }

    fn default_config(&self) -> JsonValue {
        defaults_of::<EnvelopeConfig>()
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
        let config: EnvelopeConfig = config_of(&self.default_config(), config)?;
        self.interpret(input, report_of(result)?, &config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigrun_core::EquipmentContext;
    use std::f64::consts::PI;

    fn tone(frequency: f64, amplitude: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| amplitude * (2.0 * PI * frequency * i as f64 / sample_rate).sin())
            .collect()
    }

    #[tokio::test]
    async fn test_fft_finds_dominant_frequency() {
        let input = AlgorithmInput::series(tone(50.0, 1.0, 1024.0, 1024), 1024.0);
        let output = FftAlgorithm.compute(&input, &json!({})).await.unwrap();

        let dominant = output.results["dominant"]["frequency"].as_f64().unwrap();
        assert!((dominant - 50.0).abs() <= 1.0, "dominant at {dominant}");
        assert_eq!(output.diagnosis.severity, Severity::Normal);
        assert!(output.results.get("spectrum").is_none());
    }

    #[tokio::test]
    async fn test_fft_flags_imbalance_at_running_speed() {
        // 1500 rpm shaft, 25 Hz component
        let input = AlgorithmInput::series(tone(25.0, 2.0, 1024.0, 1024), 1024.0).with_equipment(EquipmentContext {
            equipment_id: "pump-7".to_string(),
            running_speed_rpm: Some(1500.0),
            ..Default::default()
        });

        let output = FftAlgorithm
            .compute(&input, &json!({"amplitude_limit": 0.5}))
            .await
            .unwrap();
        assert_eq!(output.diagnosis.severity, Severity::Warning);
        assert_eq!(output.diagnosis.fault_type.as_deref(), Some("imbalance"));
        assert_eq!(output.results["shaft_frequency"], 25.0);
    }

    #[test]
    fn test_fft_requires_sample_rate() {
        let mut input = AlgorithmInput::series(vec![0.0; 64], 1.0);
        input.sample_rate = None;
        let outcome = FftAlgorithm.validate(&input, &json!({}));
        assert!(!outcome.valid);
        assert!(outcome.message().contains("sampleRate"));
    }

    #[test]
    fn test_offload_request_matches_operation() {
        let input = AlgorithmInput::series(vec![0.0; 64], 128.0);
        let request = FftAlgorithm.offload_request(&input, &json!({"peaks": 3})).unwrap();
        assert_eq!(request.operation, OperationKind::Fft);
        assert_eq!(request.payload["peaks"], 3);
        assert_eq!(request.payload["sample_rate"], 128.0);
    }

    #[tokio::test]
    async fn test_envelope_detects_modulation() {
        let fs = 4096.0;
        let values: Vec<f64> = (0..4096)
            .map(|i| {
                let t = i as f64 / fs;
                (1.0 + 0.8 * (2.0 * PI * 30.0 * t).sin()) * (2.0 * PI * 800.0 * t).sin()
            })
            .collect();
        let input = AlgorithmInput::series(values, fs);

        let output = EnvelopeAlgorithm
            .compute(&input, &json!({"envelope_rms_limit": 0.1}))
            .await
            .unwrap();
        let modulation = output.results["dominant"]["frequency"].as_f64().unwrap();
        assert!((modulation - 30.0).abs() <= 2.0, "modulation at {modulation}");
        assert_eq!(output.diagnosis.fault_type.as_deref(), Some("bearing_defect"));
    }

    #[test]
    fn test_envelope_band_validation() {
        let input = AlgorithmInput::series(vec![0.0; 64], 1000.0);
        assert!(!EnvelopeAlgorithm.validate(&input, &json!({"band_low": 100.0})).valid);
        assert!(!EnvelopeAlgorithm
            .validate(&input, &json!({"band_low": 300.0, "band_high": 100.0}))
            .valid);
        assert!(EnvelopeAlgorithm
            .validate(&input, &json!({"band_low": 100.0, "band_high": 300.0}))
            .valid);
    }
}
