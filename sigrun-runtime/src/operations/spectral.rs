//! Frequency-domain operations: amplitude spectrum and envelope spectrum

use serde::{Deserialize, Serialize};

use super::dsp::{hilbert_envelope, Peak, Spectrum, Window};
use super::filter::{apply, FilterKind};
use super::statistics::rms;
use super::{require_sample_rate, require_signal};
use crate::error::OperationError;

fn default_peaks() -> usize {
    5
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FftPayload {
    pub values: Vec<f64>,
    pub sample_rate: f64,
    #[serde(default)]
    pub window: Window,
    /// How many peaks to report
    #[serde(default = "default_peaks")]
    pub peaks: usize,
    #[serde(default = "default_true")]
    pub include_spectrum: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FftReport {
    pub resolution: f64,
    pub dominant: Option<Peak>,
    pub peaks: Vec<Peak>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectrum: Option<Spectrum>,
}

pub fn fft(payload: FftPayload) -> Result<FftReport, OperationError> {
    require_signal(&payload.values, "values")?;
    require_sample_rate(payload.sample_rate)?;

    let spectrum = Spectrum::of(&payload.values, payload.sample_rate, payload.window);
    let peaks = spectrum.peaks(payload.peaks);

    Ok(FftReport {
        resolution: spectrum.resolution,
        dominant: peaks.first().copied(),
        peaks,
        spectrum: payload.include_spectrum.then_some(spectrum),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvelopePayload {
    pub values: Vec<f64>,
    pub sample_rate: f64,
    /// Optional `[low, high]` band-pass applied before demodulation
    #[serde(default)]
    pub band: Option<[f64; 2]>,
    #[serde(default = "default_peaks")]
    pub peaks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeReport {
    pub envelope_rms: f64,
    pub envelope_peak: f64,
    pub resolution: f64,
    pub dominant: Option<Peak>,
    pub peaks: Vec<Peak>,
}

pub fn envelope(payload: EnvelopePayload) -> Result<EnvelopeReport, OperationError> {
    require_signal(&payload.values, "values")?;
    require_sample_rate(payload.sample_rate)?;

    let signal = match payload.band {
        Some([low, high]) => apply(
            &payload.values,
            payload.sample_rate,
            FilterKind::Bandpass,
            Some(low),
            Some(high),
            2,
        )?,
        None => payload.values,
    };

    let envelope = hilbert_envelope(&signal);
    let mean = envelope.iter().sum::<f64>() / envelope.len() as f64;
    let centered: Vec<f64> = envelope.iter().map(|v| v - mean).collect();

    let spectrum = Spectrum::of(&centered, payload.sample_rate, Window::Hann);
    let peaks = spectrum.peaks(payload.peaks);

    Ok(EnvelopeReport {
        envelope_rms: rms(&envelope),
        envelope_peak: envelope.iter().cloned().fold(0.0, f64::max),
        resolution: spectrum.resolution,
        dominant: peaks.first().copied(),
        peaks,
    })
}
