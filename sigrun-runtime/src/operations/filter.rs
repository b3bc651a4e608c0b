//! Cascaded first-order IIR filters

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::statistics::rms;
use super::{require_sample_rate, require_signal};
use crate::error::OperationError;

const MAX_ORDER: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Lowpass,
    Highpass,
    Bandpass,
}

fn default_order() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterPayload {
    pub values: Vec<f64>,
    pub sample_rate: f64,
    pub kind: FilterKind,
    /// Highpass cutoff, also the lower band edge
    #[serde(default)]
    pub low_cutoff: Option<f64>,
    /// Lowpass cutoff, also the upper band edge
    #[serde(default)]
    pub high_cutoff: Option<f64>,
    /// Number of cascaded stages
    #[serde(default = "default_order")]
    pub order: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterReport {
    pub values: Vec<f64>,
    pub rms_before: f64,
    pub rms_after: f64,
}

pub fn run(payload: FilterPayload) -> Result<FilterReport, OperationError> {
    let filtered = apply(
        &payload.values,
        payload.sample_rate,
        payload.kind,
        payload.low_cutoff,
        payload.high_cutoff,
        payload.order,
    )?;

    Ok(FilterReport {
        rms_before: rms(&payload.values),
        rms_after: rms(&filtered),
        values: filtered,
    })
}

/// Filter `values`, validating cutoffs against the Nyquist frequency
pub fn apply(
    values: &[f64],
    sample_rate: f64,
    kind: FilterKind,
    low_cutoff: Option<f64>,
    high_cutoff: Option<f64>,
    order: usize,
) -> Result<Vec<f64>, OperationError> {
    require_signal(values, "values")?;
    require_sample_rate(sample_rate)?;
    if !(1..=MAX_ORDER).contains(&order) {
        return Err(OperationError::InvalidPayload(format!(
            "order must be between 1 and {MAX_ORDER}, got {order}"
        )));
    }

    let nyquist = sample_rate / 2.0;
    let cutoff = |value: Option<f64>, name: &str| -> Result<f64, OperationError> {
        let value = value.ok_or_else(|| {
            OperationError::InvalidPayload(format!("{name} is required for a {kind:?} filter"))
        })?;
        if !(value > 0.0 && value < nyquist) {
            return Err(OperationError::Computation(format!(
                "{name} {value} Hz must lie between 0 and the Nyquist frequency {nyquist} Hz"
            )));
        }
        Ok(value)
    };

    let dt = 1.0 / sample_rate;
    let mut out = values.to_vec();
    match kind {
        FilterKind::Lowpass => {
            let fc = cutoff(high_cutoff, "high_cutoff")?;
            for _ in 0..order {
                out = lowpass(&out, fc, dt);
            }
        }
        FilterKind::Highpass => {
            let fc = cutoff(low_cutoff, "low_cutoff")?;
            for _ in 0..order {
                out = highpass(&out, fc, dt);
            }
        }
        FilterKind::Bandpass => {
            let low = cutoff(low_cutoff, "low_cutoff")?;
            let high = cutoff(high_cutoff, "high_cutoff")?;
            if low >= high {
                return Err(OperationError::InvalidPayload(format!(
                    "low_cutoff ({low}) must be below high_cutoff ({high})"
                )));
            }
            for _ in 0..order {
                out = lowpass(&highpass(&out, low, dt), high, dt);
            }
        }
    }
    Ok(out)
}

fn lowpass(values: &[f64], cutoff: f64, dt: f64) -> Vec<f64> {
    let rc = 1.0 / (2.0 * PI * cutoff);
    let alpha = dt / (rc + dt);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = values[0];
    for &x in values {
        prev += alpha * (x - prev);
        out.push(prev);
    }
    out
}

fn highpass(values: &[f64], cutoff: f64, dt: f64) -> Vec<f64> {
    let rc = 1.0 / (2.0 * PI * cutoff);
    let alpha = rc / (rc + dt);
    let mut out = Vec::with_capacity(values.len());
    let (mut prev_y, mut prev_x) = (0.0, values[0]);
    for &x in values {
        prev_y = alpha * (prev_y + x - prev_x);
        prev_x = x;
        out.push(prev_y);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| (2.0 * PI * freq * i as f64 / fs).sin()).collect()
    }

    #[test]
    fn test_lowpass_attenuates_high_frequency() {
        let fs = 1000.0;
        let slow = apply(&sine(5.0, fs, 2000), fs, FilterKind::Lowpass, None, Some(20.0), 1).unwrap();
        let fast = apply(&sine(200.0, fs, 2000), fs, FilterKind::Lowpass, None, Some(20.0), 1).unwrap();

        assert!(rms(&slow) > 0.6);
        assert!(rms(&fast) < 0.15);
    }

    #[test]
    fn test_highpass_removes_offset() {
        let values = vec![5.0; 256];
        let out = apply(&values, 100.0, FilterKind::Highpass, Some(1.0), None, 2).unwrap();
        assert!(out.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_cutoff_validation() {
        let values = sine(5.0, 100.0, 64);
        let err = apply(&values, 100.0, FilterKind::Lowpass, None, Some(80.0), 1).unwrap_err();
        assert!(matches!(err, OperationError::Computation(_)));

        let err = apply(&values, 100.0, FilterKind::Bandpass, Some(20.0), Some(10.0), 1).unwrap_err();
        assert!(matches!(err, OperationError::InvalidPayload(_)));

        let err = apply(&values, 100.0, FilterKind::Highpass, None, None, 1).unwrap_err();
        assert!(err.to_string().contains("low_cutoff is required"));

        let err = apply(&values, 100.0, FilterKind::Highpass, Some(1.0), None, 0).unwrap_err();
        assert!(err.to_string().contains("order must be between"));
    }

    #[test]
    fn test_run_reports_rms() {
        let report = run(FilterPayload {
            values: sine(200.0, 1000.0, 1000),
            sample_rate: 1000.0,
            kind: FilterKind::Lowpass,
            low_cutoff: None,
            high_cutoff: Some(10.0),
            order: 2,
        })
        .unwrap();
        assert_eq!(report.values.len(), 1000);
        assert!(report.rms_after < report.rms_before);
    }
}
