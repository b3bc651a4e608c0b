//! Time-domain descriptive statistics

use serde::{Deserialize, Serialize};

use super::require_signal;
use crate::error::OperationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatisticsPayload {
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub rms: f64,
    pub min: f64,
    pub max: f64,
    /// Largest absolute sample
    pub peak: f64,
    pub peak_to_peak: f64,
    /// `peak / rms`, zero for a silent signal
    pub crest_factor: f64,
    pub skewness: f64,
    /// Pearson kurtosis (3.0 for a Gaussian)
    pub kurtosis: f64,
}

pub fn run(payload: StatisticsPayload) -> Result<StatisticsReport, OperationError> {
    require_signal(&payload.values, "values")?;
    Ok(describe(&payload.values))
}

/// Describe a non-empty series
pub fn describe(values: &[f64]) -> StatisticsReport {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;

    let (mut m2, mut m3, mut m4, mut squares) = (0.0, 0.0, 0.0, 0.0);
    let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
    for &v in values {
        let d = v - mean;
        m2 += d * d;
        m3 += d * d * d;
        m4 += d * d * d * d;
        squares += v * v;
        min = min.min(v);
        max = max.max(v);
    }
    m2 /= n;
    m3 /= n;
    m4 /= n;

    let std_dev = m2.sqrt();
    let rms = (squares / n).sqrt();
    let peak = min.abs().max(max.abs());

    StatisticsReport {
        count: values.len(),
        mean,
        std_dev,
        rms,
        min,
        max,
        peak,
        peak_to_peak: max - min,
        crest_factor: if rms > 0.0 { peak / rms } else { 0.0 },
        skewness: if m2 > 0.0 { m3 / m2.powf(1.5) } else { 0.0 },
        kurtosis: if m2 > 0.0 { m4 / (m2 * m2) } else { 0.0 },
    }
}

pub fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_wave() {
        let report = describe(&[2.0, -2.0, 2.0, -2.0]);
        assert_eq!(report.count, 4);
        assert_eq!(report.mean, 0.0);
        assert_eq!(report.rms, 2.0);
        assert_eq!(report.peak, 2.0);
        assert_eq!(report.peak_to_peak, 4.0);
        assert_eq!(report.crest_factor, 1.0);
        assert_eq!(report.kurtosis, 1.0);
    }

    #[test]
    fn test_impulse_raises_crest_factor() {
        let mut values = vec![0.1; 99];
        values.push(10.0);
        let report = describe(&values);
        assert!(report.crest_factor > 5.0);
        assert!(report.kurtosis > 10.0);
        assert!(report.skewness > 0.0);
    }

    #[test]
    fn test_constant_signal() {
        let report = describe(&[3.0; 10]);
        assert_eq!(report.std_dev, 0.0);
        assert_eq!(report.skewness, 0.0);
        assert_eq!(report.kurtosis, 0.0);
        assert_eq!(report.crest_factor, 1.0);
    }

    #[test]
    fn test_empty_rejected() {
        let err = run(StatisticsPayload { values: vec![] }).unwrap_err();
        assert_eq!(err.to_string(), "Invalid payload: values must not be empty");
    }
}
