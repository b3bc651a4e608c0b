//! Pearson and normalised cross-correlation between two channels

use serde::{Deserialize, Serialize};

use super::require_signal;
use crate::error::OperationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorrelationPayload {
    pub a: Vec<f64>,
    pub b: Vec<f64>,
    /// Largest shift examined in either direction; defaults to a quarter
    /// of the shorter channel
    #[serde(default)]
    pub max_lag: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationReport {
    /// Pearson coefficient at zero lag
    pub coefficient: f64,
    /// Shift (in samples) by which `b` trails `a` at the strongest correlation
    pub best_lag: i64,
    pub best_correlation: f64,
    pub max_lag: usize,
    /// Correlation for lags `-max_lag..=max_lag`
    pub correlation: Vec<f64>,
}

pub fn run(payload: CorrelationPayload) -> Result<CorrelationReport, OperationError> {
    require_signal(&payload.a, "a")?;
    require_signal(&payload.b, "b")?;

    let n = payload.a.len().min(payload.b.len());
    if n < 2 {
        return Err(OperationError::InvalidPayload(
            "correlation needs at least two samples per channel".to_string(),
        ));
    }
    let a = &payload.a[..n];
    let b = &payload.b[..n];
    let max_lag = payload.max_lag.unwrap_or(n / 4).min(n - 1);

    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;
    let da: Vec<f64> = a.iter().map(|v| v - mean_a).collect();
    let db: Vec<f64> = b.iter().map(|v| v - mean_b).collect();
    let energy = (da.iter().map(|v| v * v).sum::<f64>() * db.iter().map(|v| v * v).sum::<f64>()).sqrt();

    let at_lag = |lag: i64| -> f64 {
        if energy == 0.0 {
            return 0.0;
        }
        let shift = lag.unsigned_abs() as usize;
        let sum: f64 = if lag >= 0 {
            da[..n - shift].iter().zip(&db[shift..]).map(|(x, y)| x * y).sum()
        } else {
            da[shift..].iter().zip(&db[..n - shift]).map(|(x, y)| x * y).sum()
        };
        sum / energy
    };

    let lags = -(max_lag as i64)..=(max_lag as i64);
    let correlation: Vec<f64> = lags.clone().map(at_lag).collect();
    let (best_lag, best_correlation) = lags
        .zip(correlation.iter().copied())
        .max_by(|(_, x), (_, y)| x.abs().total_cmp(&y.abs()))
        .unwrap_or((0, 0.0));

    Ok(CorrelationReport {
        coefficient: at_lag(0),
        best_lag,
        best_correlation,
        max_lag,
        correlation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5
            })
            .collect()
    }

    #[test]
    fn test_identical_channels() {
        let a = noise(256, 7);
        let report = run(CorrelationPayload { a: a.clone(), b: a, max_lag: Some(10) }).unwrap();
        assert!((report.coefficient - 1.0).abs() < 1e-12);
        assert_eq!(report.best_lag, 0);
        assert_eq!(report.correlation.len(), 21);
    }

    #[test]
    fn test_delayed_channel() {
        let a = noise(512, 42);
        let mut b = vec![0.0; 3];
        b.extend_from_slice(&a[..509]);

        let report = run(CorrelationPayload { a, b, max_lag: Some(20) }).unwrap();
        assert_eq!(report.best_lag, 3);
        assert!(report.best_correlation > 0.9);
    }

    #[test]
    fn test_inverted_channel() {
        let a = noise(128, 3);
        let b: Vec<f64> = a.iter().map(|v| -v).collect();
        let report = run(CorrelationPayload { a, b, max_lag: None }).unwrap();
        assert!((report.coefficient + 1.0).abs() < 1e-12);
        assert_eq!(report.max_lag, 32);
    }

    #[test]
    fn test_too_short() {
        let err = run(CorrelationPayload { a: vec![1.0], b: vec![1.0], max_lag: None }).unwrap_err();
        assert!(matches!(err, OperationError::InvalidPayload(_)));
    }
}
