//! Decides per request whether a computation runs in-process or on a worker.
//!
//! The decision looks only at the shape of the request, never at pool load.

use std::collections::BTreeSet;

use sigrun_config::EngineSettings;

/// Operations worth offloading once inputs pass [`DEFAULT_OFFLOAD_THRESHOLD`]
pub const CPU_INTENSIVE_OPERATIONS: &[&str] = &[
    "fft",
    "stft",
    "spectrum",
    "cepstrum",
    "wavelet",
    "filter",
    "bandpass",
    "envelope",
    "correlation",
    "cross_correlation",
    "order_tracking",
    "lstm_inference",
    "autoencoder_inference",
];

pub const DEFAULT_OFFLOAD_THRESHOLD: usize = 1024;
pub const DEFAULT_GENERAL_OFFLOAD_THRESHOLD: usize = 8192;

/// `true` when `operation_id` should run on a worker for an input of
/// `approximate_data_length` samples, using the default thresholds
pub fn should_offload(operation_id: &str, approximate_data_length: usize) -> bool {
    RoutingPolicy::default().should_offload(operation_id, approximate_data_length)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingPolicy {
    pub enabled: bool,
    pub offload_threshold: usize,
    pub general_offload_threshold: usize,
    cpu_intensive: BTreeSet<String>,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            offload_threshold: DEFAULT_OFFLOAD_THRESHOLD,
            general_offload_threshold: DEFAULT_GENERAL_OFFLOAD_THRESHOLD,
            cpu_intensive: CPU_INTENSIVE_OPERATIONS.iter().map(|op| op.to_string()).collect(),
        }
    }
}

impl From<&EngineSettings> for RoutingPolicy {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            enabled: settings.offload_enabled,
            offload_threshold: settings.offload_threshold,
            general_offload_threshold: settings.general_offload_threshold,
            ..Self::default()
        }
    }
}

impl RoutingPolicy {
    /// Never offload
    pub fn in_process() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_thresholds(mut self, offload_threshold: usize, general_offload_threshold: usize) -> Self {
        self.offload_threshold = offload_threshold;
        self.general_offload_threshold = general_offload_threshold;
        self
    }

    /// Treat `operation_id` as CPU-intensive
    pub fn with_cpu_intensive(mut self, operation_id: impl Into<String>) -> Self {
        self.cpu_intensive.insert(operation_id.into());
        self
    }

    pub fn is_cpu_intensive(&self, operation_id: &str) -> bool {
        self.cpu_intensive.contains(operation_id)
    }

    /// Input length above which `operation_id` is offloaded
    pub fn threshold_for(&self, operation_id: &str) -> usize {
        if self.is_cpu_intensive(operation_id) {
            self.offload_threshold
        } else {
            self.general_offload_threshold
        }
    }

    pub fn should_offload(&self, operation_id: &str, approximate_data_length: usize) -> bool {
        self.enabled && approximate_data_length > self.threshold_for(operation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        assert!(should_offload("fft", 1025));
        assert!(!should_offload("fft", 1024));
        assert!(should_offload("unknown_op", 8193));
        assert!(!should_offload("unknown_op", 8192));
    }

    #[test]
    fn test_allow_list() {
        for op in CPU_INTENSIVE_OPERATIONS {
            assert!(should_offload(op, 2000), "{op} should offload at 2000 samples");
        }
        assert!(!should_offload("statistics", 2000));
    }

    #[test]
    fn test_disabled_policy_never_offloads() {
        let policy = RoutingPolicy::in_process();
        assert!(!policy.should_offload("fft", 1_000_000));
    }

    #[test]
    fn test_from_settings() {
        let settings = EngineSettings {
            offload_threshold: 10,
            general_offload_threshold: 100,
            ..EngineSettings::default()
        };
        let policy = RoutingPolicy::from(&settings).with_cpu_intensive("statistics");
        assert!(policy.should_offload("statistics", 11));
        assert!(!policy.should_offload("kurtogram", 100));
        assert!(policy.should_offload("kurtogram", 101));
    }
}
