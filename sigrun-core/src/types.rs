//! Core type definitions for Sigrun

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Task priority, 1 is the most urgent and 10 the least
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(1);
    pub const NORMAL: Priority = Priority(5);
    pub const LOWEST: Priority = Priority(10);

    /// Create a priority, rejecting values outside of 1..=10
    pub fn new(value: u8) -> Result<Self, CoreError> {
        Self::try_from(value as i64)
    }

    /// Numeric value (lower = more urgent)
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::NORMAL
    }
}

impl TryFrom<i64> for Priority {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (1..=10).contains(&value) {
            Ok(Priority(value as u8))
        } else {
            Err(CoreError::InvalidPriority(value))
        }
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What caused an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Operator asked for a fresh computation; never served from cache
    Manual,
    #[default]
    Scheduled,
    Realtime,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Manual => "manual",
            TriggerKind::Scheduled => "scheduled",
            TriggerKind::Realtime => "realtime",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TriggerKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(TriggerKind::Manual),
            "scheduled" => Ok(TriggerKind::Scheduled),
            "realtime" | "real_time" => Ok(TriggerKind::Realtime),
            _ => Err(CoreError::InvalidTrigger(s.to_string())),
        }
    }
}

/// Severity attached to a diagnosis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Normal,
    Attention,
    Warning,
    Critical,
}

impl Severity {
    pub fn should_alert(&self) -> bool {
        matches!(self, Severity::Warning | Severity::Critical)
    }
}

/// Broad family an algorithm belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmCategory {
    Spectral,
    Filtering,
    Statistical,
    Correlation,
    Anomaly,
    Model,
    Diagnostic,
}

impl AlgorithmCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmCategory::Spectral => "spectral",
            AlgorithmCategory::Filtering => "filtering",
            AlgorithmCategory::Statistical => "statistical",
            AlgorithmCategory::Correlation => "correlation",
            AlgorithmCategory::Anomaly => "anomaly",
            AlgorithmCategory::Model => "model",
            AlgorithmCategory::Diagnostic => "diagnostic",
        }
    }
}

impl fmt::Display for AlgorithmCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
