//! Core error types for Sigrun

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the shared data model
#[derive(Debug, Error)]
pub enum CoreError {
    /// Priority outside of 1..=10
    #[error("Invalid priority: {0} (expected 1..=10)")]
    InvalidPriority(i64),

    /// Unrecognised trigger name
    #[error("Invalid trigger kind: '{0}'. Supported triggers are: manual, scheduled, realtime")]
    InvalidTrigger(String),

    /// Caller supplied a configuration key the algorithm does not define
    #[error("Unknown configuration key(s): {}", .0.join(", "))]
    UnknownConfigKeys(Vec<String>),

    /// Configuration was not a JSON object
    #[error("Configuration {0} must be a JSON object")]
    ConfigNotObject(&'static str),

    /// Merged configuration did not fit the algorithm's typed config
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
