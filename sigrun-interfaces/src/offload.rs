//! Offload interface
//!
//! The engine hands CPU-heavy computations to an offloader (normally the
//! worker pool) and falls back to in-process execution when it fails.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sigrun_core::Priority;
use sigrun_ipc::OperationKind;
use std::time::Duration;
use thiserror::Error;

/// Per-submission options; unset fields fall back to the pool defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    pub timeout: Option<Duration>,
    pub priority: Option<Priority>,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Why an offloaded computation did not produce a result
#[derive(Debug, Error)]
pub enum OffloadError {
    /// The offloader cannot accept work (full, shutting down, no workers)
    #[error("Offload rejected: {0}")]
    Rejected(String),

    #[error("Offloaded task timed out after {0:?}")]
    Timeout(Duration),

    /// The remote side ran but failed or died
    #[error("Offloaded task failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait TaskOffloader: Send + Sync {
    /// Run `operation` elsewhere and return its JSON result
    async fn offload(
        &self,
        operation: OperationKind,
        payload: JsonValue,
        options: SubmitOptions,
    ) -> Result<JsonValue, OffloadError>;

    /// Stop accepting work and release resources; idempotent
    async fn shutdown(&self, deadline: Duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_options_builder() {
        let options = SubmitOptions::new()
            .with_timeout(Duration::from_millis(250))
            .with_priority(Priority::HIGHEST);
        assert_eq!(options.timeout, Some(Duration::from_millis(250)));
        assert_eq!(options.priority, Some(Priority::HIGHEST));
        assert_eq!(SubmitOptions::default().timeout, None);
    }
}
