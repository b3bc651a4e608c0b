//! Context enrichment
//!
//! Providers fill in equipment running parameters (speeds, load) an
//! algorithm may need but the caller did not send. A failing provider never
//! fails the execution.

use async_trait::async_trait;
use sigrun_core::{AlgorithmInput, ExecutionContext};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("Equipment not found: {0}")]
    EquipmentNotFound(String),

    #[error("Context source unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Add context to `input` in place
    async fn enrich(&self, input: &mut AlgorithmInput, context: &ExecutionContext) -> Result<(), EnrichmentError>;
}
