//! Validation outcome shared by executors

use serde::{Deserialize, Serialize};

/// Result of validating an input/config pair before compute
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self { valid: false, errors }
    }

    /// Record one more problem; the outcome becomes invalid
    pub fn push(&mut self, error: impl Into<String>) {
        self.valid = false;
        self.errors.push(error.into());
    }

    /// Fail with `error` unless `condition` holds
    pub fn require(&mut self, condition: bool, error: impl Into<String>) {
        if !condition {
            self.push(error);
        }
    }

    pub fn merge(mut self, other: ValidationOutcome) -> Self {
        self.valid &= other.valid;
        self.errors.extend(other.errors);
        self
    }

    /// Reasons joined for the failed envelope
    pub fn message(&self) -> String {
        self.errors.join("; ")
    }
}
