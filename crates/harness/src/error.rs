//! Error types for the harness
//!
//! Only fatal conditions are errors. Per-account failures are recorded as
//! [`FailureKind`](crate::outcome::FailureKind) values on an outcome.

use thiserror::Error;

use crate::outcome::Outcome;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Returned by [`Orchestrator::run_all_checked`](crate::Orchestrator::run_all_checked)
/// when at least one account failed. Carries every outcome, not just the failures.
#[derive(Error, Debug)]
#[error("{failed} of {} account transaction(s) failed", .outcomes.len())]
pub struct AggregateError {
    pub failed: usize,
    pub outcomes: Vec<Outcome>,
}

impl AggregateError {
    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| !o.succeeded)
    }
}
