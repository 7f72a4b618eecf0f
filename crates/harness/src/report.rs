//! Run summaries and the JSON result file

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::HarnessResult;
use crate::orchestrator::RunMode;
use crate::outcome::{FailureKind, Outcome};

pub const RESULTS_FILE: &str = "orderprobe-results.json";

/// Result of one run over all actors
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub mode: String,
    pub env: String,
    pub base_url: String,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub failures_by_kind: BTreeMap<FailureKind, usize>,
    pub duration_ms: u64,
    pub outcomes: Vec<Outcome>,
}

impl RunReport {
    pub fn new(
        mode: RunMode,
        env: &str,
        base_url: &str,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        outcomes: Vec<Outcome>,
    ) -> Self {
        let passed = outcomes.iter().filter(|o| o.succeeded).count();
        let mut failures_by_kind = BTreeMap::new();
        for kind in outcomes.iter().filter_map(Outcome::failure_kind) {
            *failures_by_kind.entry(kind).or_insert(0) += 1;
        }

        Self {
            mode: match mode {
                RunMode::Order => "order".to_string(),
                RunMode::LoginOnly => "login".to_string(),
            },
            env: env.to_string(),
            base_url: base_url.to_string(),
            started_at,
            total: outcomes.len(),
            passed,
            failed: outcomes.len() - passed,
            failures_by_kind,
            duration_ms,
            outcomes,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Write the report as pretty JSON into `output_dir`
    pub fn write(&self, output_dir: &Path) -> HarnessResult<PathBuf> {
        std::fs::create_dir_all(output_dir)?;

        let path = output_dir.join(RESULTS_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
