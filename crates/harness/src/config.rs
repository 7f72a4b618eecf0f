//! Suite configuration

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actors::{actors_from_value, Actor};
use crate::error::{HarnessError, HarnessResult};
use crate::transaction::Expectations;
use crate::transport::DEFAULT_REQUEST_TIMEOUT;

pub const ACCOUNTS_KEY: &str = "accounts";
pub const VALID_ACCOUNTS_KEY: &str = "valid_accounts";

/// Suite configuration parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Environment name used to pick a base URL
    #[serde(default = "default_env")]
    pub env: String,

    /// Base URL per environment
    #[serde(default)]
    pub base_url: HashMap<String, String>,

    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for a whole run (None = no limit)
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,

    /// Top-level `message` of a successful login reply
    #[serde(default)]
    pub success_message: Option<String>,

    /// Account lists by name (`accounts`, `valid_accounts`, ...)
    #[serde(flatten)]
    pub account_lists: HashMap<String, serde_yaml::Value>,

    #[serde(skip)]
    base_url_override: Option<String>,
}

fn default_env() -> String {
    "dev".to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

impl SuiteConfig {
    /// Parse a suite config from YAML string
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| HarnessError::Configuration(format!("malformed suite config: {}", e)))
    }

    /// Parse a suite config from a YAML file
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&content)?;
        debug!("Loaded suite config from {}", path.display());
        Ok(config)
    }

    /// Override the environment name and/or the resolved base URL
    pub fn with_overrides(mut self, env: Option<&str>, base_url: Option<&str>) -> Self {
        if let Some(env) = env.filter(|e| !e.is_empty()) {
            self.env = env.to_string();
        }
        if let Some(url) = base_url.filter(|u| !u.is_empty()) {
            self.base_url_override = Some(url.to_string());
        }
        self
    }

    /// Base URL of the configured environment
    pub fn base_url(&self) -> HarnessResult<&str> {
        if let Some(url) = &self.base_url_override {
            return Ok(url);
        }
        self.base_url
            .get(&self.env)
            .map(String::as_str)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                HarnessError::Configuration(format!("Base URL not found for env: {}", self.env))
            })
    }

    /// Accounts listed under `key`; empty when the key is absent
    pub fn actors(&self, key: &str) -> HarnessResult<Vec<Actor>> {
        match self.account_lists.get(key) {
            None => Ok(Vec::new()),
            Some(value) => actors_from_value(value, key),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }

    pub fn expectations(&self) -> Expectations {
        let mut expect = Expectations::default();
        if let Some(message) = &self.success_message {
            expect.success_message = message.clone();
        }
        expect
    }
}
