//! Actor registry - test accounts loaded from the suite YAML or a CSV file

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

/// Login code the service returns for a successful login
pub const SUCCESS_LOGIN_CODE: i64 = 0;

/// One test identity
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    #[serde(alias = "username", alias = "user_name")]
    pub user_name: String,

    #[serde(skip_serializing)]
    pub password: String,

    /// Body `code` the login call is expected to return
    #[serde(default = "default_login_code", alias = "expected_login_code")]
    pub expected_login_code: i64,

    /// Offset applied to the base order template
    #[serde(default, alias = "order_index")]
    pub order_index: u32,

    /// Expected `data.message` of the login response, checked by login checks only
    #[serde(default, alias = "expected_data_message", skip_serializing_if = "Option::is_none")]
    pub expected_data_message: Option<String>,
}

fn default_login_code() -> i64 {
    SUCCESS_LOGIN_CODE
}

impl Actor {
    pub fn new(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            password: password.into(),
            expected_login_code: SUCCESS_LOGIN_CODE,
            order_index: 0,
            expected_data_message: None,
        }
    }

    pub fn with_order_index(mut self, order_index: u32) -> Self {
        self.order_index = order_index;
        self
    }

    pub fn with_expected_login_code(mut self, code: i64) -> Self {
        self.expected_login_code = code;
        self
    }

    pub fn with_expected_data_message(mut self, message: impl Into<String>) -> Self {
        self.expected_data_message = Some(message.into());
        self
    }

    /// Whether this actor is expected to log in successfully
    pub fn expects_login_success(&self) -> bool {
        self.expected_login_code == SUCCESS_LOGIN_CODE
    }
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("user_name", &self.user_name)
            .field("password", &"***")
            .field("expected_login_code", &self.expected_login_code)
            .field("order_index", &self.order_index)
            .field("expected_data_message", &self.expected_data_message)
            .finish()
    }
}

/// Where to read actors from
#[derive(Debug, Clone)]
pub enum ActorSource {
    /// A list stored under `key` in a suite YAML file
    Yaml { path: PathBuf, key: String },

    /// Same as `Yaml`, from an in-memory document
    YamlStr { content: String, key: String },

    /// A CSV file with a header row naming the actor fields
    Csv { path: PathBuf },
}

/// Load actors in source order.
///
/// A YAML document without `key` yields no actors. Anything unreadable or
/// malformed is a configuration error.
pub fn load_actors(source: &ActorSource) -> HarnessResult<Vec<Actor>> {
    let actors = match source {
        ActorSource::Yaml { path, key } => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                HarnessError::Configuration(format!("cannot read {}: {}", path.display(), e))
            })?;
            actors_from_yaml(&content, key)?
        }
        ActorSource::YamlStr { content, key } => actors_from_yaml(content, key)?,
        ActorSource::Csv { path } => actors_from_csv(path)?,
    };

    debug!("Loaded {} actor(s) from {:?}", actors.len(), source);
    Ok(actors)
}

fn actors_from_yaml(content: &str, key: &str) -> HarnessResult<Vec<Actor>> {
    let doc: serde_yaml::Value = serde_yaml::from_str(content)
        .map_err(|e| HarnessError::Configuration(format!("malformed YAML: {}", e)))?;

    match doc.get(key) {
        None => Ok(Vec::new()),
        Some(value) => actors_from_value(value, key),
    }
}

/// Deserialize the account list stored under `key`
pub(crate) fn actors_from_value(value: &serde_yaml::Value, key: &str) -> HarnessResult<Vec<Actor>> {
    match value {
        serde_yaml::Value::Null => Ok(Vec::new()),
        serde_yaml::Value::Sequence(_) => serde_yaml::from_value(value.clone()).map_err(|e| {
            HarnessError::Configuration(format!("invalid account in '{}': {}", key, e))
        }),
        _ => Err(HarnessError::Configuration(format!(
            "'{}' must be a list of accounts",
            key
        ))),
    }
}

fn actors_from_csv(path: &Path) -> HarnessResult<Vec<Actor>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| {
            HarnessError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;

    let mut actors = Vec::new();
    for (row, record) in reader.deserialize::<Actor>().enumerate() {
        let actor = record.map_err(|e| {
            HarnessError::Configuration(format!(
                "invalid account on row {} of {}: {}",
                row + 1,
                path.display(),
                e
            ))
        })?;
        actors.push(actor);
    }
    Ok(actors)
}
