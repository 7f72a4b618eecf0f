//! Per-account transaction outcomes

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::actors::Actor;

/// Why an account's transaction failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Network-level failure (timeout, refused connection, DNS)
    TransportError,
    /// Wrong HTTP status or wrong login `code`
    UnexpectedStatus,
    /// Response shape or content does not match the contract
    ProtocolMismatch,
    /// Order accepted but no `innerOrderNo` came back
    MissingOrderId,
    /// The transaction task panicked
    InternalError,
    /// The run ended before this transaction finished
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::TransportError => "TransportError",
            FailureKind::UnexpectedStatus => "UnexpectedStatus",
            FailureKind::ProtocolMismatch => "ProtocolMismatch",
            FailureKind::MissingOrderId => "MissingOrderId",
            FailureKind::InternalError => "InternalError",
            FailureKind::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// Structured failure detail, enough to diagnose without re-running
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub kind: FailureKind,

    /// Which call failed ("login" or "order")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            step: None,
            http_status: None,
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    pub fn at(mut self, step: &str) -> Self {
        self.step = Some(step.to_string());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn expected(mut self, expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        self.expected = Some(expected.to_string());
        self.actual = Some(actual.to_string());
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(step) = &self.step {
            write!(f, " at {}", step)?;
        }
        if let Some(status) = self.http_status {
            write!(f, " (HTTP {})", status)?;
        }
        write!(f, ": {}", self.message)?;
        if let (Some(expected), Some(actual)) = (&self.expected, &self.actual) {
            write!(f, " [expected {}, got {}]", expected, actual)?;
        }
        Ok(())
    }
}

/// Result of one account's transaction. Built once, never mutated.
///
/// Serialized camelCase, like [`Actor`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub actor: Actor,
    pub succeeded: bool,

    /// Written masked; see [`mask_secret`]
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_masked")]
    pub login_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,

    pub duration_ms: u64,
}

impl Outcome {
    pub fn success(
        actor: Actor,
        login_key: Option<String>,
        order_id: Option<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            actor,
            succeeded: true,
            login_key,
            order_id,
            failure: None,
            duration_ms,
        }
    }

    pub fn failed(
        actor: Actor,
        failure: Failure,
        login_key: Option<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            actor,
            succeeded: false,
            login_key,
            order_id: None,
            failure: Some(failure),
            duration_ms,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }
}

/// Keep the first four characters of a secret for log and report output
pub fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    if prefix.len() == secret.len() {
        "****".to_string()
    } else {
        format!("{}****", prefix)
    }
}

fn serialize_masked<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(secret) => serializer.serialize_some(&mask_secret(secret)),
        None => serializer.serialize_none(),
    }
}
