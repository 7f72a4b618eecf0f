//! HTTP transport - independent request/response exchanges over a shared pool
//!
//! A transport never stores session state. Callers pass per-request headers
//! (such as `loginKey`) with every call, so one transport can serve many
//! concurrent accounts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection-level failure. HTTP error statuses are not transport errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request to {path} timed out")]
    Timeout { path: String },

    #[error("cannot connect for {path}: {reason}")]
    Connect { path: String, reason: String },

    #[error("request to {path} failed: {reason}")]
    Request { path: String, reason: String },
}

/// Status and body of one exchange
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,

    /// Parsed body, `None` when the body is not JSON
    pub body: Option<Value>,

    /// Raw body text, kept for diagnostics
    pub raw: String,
}

impl TransportResponse {
    pub fn new(status: u16, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let body = serde_json::from_str(&raw).ok();
        Self { status, body, raw }
    }

    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            raw: body.to_string(),
            body: Some(body),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(
        &self,
        path: &str,
        body: &Value,
        headers: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportError>;

    async fn get(
        &self,
        path: &str,
        headers: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by a pooled `reqwest::Client`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> HarnessResult<Self> {
        if base_url.trim().is_empty() {
            return Err(HarnessError::Configuration("base URL is empty".to_string()));
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join `path` onto the base URL, with or without a leading slash
    pub fn full_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn header_map(path: &str, headers: &[(&str, &str)]) -> Result<HeaderMap, TransportError> {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| TransportError::Request {
                path: path.to_string(),
                reason: format!("invalid header name '{}': {}", name, e),
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| TransportError::Request {
                path: path.to_string(),
                reason: format!("invalid header value for '{}': {}", name.as_str(), e),
            })?;
            map.insert(name, value);
        }
        Ok(map)
    }

    async fn exchange(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<TransportResponse, TransportError> {
        let response = request.send().await.map_err(|e| classify(path, e))?;
        let status = response.status().as_u16();
        let raw = response.text().await.map_err(|e| classify(path, e))?;

        debug!("{} -> {} ({} bytes)", path, status, raw.len());
        Ok(TransportResponse::new(status, raw))
    }
}

fn classify(path: &str, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            path: path.to_string(),
        }
    } else if err.is_connect() {
        TransportError::Connect {
            path: path.to_string(),
            reason: err.to_string(),
        }
    } else {
        TransportError::Request {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        path: &str,
        body: &Value,
        headers: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportError> {
        let headers = Self::header_map(path, headers)?;
        let request = self.client.post(self.full_url(path)).headers(headers).json(body);
        self.exchange(path, request).await
    }

    async fn get(
        &self,
        path: &str,
        headers: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportError> {
        let headers = Self::header_map(path, headers)?;
        let request = self.client.get(self.full_url(path)).headers(headers);
        self.exchange(path, request).await
    }
}
