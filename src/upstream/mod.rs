//! Upstream HTTP gateway
//!
//! Uniform request execution against the two REST upstreams (public Explorer
//! and local node). One decode layer lives here; engines above operate on
//! typed models and a typed error taxonomy.

pub mod address_book;
pub mod explorer;
pub mod node;
pub mod pagination;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub const USER_AGENT: &str = concat!("ergo-lens/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const ADDRESS_BOOK_TIMEOUT: Duration = Duration::from_secs(60);

/// Error taxonomy shared by the gateway, the engines and the envelope.
///
/// Messages are single-line and name the operation plus the failure kind;
/// they are surfaced verbatim to callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("HTTP error: {0}")]
    HttpStatus(u16),
    #[error("invalid JSON response: {0}")]
    Decode(String),
    #[error("unexpected upstream response: {0}")]
    Upstream(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("operation cancelled: {0}")]
    Cancelled(String),
    #[error("not supported: {0}")]
    Unsupported(String),
}

impl ApiError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ApiError::NotFound { entity, id: id.into() }
    }

    /// Map a 404 from a lookup endpoint to a typed NotFound for `entity`.
    pub fn entity_hint(self, entity: &'static str, id: &str) -> Self {
        match self {
            ApiError::HttpStatus(404) => ApiError::not_found(entity, id),
            other => other,
        }
    }

    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ApiError::Transport(format!("request timeout after {}s", timeout.as_secs()))
        } else if err.is_connect() {
            ApiError::Transport(format!("connection failed: {err}"))
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single upstream request. Built per call, short-lived.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub path: String,
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
}

impl RequestSpec {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::Get,
            query: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(path)
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn paged(self, offset: usize, limit: usize) -> Self {
        self.query("offset", offset).query("limit", limit)
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Shared request plumbing for one upstream base URL.
#[derive(Clone)]
pub struct Gateway {
    base_url: String,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl Gateway {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        if let Some(key) = api_key.as_deref() {
            let prefix: String = key.chars().take(4).collect();
            tracing::info!(upstream = %base_url, key_prefix = %prefix, "API key configured");
        }

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            api_key,
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Execute one request and decode the body as JSON.
    pub async fn call(&self, spec: RequestSpec) -> Result<Value, ApiError> {
        let url = format!("{}/{}", self.base_url, spec.path.trim_start_matches('/'));
        let timeout = spec.timeout.unwrap_or(DEFAULT_TIMEOUT);

        let mut req = match spec.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        req = req.timeout(timeout);
        if !spec.query.is_empty() {
            req = req.query(&spec.query);
        }
        if let Some(ref key) = self.api_key {
            req = req.header("api_key", key.as_str());
        }
        if let Some(ref body) = spec.body {
            req = req.json(body);
        }

        tracing::debug!(
            method = ?spec.method,
            url = %url,
            query = ?spec.query,
            body = ?spec.body,
            "upstream request"
        );

        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, timeout))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::from_reqwest(e, timeout))?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), body = %text, url = %url, "upstream error response");
            return Err(ApiError::HttpStatus(status.as_u16()));
        }

        tracing::info!(url = %url, status = status.as_u16(), bytes = text.len(), "upstream response");

        serde_json::from_str(&text).map_err(|e| {
            tracing::debug!(body = %text, url = %url, "non-JSON upstream body");
            ApiError::Decode(e.to_string())
        })
    }
}

/// Decode a JSON value into a typed model at the gateway boundary.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Normalise a page payload: some endpoints return a bare array, others an
/// `{items: [...]}` envelope.
pub fn page_items(value: Value) -> Result<Vec<Value>, ApiError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(ApiError::Upstream(format!(
                "expected a list under 'items', got {other}"
            ))),
            None => Err(ApiError::Upstream("no 'items' field in page response".into())),
        },
        other => Err(ApiError::Upstream(format!(
            "expected a list or page object, got {other}"
        ))),
    }
}
