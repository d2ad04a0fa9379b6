//! Standardised response envelope
//!
//! Every tool operation returns the same `{status, data, message, metadata}`
//! shape. Metadata carries timing, sizing, truncation and token-estimate
//! fields; the minimal verbosity variant omits it.

pub mod estimator;

use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::upstream::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResponseMetadata {
    pub execution_time_ms: f64,
    pub result_count: Option<usize>,
    pub result_size_bytes: usize,
    pub is_truncated: bool,
    pub original_count: Option<usize>,
    pub token_estimate: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_breakdown: Option<estimator::TokenBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage_tier: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ToolResponse {
    pub status: ResponseStatus,
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Minimal,
    Normal,
}

impl Verbosity {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "minimal" => Verbosity::Minimal,
            _ => Verbosity::Normal,
        }
    }
}

fn max_response_size() -> usize {
    std::env::var("MAX_RESPONSE_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1_000_000)
}

fn max_token_estimate() -> usize {
    std::env::var("MAX_TOKEN_ESTIMATE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(4_000)
}

/// Truncate a list to `limit` items, reporting whether anything was dropped.
pub fn smart_limit<T>(mut items: Vec<T>, limit: Option<usize>) -> (Vec<T>, bool) {
    match limit {
        Some(limit) if items.len() > limit => {
            items.truncate(limit);
            (items, true)
        }
        _ => (items, false),
    }
}

/// Per-call envelope builder. Construction records the start time; one of
/// the finishing methods computes metadata and produces the response.
pub struct Envelope {
    started: Instant,
    verbosity: Verbosity,
}

impl Envelope {
    pub fn begin(verbosity: Verbosity) -> Self {
        Self {
            started: Instant::now(),
            verbosity,
        }
    }

    pub fn success(self, data: Value) -> ToolResponse {
        self.finish(Ok(data), false, None)
    }

    /// Success after a smart-limit pass: `original_count` is the
    /// pre-truncation length when known.
    pub fn success_truncated(
        self,
        data: Value,
        is_truncated: bool,
        original_count: Option<usize>,
    ) -> ToolResponse {
        self.finish(Ok(data), is_truncated, original_count)
    }

    /// Success carrying partial results: a multi-page walk stopped early, so
    /// the true total is unknown.
    pub fn success_partial(self, data: Value, partial: bool) -> ToolResponse {
        self.finish(Ok(data), partial, None)
    }

    pub fn error(self, err: ApiError) -> ToolResponse {
        self.finish(Err(err), false, None)
    }

    /// Collapse a `Result` from an engine into the envelope.
    pub fn result(self, result: Result<Value, ApiError>) -> ToolResponse {
        self.finish(result, false, None)
    }

    fn finish(
        self,
        result: Result<Value, ApiError>,
        is_truncated: bool,
        original_count: Option<usize>,
    ) -> ToolResponse {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let execution_time_ms = (elapsed_ms * 100.0).round() / 100.0;

        let (status, data, message) = match result {
            Ok(data) => (ResponseStatus::Success, Some(data), None),
            Err(e) => {
                tracing::warn!(error = %e, "tool operation failed");
                (ResponseStatus::Error, None, Some(e.to_string()))
            }
        };

        // Metadata is always computed, even on errors and in minimal mode.
        let serialized =
            serde_json::to_string(data.as_ref().unwrap_or(&Value::Null)).unwrap_or_default();
        let result_size_bytes = serialized.len();
        let token_estimate = estimator::count_tokens(&serialized, estimator::DEFAULT_MODEL);
        let result_count = data.as_ref().and_then(|d| d.as_array().map(|a| a.len()));

        if result_size_bytes > max_response_size() {
            tracing::warn!(result_size_bytes, "response exceeds MAX_RESPONSE_SIZE");
        }
        if estimator::should_truncate(token_estimate, max_token_estimate(), estimator::DEFAULT_MODEL)
        {
            tracing::warn!(token_estimate, "response exceeds MAX_TOKEN_ESTIMATE");
        }

        // Section counts are estimated on the response as emitted so far;
        // the metadata block itself is excluded from its own breakdown.
        let provisional = ToolResponse {
            status,
            data,
            message,
            metadata: None,
        };
        let (_, sections) =
            estimator::estimate_response_tokens(&provisional, estimator::DEFAULT_MODEL, false);

        let metadata = ResponseMetadata {
            execution_time_ms,
            result_count,
            result_size_bytes,
            is_truncated,
            original_count: if is_truncated { original_count } else { None },
            token_estimate,
            token_breakdown: Some(sections),
            token_usage_tier: Some(estimator::usage_tier(token_estimate).to_string()),
        };

        ToolResponse {
            metadata: match self.verbosity {
                Verbosity::Normal => Some(metadata),
                Verbosity::Minimal => None,
            },
            ..provisional
        }
    }
}

/// Endpoint categories for the default result limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Addresses,
    Blocks,
    Transactions,
    Boxes,
    Tokens,
    TokenHolders,
    Collections,
    SearchResults,
    AddressTransactions,
    AddressTokens,
    Analytics,
    Default,
}

impl Category {
    const ALL: [Category; 12] = [
        Category::Addresses,
        Category::Blocks,
        Category::Transactions,
        Category::Boxes,
        Category::Tokens,
        Category::TokenHolders,
        Category::Collections,
        Category::SearchResults,
        Category::AddressTransactions,
        Category::AddressTokens,
        Category::Analytics,
        Category::Default,
    ];

    fn key(self) -> &'static str {
        match self {
            Category::Addresses => "addresses",
            Category::Blocks => "blocks",
            Category::Transactions => "transactions",
            Category::Boxes => "boxes",
            Category::Tokens => "tokens",
            Category::TokenHolders => "token_holders",
            Category::Collections => "collections",
            Category::SearchResults => "search_results",
            Category::AddressTransactions => "address_transactions",
            Category::AddressTokens => "address_tokens",
            Category::Analytics => "analytics",
            Category::Default => "default",
        }
    }

    fn default_limit(self) -> usize {
        match self {
            Category::Addresses => 50,
            Category::Blocks => 10,
            Category::Transactions => 20,
            Category::Boxes => 50,
            Category::Tokens => 20,
            Category::TokenHolders => 100,
            Category::Collections => 10,
            Category::SearchResults => 15,
            Category::AddressTransactions => 20,
            Category::AddressTokens => 50,
            Category::Analytics => 25,
            Category::Default => 50,
        }
    }
}

/// Result limits per endpoint category, overridable via `LIMIT_<CATEGORY>`
/// environment variables (e.g. `LIMIT_TOKEN_HOLDERS=500`).
#[derive(Debug, Clone)]
pub struct ResponseLimits {
    limits: HashMap<Category, usize>,
}

impl ResponseLimits {
    pub fn from_env() -> Self {
        let mut limits = HashMap::new();
        for category in Category::ALL {
            let env_var = format!("LIMIT_{}", category.key().to_uppercase());
            let limit = std::env::var(&env_var)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| category.default_limit());
            limits.insert(category, limit);
        }
        Self { limits }
    }

    pub fn get(&self, category: Category) -> usize {
        self.limits
            .get(&category)
            .copied()
            .unwrap_or_else(|| Category::Default.default_limit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn smart_limit_truncates_and_flags() {
        let items: Vec<i32> = (0..10).collect();
        let (limited, truncated) = smart_limit(items.clone(), Some(4));
        assert_eq!(limited, vec![0, 1, 2, 3]);
        assert!(truncated);

        let (unchanged, truncated) = smart_limit(items.clone(), Some(10));
        assert_eq!(unchanged.len(), 10);
        assert!(!truncated);

        let (unlimited, truncated) = smart_limit(items, None);
        assert_eq!(unlimited.len(), 10);
        assert!(!truncated);
    }

    #[test]
    fn smart_limit_is_idempotent() {
        let items: Vec<i32> = (0..10).collect();
        let (once, _) = smart_limit(items, Some(4));
        let (twice, truncated_again) = smart_limit(once.clone(), Some(4));
        assert_eq!(once, twice);
        assert!(!truncated_again);
    }

    #[test]
    fn success_metadata_reflects_serialized_size() {
        let data = json!([{"a": 1}, {"a": 2}]);
        let expected_size = serde_json::to_string(&data).unwrap().len();

        let response = Envelope::begin(Verbosity::Normal).success(data);
        let metadata = response.metadata.unwrap();
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(metadata.result_size_bytes, expected_size);
        assert_eq!(metadata.result_count, Some(2));
        assert!(metadata.execution_time_ms >= 0.0);
        assert!(!metadata.is_truncated);
        assert_eq!(metadata.original_count, None);
        assert_eq!(metadata.token_usage_tier.as_deref(), Some("minimal"));
    }

    #[test]
    fn error_response_has_message_and_metadata() {
        let response =
            Envelope::begin(Verbosity::Normal).error(ApiError::HttpStatus(404));
        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.data.is_none());
        assert_eq!(response.message.as_deref(), Some("HTTP error: 404"));
        let metadata = response.metadata.unwrap();
        // json(null) is 4 bytes
        assert_eq!(metadata.result_size_bytes, 4);
    }

    #[test]
    fn minimal_verbosity_omits_metadata() {
        let response = Envelope::begin(Verbosity::Minimal).success(json!({"x": 1}));
        assert!(response.metadata.is_none());
        let wire = serde_json::to_value(&response).unwrap();
        assert!(wire.get("metadata").is_none());
        assert_eq!(wire["status"], "success");
    }

    #[test]
    fn truncated_success_records_original_count() {
        let items: Vec<Value> = (0..10).map(|i| json!(i)).collect();
        let original = items.len();
        let (limited, truncated) = smart_limit(items, Some(3));
        let response = Envelope::begin(Verbosity::Normal).success_truncated(
            Value::Array(limited),
            truncated,
            Some(original),
        );
        let metadata = response.metadata.unwrap();
        assert!(metadata.is_truncated);
        assert_eq!(metadata.original_count, Some(10));
        assert_eq!(metadata.result_count, Some(3));
    }

    #[test]
    fn limits_fall_back_to_defaults() {
        let limits = ResponseLimits::from_env();
        assert_eq!(limits.get(Category::Blocks), 10);
        assert_eq!(limits.get(Category::TokenHolders), 100);
        assert_eq!(limits.get(Category::Default), 50);
    }
}
