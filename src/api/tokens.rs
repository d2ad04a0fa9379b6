use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::analytics::collections;
use crate::analytics::holders::{self, DistributionReport};
use crate::response::{smart_limit, Category, Envelope, ToolResponse};
use crate::upstream::ApiError;
use crate::AppState;

const MIN_QUERY_LEN: usize = 3;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct HoldersQuery {
    #[serde(default)]
    pub include_raw: bool,
    #[serde(default = "default_true")]
    pub include_analysis: bool,
}

fn default_true() -> bool {
    true
}

fn tool_deadline() -> Duration {
    Duration::from_secs(
        std::env::var("TOOL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300),
    )
}

/// Holder walks can span thousands of pages; give the whole invocation a
/// deadline and surface an overrun as a typed cancellation.
async fn with_deadline<T>(
    operation: &str,
    fut: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, ApiError> {
    let deadline = tool_deadline();
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Cancelled(format!(
            "{operation} exceeded {}s deadline",
            deadline.as_secs()
        ))),
    }
}

pub(crate) fn validate_query(query: &str) -> Result<(), ApiError> {
    if query.chars().count() < MIN_QUERY_LEN {
        return Err(ApiError::InvalidInput(format!(
            "query must be at least {MIN_QUERY_LEN} characters"
        )));
    }
    Ok(())
}

/// GET /api/v1/tokens/:tokenId - Token metadata
#[utoipa::path(
    get,
    path = "/tokens/{tokenId}",
    tag = "tokens",
    params(
        ("tokenId" = String, Path, description = "Token ID")
    ),
    responses(
        (status = 200, description = "Token details", body = ToolResponse)
    )
)]
pub async fn get_token(
    State(state): State<Arc<AppState>>,
    Path(token_id): Path<String>,
) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    let result = state
        .explorer
        .token(&token_id)
        .await
        .and_then(|token| serde_json::to_value(token).map_err(|e| ApiError::Decode(e.to_string())));
    Json(envelope.result(result))
}

/// GET /api/v1/tokens/search - Search tokens by name or id
#[utoipa::path(
    get,
    path = "/tokens/search",
    tag = "tokens",
    params(
        ("query" = String, Query, description = "Search query, at least 3 characters"),
        ("limit" = Option<usize>, Query, description = "Maximum results")
    ),
    responses(
        (status = 200, description = "Matching tokens", body = ToolResponse)
    )
)]
pub async fn search_token(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    if let Err(e) = validate_query(&params.query) {
        return Json(envelope.error(e));
    }

    let limit = params.limit.unwrap_or_else(|| state.limits.get(Category::Tokens));
    match state.explorer.search_tokens(&params.query).await {
        Ok(page) => {
            let original = page.items.len();
            let (items, truncated) = smart_limit(page.items, Some(limit));
            let data = serde_json::to_value(items).unwrap_or(Value::Null);
            Json(envelope.success_truncated(data, truncated, Some(original)))
        }
        Err(e) => Json(envelope.error(e)),
    }
}

/// GET /api/v1/tokens/:tokenId/holders - Holder distribution for a token
#[utoipa::path(
    get,
    path = "/tokens/{tokenId}/holders",
    tag = "tokens",
    params(
        ("tokenId" = String, Path, description = "Token ID"),
        ("include_raw" = Option<bool>, Query, description = "Include the full holder list"),
        ("include_analysis" = Option<bool>, Query, description = "Include concentration metrics (default true)")
    ),
    responses(
        (status = 200, description = "Holder distribution report", body = ToolResponse)
    )
)]
pub async fn get_token_holders(
    State(state): State<Arc<AppState>>,
    Path(token_id): Path<String>,
    Query(params): Query<HoldersQuery>,
) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    match with_deadline(
        "token holder walk",
        holders::token_distribution(&state.node, &token_id, state.max_holder_boxes),
    )
    .await
    {
        Ok(analysis) => {
            let (data, truncated, original) =
                shape_distribution(analysis.report, &params, &state);
            Json(envelope.success_truncated(data, truncated || analysis.partial, original))
        }
        Err(e) => Json(envelope.error(e)),
    }
}

/// GET /api/v1/collections/:tokenId/holders - Holder distribution across an
/// NFT collection's member tokens
#[utoipa::path(
    get,
    path = "/collections/{tokenId}/holders",
    tag = "collections",
    params(
        ("tokenId" = String, Path, description = "Collection token ID"),
        ("include_raw" = Option<bool>, Query, description = "Include the full holder list"),
        ("include_analysis" = Option<bool>, Query, description = "Include concentration metrics (default true)")
    ),
    responses(
        (status = 200, description = "Collection holder report", body = ToolResponse)
    )
)]
pub async fn get_collection_holders(
    State(state): State<Arc<AppState>>,
    Path(token_id): Path<String>,
    Query(params): Query<HoldersQuery>,
) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    match with_deadline(
        "collection holder walk",
        collections::collection_distribution(&state.node, &token_id),
    )
    .await
    {
        Ok(analysis) => {
            let collection = analysis.report.collection;
            let (mut data, truncated, original) =
                shape_distribution(analysis.report.distribution, &params, &state);
            if let Value::Object(ref mut map) = data {
                map.insert(
                    "collection".to_string(),
                    serde_json::to_value(collection).unwrap_or(Value::Null),
                );
            }
            Json(envelope.success_truncated(data, truncated || analysis.partial, original))
        }
        Err(e) => Json(envelope.error(e)),
    }
}

/// GET /api/v1/collections/search - Search NFT collections by name or id
#[utoipa::path(
    get,
    path = "/collections/search",
    tag = "collections",
    params(
        ("query" = String, Query, description = "Collection name or token id"),
        ("limit" = Option<usize>, Query, description = "Maximum results (default 10)")
    ),
    responses(
        (status = 200, description = "Matching collections", body = ToolResponse)
    )
)]
pub async fn search_collections(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    if let Err(e) = validate_query(&params.query) {
        return Json(envelope.error(e));
    }
    let limit = params.limit.unwrap_or_else(|| state.limits.get(Category::Collections));
    let result = collections::search_collections(&state.explorer, &params.query, limit)
        .await
        .and_then(|matches| {
            serde_json::to_value(matches).map_err(|e| ApiError::Decode(e.to_string()))
        });
    Json(envelope.result(result))
}

/// Apply the include_raw / include_analysis switches and the holder-list
/// limit to a distribution report.
fn shape_distribution(
    mut report: DistributionReport,
    params: &HoldersQuery,
    state: &AppState,
) -> (Value, bool, Option<usize>) {
    if !params.include_analysis {
        report.concentration = None;
    }

    let original = report.holders.len();
    let mut truncated = false;
    if !params.include_raw {
        let limit = state.limits.get(Category::TokenHolders);
        let (limited, was_truncated) = smart_limit(std::mem::take(&mut report.holders), Some(limit));
        report.holders = limited;
        truncated = was_truncated;
    }

    let data = serde_json::to_value(report).unwrap_or(Value::Null);
    (data, truncated, truncated.then_some(original))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_queries_are_rejected() {
        let err = validate_query("ab").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid input: query must be at least 3 characters"
        );
        assert!(validate_query("Test").is_ok());
        assert!(validate_query("abc").is_ok());
    }
}
