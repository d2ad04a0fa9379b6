use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::response::{Category, Envelope, ToolResponse};
use crate::upstream::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BlockPageQuery {
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
}

/// GET /api/v1/blocks - Latest blocks
#[utoipa::path(
    get,
    path = "/blocks",
    tag = "blocks",
    params(
        ("offset" = Option<usize>, Query, description = "Pagination offset"),
        ("limit" = Option<usize>, Query, description = "Blocks per page")
    ),
    responses(
        (status = 200, description = "Latest blocks", body = ToolResponse)
    )
)]
pub async fn get_latest_blocks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BlockPageQuery>,
) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    let limit = params.limit.unwrap_or_else(|| state.limits.get(Category::Blocks));
    let result = state
        .explorer
        .latest_blocks(limit, params.offset)
        .await
        .map(|page| json!({"items": page.items, "total": page.total}));
    Json(envelope.result(result))
}

/// GET /api/v1/blocks/at/:height - Block at a given height
#[utoipa::path(
    get,
    path = "/blocks/at/{height}",
    tag = "blocks",
    params(
        ("height" = i64, Path, description = "Block height")
    ),
    responses(
        (status = 200, description = "Full block at the height", body = ToolResponse)
    )
)]
pub async fn get_block_by_height(
    State(state): State<Arc<AppState>>,
    Path(height): Path<i64>,
) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    if height < 0 {
        return Json(envelope.error(ApiError::InvalidInput(
            "height must be non-negative".to_string(),
        )));
    }
    let result = fetch_block_at(&state, height).await;
    Json(envelope.result(result))
}

async fn fetch_block_at(state: &AppState, height: i64) -> Result<Value, ApiError> {
    let candidates = state.explorer.blocks_at_height(height).await?;
    // The endpoint answers with bare header ids or with block summaries,
    // depending on the upstream flavour.
    let block_id = candidates
        .first()
        .and_then(|entry| match entry {
            Value::String(id) => Some(id.clone()),
            Value::Object(map) => map.get("id").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .ok_or_else(|| ApiError::not_found("block", format!("height {height}")))?;
    state.explorer.block(&block_id).await
}

/// GET /api/v1/blocks/:blockId - Block by id
pub async fn get_block(
    State(state): State<Arc<AppState>>,
    Path(block_id): Path<String>,
) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    let result = state.explorer.block(&block_id).await;
    Json(envelope.result(result))
}

/// GET /api/v1/blocks/:blockId/transactions - Transactions of a block
pub async fn get_block_transactions(
    State(state): State<Arc<AppState>>,
    Path(block_id): Path<String>,
    Query(params): Query<BlockPageQuery>,
) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    let limit = params
        .limit
        .unwrap_or_else(|| state.limits.get(Category::Transactions));
    let result = state
        .explorer
        .block_transactions(&block_id, limit, params.offset)
        .await
        .map(|page| json!({"blockId": block_id, "items": page.items, "total": page.total}));
    Json(envelope.result(result))
}
