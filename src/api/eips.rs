use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::response::{Envelope, ToolResponse};
use crate::upstream::ApiError;
use crate::AppState;

/// GET /api/v1/eips - All Ergo Improvement Proposals, ascending by number
#[utoipa::path(
    get,
    path = "/eips",
    tag = "eips",
    responses(
        (status = 200, description = "EIP summaries", body = ToolResponse)
    )
)]
pub async fn list_eips(State(state): State<Arc<AppState>>) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    let eips = state.eips.list().await;
    let result = serde_json::to_value(eips).map_err(|e| ApiError::Decode(e.to_string()));
    Json(envelope.result(result))
}

/// GET /api/v1/eips/:number - One EIP with its full document
#[utoipa::path(
    get,
    path = "/eips/{number}",
    tag = "eips",
    params(
        ("number" = u32, Path, description = "EIP number")
    ),
    responses(
        (status = 200, description = "EIP detail, or status=error when unknown", body = ToolResponse)
    )
)]
pub async fn get_eip(
    State(state): State<Arc<AppState>>,
    Path(number): Path<u32>,
) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    let result: Result<Value, ApiError> = match state.eips.get(number).await {
        Some(detail) => {
            serde_json::to_value(detail).map_err(|e| ApiError::Decode(e.to_string()))
        }
        None => Err(ApiError::not_found("EIP", number.to_string())),
    };
    Json(envelope.result(result))
}
