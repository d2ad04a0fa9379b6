use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::response::{Envelope, ToolResponse};
use crate::upstream::ApiError;
use crate::AppState;

/// GET /api/v1/transactions/:txId - Transaction details
#[utoipa::path(
    get,
    path = "/transactions/{txId}",
    tag = "transactions",
    params(
        ("txId" = String, Path, description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Transaction details; unknown ids yield status=error", body = ToolResponse)
    )
)]
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(tx_id): Path<String>,
) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    let result = state
        .explorer
        .transaction(&tx_id)
        .await
        .and_then(|tx| serde_json::to_value(tx).map_err(|e| ApiError::Decode(e.to_string())));
    Json(envelope.result(result))
}

/// GET /api/v1/boxes/:boxId - Box (UTXO) details
pub async fn get_box(
    State(state): State<Arc<AppState>>,
    Path(box_id): Path<String>,
) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    let result = state.explorer.box_by_id(&box_id).await;
    Json(envelope.result(result))
}

/// POST /api/v1/transactions/submit - Passthrough submit of a signed
/// transaction to the node
pub async fn submit_transaction(
    State(state): State<Arc<AppState>>,
    Json(tx): Json<Value>,
) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    let result = state.node.submit_transaction(&tx).await;
    Json(envelope.result(result))
}
