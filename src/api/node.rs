use axum::{extract::State, Json};
use serde_json::json;
use std::sync::Arc;

use crate::response::{Envelope, ToolResponse};
use crate::upstream::ApiError;
use crate::AppState;

/// GET /api/v1/node/wallet - Node wallet addresses with their balances
/// (requires the node API key)
#[utoipa::path(
    get,
    path = "/node/wallet",
    tag = "node",
    responses(
        (status = 200, description = "Wallet addresses with balances", body = ToolResponse)
    )
)]
pub async fn get_node_wallet(State(state): State<Arc<AppState>>) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    if !state.node.has_api_key() {
        return Json(envelope.error(ApiError::Unsupported(
            "node wallet requires ERGO_NODE_API_KEY".to_string(),
        )));
    }

    let addresses = match state.node.wallet_addresses().await {
        Ok(addresses) => addresses,
        Err(e) => return Json(envelope.error(e)),
    };

    let balances = futures::future::join_all(addresses.iter().map(|address| {
        let node = state.node.clone();
        async move {
            match node.address_balance(address).await {
                Ok(balance) => Some(json!({
                    "address": address,
                    "confirmed": balance.confirmed.with_formatted(),
                    "unconfirmed": balance.unconfirmed.with_formatted(),
                })),
                Err(e) => {
                    tracing::warn!(address = %address, error = %e, "skipping wallet address");
                    None
                }
            }
        }
    }))
    .await;

    let entries: Vec<_> = balances.into_iter().flatten().collect();
    Json(envelope.success(json!(entries)))
}

/// GET /api/v1/node/indexedHeight - Progress of the node's extra index
pub async fn get_indexed_height(State(state): State<Arc<AppState>>) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    let result = state.node.indexed_height().await;
    Json(envelope.result(result))
}
