use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::analytics::graph;
use crate::response::{Category, Envelope, ToolResponse};
use crate::upstream::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeQuery {
    #[serde(default = "default_depth")]
    pub depth: u32,
    #[serde(default = "default_tx_limit")]
    pub tx_limit: usize,
}

fn default_depth() -> u32 {
    2
}

fn default_tx_limit() -> usize {
    5
}

/// GET /api/v1/addresses/:address/balance - Confirmed and unconfirmed balance
#[utoipa::path(
    get,
    path = "/addresses/{address}/balance",
    tag = "addresses",
    params(
        ("address" = String, Path, description = "Ergo address")
    ),
    responses(
        (status = 200, description = "Balance with formatted token amounts", body = ToolResponse)
    )
)]
pub async fn get_address_balance(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    let result = state.node.address_balance(&address).await.map(|balance| {
        json!({
            "address": address,
            "confirmed": balance.confirmed.with_formatted(),
            "unconfirmed": balance.unconfirmed.with_formatted(),
        })
    });
    Json(envelope.result(result))
}

/// GET /api/v1/addresses/:address/transactions - Transaction history
#[utoipa::path(
    get,
    path = "/addresses/{address}/transactions",
    tag = "addresses",
    params(
        ("address" = String, Path, description = "Ergo address"),
        ("offset" = Option<usize>, Query, description = "Pagination offset"),
        ("limit" = Option<usize>, Query, description = "Transactions per page")
    ),
    responses(
        (status = 200, description = "Paginated transaction history", body = ToolResponse)
    )
)]
pub async fn get_address_history(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    let ceiling = state.limits.get(Category::AddressTransactions);
    let limit = params.limit.unwrap_or(ceiling);
    if limit < 1 || limit > ceiling {
        return Json(envelope.error(ApiError::InvalidInput(format!(
            "limit must be between 1 and {ceiling}"
        ))));
    }

    let result = state
        .explorer
        .address_transactions(&address, limit, params.offset)
        .await
        .map(|page| {
            json!({
                "address": address,
                "items": page.items,
                "total": page.total,
            })
        });
    Json(envelope.result(result))
}

/// GET /api/v1/addresses/:address/analyze - Bounded graph exploration
/// around an address (forensic view)
#[utoipa::path(
    get,
    path = "/addresses/{address}/analyze",
    tag = "addresses",
    params(
        ("address" = String, Path, description = "Seed address"),
        ("depth" = Option<u32>, Query, description = "Traversal depth, 1-4 (default 2)"),
        ("tx_limit" = Option<usize>, Query, description = "Transactions per address, 1-20 (default 5)")
    ),
    responses(
        (status = 200, description = "Related addresses grouped by distance", body = ToolResponse)
    )
)]
pub async fn analyze_address(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(params): Query<AnalyzeQuery>,
) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    let result = graph::analyze_address(&state.explorer, &address, params.depth, params.tx_limit)
        .await
        .and_then(|report| {
            serde_json::to_value(report).map_err(|e| ApiError::Decode(e.to_string()))
        });
    Json(envelope.result(result))
}

/// GET /api/v1/addresses/book - Known addresses (services, exchanges,
/// mining pools), with a disk fallback when the upstream is unreachable
pub async fn get_address_book(State(state): State<Arc<AppState>>) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    let book = state.address_book.fetch().await;
    let result = serde_json::to_value(book).map_err(|e| ApiError::Decode(e.to_string()));
    Json(envelope.result(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eips::EipManager;
    use crate::response::{ResponseLimits, ResponseStatus};
    use crate::upstream::address_book::AddressBookClient;
    use crate::upstream::explorer::ExplorerClient;
    use crate::upstream::node::NodeClient;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_state(upstream: &str, dir: &std::path::Path) -> Arc<AppState> {
        Arc::new(AppState {
            explorer: ExplorerClient::new(upstream),
            node: NodeClient::new(upstream, None),
            address_book: AddressBookClient::new(upstream, dir),
            eips: Arc::new(EipManager::new(
                crate::eips::DEFAULT_EIP_REPO_URL,
                dir,
                Duration::from_secs(24 * 60 * 60),
            )),
            limits: ResponseLimits::from_env(),
            verbosity: crate::response::Verbosity::Normal,
            max_holder_boxes: None,
        })
    }

    #[tokio::test]
    async fn balance_response_carries_formatted_tokens_and_metadata() {
        let server = MockServer::start().await;
        let address = "9fRAWhdxEsTcdb8PhGNrZfwqa65zfkuYHAMmkQLcic1gdLSV5vA";
        Mock::given(method("POST"))
            .and(path("/blockchain/balance"))
            .and(body_json(json!(address)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "confirmed": {
                    "nanoErgs": 1_000_000_000i64,
                    "tokens": [{"tokenId": "T", "amount": 10, "decimals": 0, "name": "X"}]
                },
                "unconfirmed": {"nanoErgs": 0, "tokens": []}
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&server.uri(), dir.path());
        let Json(response) =
            get_address_balance(State(state), Path(address.to_string())).await;

        assert_eq!(response.status, ResponseStatus::Success);
        let data = response.data.unwrap();
        assert_eq!(data["confirmed"]["nanoErgs"], json!(1_000_000_000i64));
        let tokens = data["confirmed"]["tokens"].as_array().unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0]["formatted"], json!(10.0));

        let metadata = response.metadata.unwrap();
        assert!(metadata.execution_time_ms >= 0.0);
        assert_eq!(
            metadata.result_size_bytes,
            serde_json::to_string(&data).unwrap().len()
        );
    }

    #[tokio::test]
    async fn history_limit_validation() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&server.uri(), dir.path());

        let Json(response) = get_address_history(
            State(state),
            Path("9fRA".to_string()),
            Query(HistoryQuery {
                offset: 0,
                limit: Some(0),
            }),
        )
        .await;
        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.message.unwrap().contains("limit must be between 1 and"));
    }
}
