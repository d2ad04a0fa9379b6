//! Typed client for the public Explorer REST API

use serde_json::Value;

use super::{decode, ApiError, Gateway, RequestSpec};
use crate::models::{
    Balance, ExplorerInfo, NetworkState, PaginatedItems, TokenInfo, TransactionInfo,
};

pub const DEFAULT_EXPLORER_API: &str = "https://api.ergoplatform.com/api/v1";

#[derive(Clone)]
pub struct ExplorerClient {
    gateway: Gateway,
}

impl ExplorerClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            // The Explorer is public; no API key is ever attached.
            gateway: Gateway::new(base_url, None),
        }
    }

    /// GET addresses/{address}/balance/confirmed
    pub async fn confirmed_balance(&self, address: &str) -> Result<Balance, ApiError> {
        let value = self
            .gateway
            .call(RequestSpec::get(format!("addresses/{address}/balance/confirmed")))
            .await
            .map_err(|e| e.entity_hint("address", address))?;
        decode(value)
    }

    /// GET addresses/{address}/transactions
    pub async fn address_transactions(
        &self,
        address: &str,
        limit: usize,
        offset: usize,
    ) -> Result<PaginatedItems<TransactionInfo>, ApiError> {
        let value = self
            .gateway
            .call(
                RequestSpec::get(format!("addresses/{address}/transactions"))
                    .paged(offset, limit),
            )
            .await?;
        if !value.is_object() {
            return Err(ApiError::Upstream(format!(
                "expected a page object for address transactions, got {value}"
            )));
        }
        decode::<PaginatedItems<TransactionInfo>>(value).map(PaginatedItems::normalized)
    }

    /// GET transactions/{id}
    pub async fn transaction(&self, tx_id: &str) -> Result<TransactionInfo, ApiError> {
        let value = self
            .gateway
            .call(RequestSpec::get(format!("transactions/{tx_id}")))
            .await
            .map_err(|e| e.entity_hint("transaction", tx_id))?;
        decode(value)
    }

    /// GET blocks/{id}
    pub async fn block(&self, block_id: &str) -> Result<Value, ApiError> {
        self.gateway
            .call(RequestSpec::get(format!("blocks/{block_id}")))
            .await
            .map_err(|e| e.entity_hint("block", block_id))
    }

    /// GET blocks/at/{height} - ids (or summaries) of the blocks at a height
    pub async fn blocks_at_height(&self, height: i64) -> Result<Vec<Value>, ApiError> {
        let value = self
            .gateway
            .call(RequestSpec::get(format!("blocks/at/{height}")))
            .await?;
        super::page_items(value)
    }

    /// GET blocks
    pub async fn latest_blocks(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<PaginatedItems<Value>, ApiError> {
        let value = self
            .gateway
            .call(RequestSpec::get("blocks").paged(offset, limit))
            .await?;
        decode::<PaginatedItems<Value>>(value).map(PaginatedItems::normalized)
    }

    /// GET blocks/{id}/transactions
    pub async fn block_transactions(
        &self,
        block_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<PaginatedItems<TransactionInfo>, ApiError> {
        let value = self
            .gateway
            .call(
                RequestSpec::get(format!("blocks/{block_id}/transactions"))
                    .paged(offset, limit),
            )
            .await
            .map_err(|e| e.entity_hint("block", block_id))?;
        decode::<PaginatedItems<TransactionInfo>>(value).map(PaginatedItems::normalized)
    }

    /// GET networkState
    pub async fn network_state(&self) -> Result<NetworkState, ApiError> {
        let value = self.gateway.call(RequestSpec::get("networkState")).await?;
        decode(value)
    }

    /// GET info
    pub async fn info(&self) -> Result<ExplorerInfo, ApiError> {
        let value = self.gateway.call(RequestSpec::get("info")).await?;
        decode(value)
    }

    /// GET boxes/{id}
    pub async fn box_by_id(&self, box_id: &str) -> Result<Value, ApiError> {
        self.gateway
            .call(RequestSpec::get(format!("boxes/{box_id}")))
            .await
            .map_err(|e| e.entity_hint("box", box_id))
    }

    /// GET tokens/{id}
    pub async fn token(&self, token_id: &str) -> Result<TokenInfo, ApiError> {
        let value = self
            .gateway
            .call(RequestSpec::get(format!("tokens/{token_id}")))
            .await
            .map_err(|e| e.entity_hint("token", token_id))?;
        decode(value)
    }

    /// GET tokens/search?query=
    pub async fn search_tokens(&self, query: &str) -> Result<PaginatedItems<TokenInfo>, ApiError> {
        let value = self
            .gateway
            .call(RequestSpec::get("tokens/search").query("query", query))
            .await?;
        if !value.is_object() {
            return Err(ApiError::Upstream(format!(
                "expected a page object for token search, got {value}"
            )));
        }
        decode::<PaginatedItems<TokenInfo>>(value).map(PaginatedItems::normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn confirmed_balance_decodes_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/addresses/9fRA/balance/confirmed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nanoErgs": 1_000_000_000i64,
                "tokens": [{"tokenId": "T", "amount": 10, "decimals": 0, "name": "X"}]
            })))
            .mount(&server)
            .await;

        let client = ExplorerClient::new(&server.uri());
        let balance = client.confirmed_balance("9fRA").await.unwrap();
        assert_eq!(balance.nano_ergs, 1_000_000_000);
        assert_eq!(balance.tokens.len(), 1);
        assert_eq!(balance.tokens[0].amount, 10);
    }

    #[tokio::test]
    async fn address_transactions_fills_missing_total() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/addresses/9fRA/transactions"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "tx1"}, {"id": "tx2"}]
            })))
            .mount(&server)
            .await;

        let client = ExplorerClient::new(&server.uri());
        let page = client.address_transactions("9fRA", 5, 0).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn address_transactions_rejects_non_object_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/addresses/9fRA/transactions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2, 3])))
            .mount(&server)
            .await;

        let client = ExplorerClient::new(&server.uri());
        let err = client.address_transactions("9fRA", 5, 0).await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
    }

    #[tokio::test]
    async fn missing_token_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokens/deadbeef"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = ExplorerClient::new(&server.uri());
        let err = client.token("deadbeef").await.unwrap_err();
        assert_eq!(err.to_string(), "token not found: deadbeef");
    }
}
