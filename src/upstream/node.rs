//! Typed client for the Ergo node REST API
//!
//! Requires a node running with `extraIndex = true` for the
//! `blockchain/*` index endpoints.

use serde_json::{json, Value};

use super::{decode, page_items, ApiError, Gateway, RequestSpec};
use crate::models::{AddressBalance, BoxRecord, MempoolTransaction, NodeInfo, TokenInfo};

pub const DEFAULT_NODE_API: &str = "http://localhost:9053";

#[derive(Clone)]
pub struct NodeClient {
    gateway: Gateway,
}

impl NodeClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            gateway: Gateway::new(base_url, api_key),
        }
    }

    /// Whether an API key is configured; wallet endpoints need one.
    pub fn has_api_key(&self) -> bool {
        self.gateway.has_api_key()
    }

    /// GET /info
    pub async fn info(&self) -> Result<NodeInfo, ApiError> {
        let value = self.gateway.call(RequestSpec::get("info")).await?;
        decode(value)
    }

    /// GET /blockchain/indexedHeight
    pub async fn indexed_height(&self) -> Result<Value, ApiError> {
        self.gateway
            .call(RequestSpec::get("blockchain/indexedHeight"))
            .await
    }

    /// POST /blockchain/balance (body = address string)
    pub async fn address_balance(&self, address: &str) -> Result<AddressBalance, ApiError> {
        let value = self
            .gateway
            .call(RequestSpec::post("blockchain/balance").body(json!(address)))
            .await
            .map_err(|e| e.entity_hint("address", address))?;
        decode(value)
    }

    /// GET /blockchain/token/byId/{id}
    pub async fn token_by_id(&self, token_id: &str) -> Result<TokenInfo, ApiError> {
        let value = self
            .gateway
            .call(RequestSpec::get(format!("blockchain/token/byId/{token_id}")))
            .await
            .map_err(|e| e.entity_hint("token", token_id))?;
        decode(value)
    }

    /// GET /blockchain/box/byTokenId/{id} - one page of boxes (spent or not)
    pub async fn boxes_by_token_id(
        &self,
        token_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<BoxRecord>, ApiError> {
        let value = self
            .gateway
            .call(
                RequestSpec::get(format!("blockchain/box/byTokenId/{token_id}"))
                    .paged(offset, limit),
            )
            .await
            .map_err(|e| e.entity_hint("token", token_id))?;
        Self::decode_box_page(value)
    }

    /// GET /blockchain/box/unspent/byTokenId/{id} - one page of unspent boxes
    pub async fn unspent_boxes_by_token_id(
        &self,
        token_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<BoxRecord>, ApiError> {
        let value = self
            .gateway
            .call(
                RequestSpec::get(format!("blockchain/box/unspent/byTokenId/{token_id}"))
                    .paged(offset, limit),
            )
            .await
            .map_err(|e| e.entity_hint("token", token_id))?;
        Self::decode_box_page(value)
    }

    // The box endpoints answer with a bare array on some node versions and
    // an {items} envelope on others.
    fn decode_box_page(value: Value) -> Result<Vec<BoxRecord>, ApiError> {
        page_items(value)?
            .into_iter()
            .map(decode::<BoxRecord>)
            .collect()
    }

    /// GET /transactions/unconfirmed - one page of mempool transactions
    pub async fn mempool_transactions(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<MempoolTransaction>, ApiError> {
        let value = self
            .gateway
            .call(RequestSpec::get("transactions/unconfirmed").paged(offset, limit))
            .await?;
        page_items(value)?
            .into_iter()
            .map(decode::<MempoolTransaction>)
            .collect()
    }

    /// GET /wallet/addresses (requires the node API key)
    pub async fn wallet_addresses(&self) -> Result<Vec<String>, ApiError> {
        let value = self.gateway.call(RequestSpec::get("wallet/addresses")).await?;
        decode(value)
    }

    /// POST /transactions - passthrough submit of a signed transaction
    pub async fn submit_transaction(&self, tx: &Value) -> Result<Value, ApiError> {
        self.gateway
            .call(RequestSpec::post("transactions").body(tx.clone()))
            .await
    }
}
