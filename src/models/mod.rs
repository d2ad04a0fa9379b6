//! Data models for upstream payloads and tool results
//!
//! Decoding is tolerant by design: upstream schemas drift, so everything
//! that is not structurally required is an `Option` or defaults to empty.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Accept integer, float or string amounts; anything else counts as zero.
fn amount_or_zero<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .unwrap_or(0))
}

/// Confirmed or unconfirmed balance section
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    #[serde(default)]
    pub nano_ergs: i64,
    #[serde(default)]
    pub tokens: Vec<TokenBalance>,
}

impl Balance {
    /// Fill in human-readable token amounts (`amount / 10^decimals`).
    pub fn with_formatted(mut self) -> Self {
        for token in &mut self.tokens {
            token.formatted = Some(token.formatted_amount());
        }
        self
    }
}

/// Token balance entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub token_id: String,
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<f64>,
}

impl TokenBalance {
    pub fn formatted_amount(&self) -> f64 {
        self.amount as f64 / 10f64.powi(self.decimals.unwrap_or(0))
    }
}

/// Confirmed + unconfirmed balance for an address (node `blockchain/balance`)
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressBalance {
    #[serde(default)]
    pub confirmed: Balance,
    #[serde(default)]
    pub unconfirmed: Balance,
}

/// Asset carried by a box
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoxAsset {
    pub token_id: String,
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<i32>,
}

/// Box (UTXO) snapshot as returned by the node's blockchain index
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoxRecord {
    pub box_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub value: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_height: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inclusion_height: Option<i64>,
    #[serde(default)]
    pub assets: Vec<BoxAsset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spent_transaction_id: Option<String>,
}

/// Transaction input or output, reduced to the fields the engines consume
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TxEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub box_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    #[serde(default)]
    pub assets: Vec<BoxAsset>,
}

/// Transaction as returned by the Explorer or the node index
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inclusion_height: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_confirmations: Option<i64>,
    #[serde(default)]
    pub inputs: Vec<TxEntry>,
    #[serde(default)]
    pub outputs: Vec<TxEntry>,
}

impl TransactionInfo {
    /// Distinct counterparty addresses across inputs and outputs,
    /// excluding `own` itself.
    pub fn counterparties(&self, own: &str) -> Vec<String> {
        let mut seen = std::collections::BTreeSet::new();
        for entry in self.inputs.iter().chain(self.outputs.iter()) {
            if let Some(addr) = entry.address.as_deref() {
                if addr != own {
                    seen.insert(addr.to_string());
                }
            }
        }
        seen.into_iter().collect()
    }
}

/// Token metadata (explorer `tokens/{id}` / node `blockchain/token/byId`)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub box_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<i32>,
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub emission_amount: i64,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minting_height: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

/// Unconfirmed transaction from the node mempool
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MempoolTransaction {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<i64>,
    #[serde(default)]
    pub inputs: Vec<TxEntry>,
    #[serde(default)]
    pub outputs: Vec<TxEntry>,
}

/// Node `/info` payload
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
    pub full_height: Option<i64>,
    pub headers_height: Option<i64>,
    pub max_peer_height: Option<i64>,
    pub state_type: Option<String>,
    pub network_type: Option<String>,
    pub is_mining: Option<bool>,
    pub peers_count: Option<i32>,
    pub unconfirmed_count: Option<i32>,
    // Can overflow i64 on mainnet, keep as an arbitrary-precision number
    #[schema(value_type = Option<f64>)]
    pub difficulty: Option<serde_json::Number>,
    pub current_time: Option<i64>,
}

/// Explorer `networkState` payload
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_block_id: Option<String>,
    #[schema(value_type = Option<f64>)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<serde_json::Number>,
    #[schema(value_type = Option<Object>)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub last_blocks: Vec<Value>,
}

impl NetworkState {
    pub fn difficulty_f64(&self) -> f64 {
        self.difficulty.as_ref().and_then(|d| d.as_f64()).unwrap_or(0.0)
    }
}

/// Explorer `info` payload (supply and aggregate statistics)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supply: Option<SupplyInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions_count: Option<i64>,
    #[schema(value_type = Option<Object>)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SupplyInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circulating: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

/// Paginated upstream response (`{items, total}` envelope)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[aliases(PaginatedTransactions = PaginatedItems<TransactionInfo>, PaginatedTokens = PaginatedItems<TokenInfo>)]
pub struct PaginatedItems<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: i64,
}

impl<T> PaginatedItems<T> {
    /// Upstreams occasionally omit `total`; fall back to the page length.
    pub fn normalized(mut self) -> Self {
        if self.total == 0 && !self.items.is_empty() {
            self.total = self.items.len() as i64;
        }
        self
    }
}

/// Address book snapshot (`{items, total, tokens, note?}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressBook {
    #[schema(value_type = Vec<Object>)]
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub total: i64,
    #[schema(value_type = Vec<Object>)]
    #[serde(default)]
    pub tokens: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tolerant_amount_decoding() {
        let asset: BoxAsset =
            serde_json::from_value(json!({"tokenId": "T", "amount": "42"})).unwrap();
        assert_eq!(asset.amount, 42);

        let asset: BoxAsset =
            serde_json::from_value(json!({"tokenId": "T", "amount": {"weird": true}})).unwrap();
        assert_eq!(asset.amount, 0);

        let asset: BoxAsset = serde_json::from_value(json!({"tokenId": "T"})).unwrap();
        assert_eq!(asset.amount, 0);
    }

    #[test]
    fn formatted_amount_uses_decimals() {
        let token = TokenBalance {
            token_id: "T".into(),
            amount: 12345,
            name: None,
            decimals: Some(2),
            formatted: None,
        };
        assert!((token.formatted_amount() - 123.45).abs() < 1e-9);

        let token = TokenBalance {
            token_id: "T".into(),
            amount: 10,
            name: None,
            decimals: None,
            formatted: None,
        };
        assert!((token.formatted_amount() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn counterparties_exclude_self_and_dedupe() {
        let tx: TransactionInfo = serde_json::from_value(json!({
            "id": "tx1",
            "inputs": [{"address": "A"}, {"address": "B"}],
            "outputs": [{"address": "B"}, {"address": "C"}, {"value": 5}]
        }))
        .unwrap();
        assert_eq!(tx.counterparties("A"), vec!["B".to_string(), "C".to_string()]);
    }

    #[test]
    fn paginated_total_falls_back_to_len() {
        let page: PaginatedItems<Value> =
            serde_json::from_value(json!({"items": [1, 2, 3]})).unwrap();
        assert_eq!(page.normalized().total, 3);
    }
}
