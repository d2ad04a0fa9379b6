//! Token holder aggregation and distribution analytics
//!
//! Walks all unspent boxes carrying a token, accumulates per-address
//! holdings and derives concentration metrics.

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{BoxRecord, TokenInfo};
use crate::upstream::node::NodeClient;
use crate::upstream::pagination::{self, DEFAULT_PAGE_SIZE};
use crate::upstream::ApiError;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenHolder {
    pub address: String,
    pub amount: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Concentration {
    pub gini: f64,
    pub top10_percent: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DistributionReport {
    pub token_id: String,
    pub token_name: String,
    pub decimals: i32,
    pub total_supply: i64,
    pub total_holders: usize,
    pub holders: Vec<TokenHolder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concentration: Option<Concentration>,
}

/// A distribution report plus whether the underlying box walk completed.
#[derive(Debug)]
pub struct HolderAnalysis {
    pub report: DistributionReport,
    /// True when a mid-walk upstream error truncated the box set; the
    /// report then covers a prefix of the real holder population.
    pub partial: bool,
}

/// Compute the holder distribution for a token.
///
/// Fails with NotFound when the token metadata lookup fails; a mid-walk
/// page error instead yields a partial report.
pub async fn token_distribution(
    node: &NodeClient,
    token_id: &str,
    max_boxes: Option<usize>,
) -> Result<HolderAnalysis, ApiError> {
    let token = node.token_by_id(token_id).await?;

    let client = node.clone();
    let id = token_id.to_string();
    let scan = pagination::walk(
        move |offset, limit| {
            let client = client.clone();
            let id = id.clone();
            async move { client.unspent_boxes_by_token_id(&id, offset, limit).await }
        },
        DEFAULT_PAGE_SIZE,
        max_boxes,
    )
    .await;

    tracing::info!(
        token_id,
        boxes = scan.items.len(),
        partial = scan.is_partial(),
        "scanned unspent boxes"
    );

    let holdings = accumulate(&scan.items, token_id);
    let report = build_report(&token, holdings);
    Ok(HolderAnalysis {
        report,
        partial: scan.is_partial(),
    })
}

/// Sum the token amount per address across a box set. Boxes without an
/// address are skipped; absent or malformed amounts decode as zero.
fn accumulate(boxes: &[BoxRecord], token_id: &str) -> BTreeMap<String, i64> {
    let mut holdings: BTreeMap<String, i64> = BTreeMap::new();
    for b in boxes {
        let Some(address) = b.address.as_deref() else {
            continue;
        };
        for asset in &b.assets {
            if asset.token_id == token_id {
                *holdings.entry(address.to_string()).or_insert(0) += asset.amount;
            }
        }
    }
    holdings
}

pub(crate) fn build_report(token: &TokenInfo, holdings: BTreeMap<String, i64>) -> DistributionReport {
    let total_supply: i64 = holdings.values().sum();
    let total_holders = holdings.len();

    let mut holders: Vec<TokenHolder> = holdings
        .into_iter()
        .map(|(address, amount)| TokenHolder {
            address,
            amount,
            percentage: 0.0,
        })
        .collect();
    // Descending by amount, address as the stable tiebreak
    holders.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.address.cmp(&b.address)));

    for holder in &mut holders {
        holder.percentage = if total_supply > 0 {
            round6(holder.amount as f64 / total_supply as f64 * 100.0)
        } else {
            0.0
        };
    }

    let mut ascending: Vec<i64> = holders.iter().map(|h| h.amount).collect();
    ascending.sort_unstable();

    let concentration = Concentration {
        gini: gini(&ascending),
        top10_percent: top_decile_share(&holders, total_supply),
    };

    DistributionReport {
        token_id: token.id.clone(),
        token_name: token.name.clone().unwrap_or_else(|| "Unknown Token".to_string()),
        decimals: token.decimals.unwrap_or(0),
        total_supply,
        total_holders,
        holders,
        concentration: Some(concentration),
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Gini coefficient of a non-negative distribution, sample-corrected so that
/// a uniform distribution scores exactly 0 and total concentration in one
/// holder scores exactly 1. Input must be sorted ascending.
pub(crate) fn gini(ascending: &[i64]) -> f64 {
    let n = ascending.len();
    let total: i64 = ascending.iter().sum();
    if n < 2 || total <= 0 {
        return 0.0;
    }

    let weighted: f64 = ascending
        .iter()
        .enumerate()
        .map(|(i, &x)| i as f64 * x as f64)
        .sum();
    let n_f = n as f64;
    let total_f = total as f64;

    let g = (2.0 * weighted - (n_f - 1.0) * total_f) / ((n_f - 1.0) * total_f);
    g.clamp(0.0, 1.0)
}

/// Share of supply held by the top ⌈n/10⌉ holders. `holders` must be
/// sorted descending.
fn top_decile_share(holders: &[TokenHolder], total_supply: i64) -> f64 {
    if holders.is_empty() || total_supply <= 0 {
        return 0.0;
    }
    let top_n = holders.len().div_ceil(10);
    let top_sum: i64 = holders.iter().take(top_n).map(|h| h.amount).sum();
    top_sum as f64 / total_supply as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn boxed(address: &str, token_id: &str, amount: i64) -> BoxRecord {
        serde_json::from_value(json!({
            "boxId": format!("box-{address}-{amount}"),
            "address": address,
            "value": 1_000_000,
            "assets": [{"tokenId": token_id, "amount": amount}]
        }))
        .unwrap()
    }

    fn token(id: &str, name: &str) -> TokenInfo {
        serde_json::from_value(json!({"id": id, "name": name, "decimals": 0}))
            .unwrap()
    }

    #[test]
    fn accumulate_sums_per_address_and_skips_addressless_boxes() {
        let mut no_address = boxed("X", "T", 7);
        no_address.address = None;
        let boxes = vec![
            boxed("A", "T", 100),
            boxed("A", "T", 50),
            boxed("B", "T", 25),
            boxed("B", "other", 999),
            no_address,
        ];
        let holdings = accumulate(&boxes, "T");
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings["A"], 150);
        assert_eq!(holdings["B"], 25);
    }

    #[test]
    fn two_holder_report_matches_expected_distribution() {
        let mut holdings = BTreeMap::new();
        holdings.insert("A".to_string(), 600);
        holdings.insert("B".to_string(), 400);
        let report = build_report(&token("T", "Test"), holdings);

        assert_eq!(report.total_supply, 1000);
        assert_eq!(report.total_holders, 2);
        assert_eq!(report.holders[0].address, "A");
        assert!((report.holders[0].percentage - 60.0).abs() < 1e-9);
        assert_eq!(report.holders[1].address, "B");
        assert!((report.holders[1].percentage - 40.0).abs() < 1e-9);

        let concentration = report.concentration.unwrap();
        assert!((concentration.gini - 0.2).abs() < 1e-9);
        assert!((concentration.top10_percent - 0.6).abs() < 1e-9);
    }

    #[test]
    fn percentages_sum_to_one_hundred() {
        let mut holdings = BTreeMap::new();
        for (i, amount) in [1i64, 2, 3, 5, 8, 13, 21, 34, 55, 89].iter().enumerate() {
            holdings.insert(format!("addr{i}"), *amount);
        }
        let report = build_report(&token("T", "Fib"), holdings);
        let sum: f64 = report.holders.iter().map(|h| h.percentage).sum();
        assert!((sum - 100.0).abs() < 1e-4);
        // non-increasing order
        for pair in report.holders.windows(2) {
            assert!(pair[0].amount >= pair[1].amount);
        }
    }

    #[test]
    fn gini_bounds_and_equality() {
        assert_eq!(gini(&[]), 0.0);
        assert_eq!(gini(&[42]), 0.0);
        assert_eq!(gini(&[5, 5, 5, 5]), 0.0);
        // one holder owns everything
        assert!((gini(&[0, 0, 0, 100]) - 1.0).abs() < 1e-9);
        let mixed = gini(&[1, 2, 3, 4, 5]);
        assert!(mixed > 0.0 && mixed < 1.0);
    }

    #[test]
    fn gini_increases_under_regressive_transfer() {
        // moving mass from a poorer to a richer holder raises G
        let before = gini(&[200, 300, 500]);
        let after = gini(&[100, 300, 600]);
        assert!(after > before);
    }

    #[test]
    fn zero_supply_yields_zero_percentages() {
        let mut holdings = BTreeMap::new();
        holdings.insert("A".to_string(), 0);
        holdings.insert("B".to_string(), 0);
        let report = build_report(&token("T", "Empty"), holdings);
        assert_eq!(report.total_supply, 0);
        assert!(report.holders.iter().all(|h| h.percentage == 0.0));
        assert_eq!(report.concentration.unwrap().gini, 0.0);
    }

    #[tokio::test]
    async fn distribution_over_fixture_node() {
        let server = MockServer::start().await;
        let token_id = "03faf2cb329f2e90d6d23b58d91bbb6c046aa143261cc21f52fbe2824bfcbf04";
        Mock::given(method("GET"))
            .and(path(format!("/blockchain/token/byId/{token_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": token_id, "name": "Test", "decimals": 0, "emissionAmount": 1000
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/blockchain/box/unspent/byTokenId/{token_id}")))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"boxId": "b1", "address": "A", "value": 1,
                 "assets": [{"tokenId": token_id, "amount": 600}]},
                {"boxId": "b2", "address": "B", "value": 1,
                 "assets": [{"tokenId": token_id, "amount": 400}]}
            ])))
            .mount(&server)
            .await;

        let node = NodeClient::new(&server.uri(), None);
        let analysis = token_distribution(&node, token_id, None).await.unwrap();
        assert!(!analysis.partial);
        assert_eq!(analysis.report.total_supply, 1000);
        assert_eq!(analysis.report.total_holders, 2);
        assert_eq!(analysis.report.holders[0].address, "A");
    }

    #[tokio::test]
    async fn unknown_token_fails_with_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blockchain/token/byId/nope"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let node = NodeClient::new(&server.uri(), None);
        let err = token_distribution(&node, "nope", None).await.unwrap_err();
        assert_eq!(err.to_string(), "token not found: nope");
    }

    #[tokio::test]
    async fn mid_walk_error_yields_partial_report() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blockchain/token/byId/T"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "T", "name": "Test", "decimals": 0
            })))
            .mount(&server)
            .await;
        // first page full, second page errors
        let full_page: Vec<_> = (0..100)
            .map(|i| {
                json!({"boxId": format!("b{i}"), "address": format!("addr{i}"),
                       "value": 1, "assets": [{"tokenId": "T", "amount": 1}]})
            })
            .collect();
        Mock::given(method("GET"))
            .and(path("/blockchain/box/unspent/byTokenId/T"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(full_page)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blockchain/box/unspent/byTokenId/T"))
            .and(query_param("offset", "100"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let node = NodeClient::new(&server.uri(), None);
        let analysis = token_distribution(&node, "T", None).await.unwrap();
        assert!(analysis.partial);
        assert_eq!(analysis.report.total_holders, 100);
    }
}
