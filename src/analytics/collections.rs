//! NFT collection resolution and collection-wide holder aggregation
//!
//! An EIP-34 collection is rooted in a collection token; member NFTs are
//! minted in boxes that hold the collection token next to the freshly
//! issued token. Member resolution walks those boxes and gathers the
//! co-resident asset ids.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use super::holders::DistributionReport;
use crate::models::TokenInfo;
use crate::upstream::explorer::ExplorerClient;
use crate::upstream::node::NodeClient;
use crate::upstream::pagination::{self, DEFAULT_PAGE_SIZE};
use crate::upstream::ApiError;

/// Boxes to inspect when resolving collection members. Large collections
/// mint across many boxes; this bounds the scan for politeness.
const MEMBER_SCAN_CEILING: usize = 2_000;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDescriptor {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub token_count: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectionReport {
    pub collection: CollectionDescriptor,
    #[serde(flatten)]
    pub distribution: DistributionReport,
}

#[derive(Debug)]
pub struct CollectionAnalysis {
    pub report: CollectionReport,
    pub partial: bool,
}

/// Resolve the member NFT token ids of a collection.
async fn resolve_members(
    node: &NodeClient,
    collection_id: &str,
) -> Result<(Vec<String>, bool), ApiError> {
    let client = node.clone();
    let id = collection_id.to_string();
    let scan = pagination::walk(
        move |offset, limit| {
            let client = client.clone();
            let id = id.clone();
            async move { client.boxes_by_token_id(&id, offset, limit).await }
        },
        DEFAULT_PAGE_SIZE,
        Some(MEMBER_SCAN_CEILING),
    )
    .await;

    let mut members: Vec<String> = Vec::new();
    let mut seen = std::collections::BTreeSet::new();
    for b in &scan.items {
        for asset in &b.assets {
            if asset.token_id != collection_id && seen.insert(asset.token_id.clone()) {
                members.push(asset.token_id.clone());
            }
        }
    }

    tracing::info!(
        collection_id,
        boxes = scan.items.len(),
        members = members.len(),
        "resolved collection members"
    );
    Ok((members, scan.is_partial()))
}

/// Aggregate holders across every member NFT of a collection.
///
/// Fails with NotFound when the collection token itself is unknown;
/// individual member walks that error mark the result partial instead of
/// aborting the aggregation.
pub async fn collection_distribution(
    node: &NodeClient,
    collection_id: &str,
) -> Result<CollectionAnalysis, ApiError> {
    let collection_token = node.token_by_id(collection_id).await?;
    let (members, mut partial) = resolve_members(node, collection_id).await?;

    let mut holdings: BTreeMap<String, i64> = BTreeMap::new();
    for member_id in &members {
        let client = node.clone();
        let id = member_id.clone();
        let scan = pagination::walk(
            move |offset, limit| {
                let client = client.clone();
                let id = id.clone();
                async move { client.unspent_boxes_by_token_id(&id, offset, limit).await }
            },
            DEFAULT_PAGE_SIZE,
            None,
        )
        .await;
        partial |= scan.is_partial();

        for b in &scan.items {
            let Some(address) = b.address.as_deref() else {
                continue;
            };
            for asset in &b.assets {
                if &asset.token_id == member_id {
                    *holdings.entry(address.to_string()).or_insert(0) += asset.amount;
                }
            }
        }
    }

    let report = CollectionReport {
        collection: CollectionDescriptor {
            id: collection_token.id.clone(),
            name: collection_token
                .name
                .clone()
                .unwrap_or_else(|| "Unknown Collection".to_string()),
            description: collection_token.description.clone(),
            token_count: members.len(),
        },
        distribution: super::holders::build_report(&collection_token, holdings),
    };

    Ok(CollectionAnalysis { report, partial })
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMatch {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub emission_amount: i64,
}

/// Search for collection root tokens by name or id.
///
/// The Explorer has no collection index, so token search results are
/// filtered down to plausible roots: no decimals and more than one issued
/// unit. Collection metadata descriptions are JSON; when one parses, its
/// category is surfaced.
pub async fn search_collections(
    explorer: &ExplorerClient,
    query: &str,
    limit: usize,
) -> Result<Vec<CollectionMatch>, ApiError> {
    let page = explorer.search_tokens(query).await?;
    let matches: Vec<CollectionMatch> = page
        .items
        .into_iter()
        .filter(is_collection_candidate)
        .take(limit)
        .map(|token| {
            let category = token
                .description
                .as_deref()
                .and_then(|d| serde_json::from_str::<Value>(d).ok())
                .and_then(|meta| {
                    meta.get("category")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                });
            CollectionMatch {
                id: token.id,
                name: token.name.unwrap_or_else(|| "Unknown Collection".to_string()),
                description: token.description,
                category,
                emission_amount: token.emission_amount,
            }
        })
        .collect();

    tracing::info!(query, matches = matches.len(), "collection search finished");
    Ok(matches)
}

fn is_collection_candidate(token: &TokenInfo) -> bool {
    token.decimals.unwrap_or(0) == 0 && token.emission_amount > 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn aggregates_holders_across_members() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blockchain/token/byId/COLL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "COLL", "name": "Gallery", "decimals": 0, "emissionAmount": 100,
                "description": "{\"category\": \"art\"}"
            })))
            .mount(&server)
            .await;
        // mint boxes: collection token next to each member NFT
        Mock::given(method("GET"))
            .and(path("/blockchain/box/byTokenId/COLL"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"boxId": "m1", "address": "issuer", "value": 1,
                 "assets": [{"tokenId": "COLL", "amount": 1}, {"tokenId": "NFT1", "amount": 1}]},
                {"boxId": "m2", "address": "issuer", "value": 1,
                 "assets": [{"tokenId": "COLL", "amount": 1}, {"tokenId": "NFT2", "amount": 1}]}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blockchain/box/unspent/byTokenId/NFT1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"boxId": "h1", "address": "A", "value": 1,
                 "assets": [{"tokenId": "NFT1", "amount": 1}]}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blockchain/box/unspent/byTokenId/NFT2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"boxId": "h2", "address": "A", "value": 1,
                 "assets": [{"tokenId": "NFT2", "amount": 1}]}
            ])))
            .mount(&server)
            .await;

        let node = NodeClient::new(&server.uri(), None);
        let analysis = collection_distribution(&node, "COLL").await.unwrap();
        assert!(!analysis.partial);
        assert_eq!(analysis.report.collection.token_count, 2);
        assert_eq!(analysis.report.distribution.total_holders, 1);
        assert_eq!(analysis.report.distribution.total_supply, 2);
        assert_eq!(analysis.report.distribution.holders[0].address, "A");
    }

    #[tokio::test]
    async fn search_filters_non_collection_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokens/search"))
            .and(query_param("query", "Gallery"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"id": "COLL", "name": "Gallery", "decimals": 0, "emissionAmount": 100,
                     "description": "{\"category\": \"art\"}"},
                    {"id": "FUNGIBLE", "name": "Gallery Coin", "decimals": 6, "emissionAmount": 1000000},
                    {"id": "SINGLE", "name": "Gallery 1/1", "decimals": 0, "emissionAmount": 1}
                ],
                "total": 3
            })))
            .mount(&server)
            .await;

        let explorer = ExplorerClient::new(&server.uri());
        let matches = search_collections(&explorer, "Gallery", 10).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "COLL");
        assert_eq!(matches[0].category.as_deref(), Some("art"));
    }
}
