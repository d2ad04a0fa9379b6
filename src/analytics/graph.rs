//! Address graph traversal
//!
//! Bounded breadth-first exploration of the address/transaction bipartite
//! graph around a seed address, for forensic-style reports.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use utoipa::ToSchema;

use crate::upstream::explorer::ExplorerClient;
use crate::upstream::ApiError;

pub const MIN_DEPTH: u32 = 1;
pub const MAX_DEPTH: u32 = 4;
pub const MIN_TX_LIMIT: usize = 1;
pub const MAX_TX_LIMIT: usize = 20;

/// Addresses shown with balances per level.
const DISPLAY_LIMIT: usize = 5;
/// An address with more observed transactions than this is a hub.
const HUB_TX_THRESHOLD: usize = 3;
const HUB_DISPLAY_LIMIT: usize = 3;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GraphAddress {
    pub address: String,
    pub distance: u32,
    pub tx_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_erg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GraphLevel {
    pub distance: u32,
    pub address_count: usize,
    /// Up to five addresses, balance-enriched best effort.
    pub addresses: Vec<GraphAddress>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HubAddress {
    pub address: String,
    pub distance: u32,
    pub tx_count: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressGraphReport {
    pub address: String,
    pub depth: u32,
    pub tx_limit: usize,
    pub related_addresses: usize,
    pub total_transactions: usize,
    pub levels: Vec<GraphLevel>,
    pub hubs: Vec<HubAddress>,
}

struct GraphNode {
    distance: u32,
    txs: Vec<String>,
}

/// Explore the graph around `seed` up to `depth` hops, considering at most
/// `tx_limit` transactions per address.
///
/// Per-address fetch failures are localised: the walk continues and the
/// report covers whatever was reachable. Only a seed whose own expansion
/// failed outright produces an error.
pub async fn analyze_address(
    explorer: &ExplorerClient,
    seed: &str,
    depth: u32,
    tx_limit: usize,
) -> Result<AddressGraphReport, ApiError> {
    if !(MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
        return Err(ApiError::InvalidInput(format!(
            "depth must be between {MIN_DEPTH} and {MAX_DEPTH} inclusive"
        )));
    }
    if !(MIN_TX_LIMIT..=MAX_TX_LIMIT).contains(&tx_limit) {
        return Err(ApiError::InvalidInput(format!(
            "transaction limit must be between {MIN_TX_LIMIT} and {MAX_TX_LIMIT} inclusive"
        )));
    }

    let mut visited: HashSet<String> = HashSet::from([seed.to_string()]);
    let mut nodes: HashMap<String, GraphNode> = HashMap::new();
    nodes.insert(
        seed.to_string(),
        GraphNode {
            distance: 0,
            txs: Vec::new(),
        },
    );

    let mut queue: VecDeque<(String, u32)> = VecDeque::from([(seed.to_string(), 1)]);
    let mut seed_error: Option<ApiError> = None;

    while let Some((address, dist)) = queue.pop_front() {
        if dist > depth {
            continue;
        }

        let page = match explorer.address_transactions(&address, tx_limit, 0).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "skipping address after fetch failure");
                if address == seed {
                    seed_error = Some(e);
                }
                continue;
            }
        };

        for tx in page.items {
            let newly_observed = match nodes.get_mut(&address) {
                Some(node) if node.txs.contains(&tx.id) => false,
                Some(node) => {
                    node.txs.push(tx.id.clone());
                    true
                }
                None => false,
            };
            if !newly_observed {
                continue;
            }

            for neighbour in tx.counterparties(&address) {
                if visited.insert(neighbour.clone()) {
                    nodes.insert(
                        neighbour.clone(),
                        GraphNode {
                            distance: dist,
                            txs: Vec::new(),
                        },
                    );
                    queue.push_back((neighbour, dist + 1));
                }
            }
        }
    }

    let total_transactions: usize = nodes.values().map(|n| n.txs.len()).sum();
    if nodes.len() == 1 && total_transactions == 0 {
        if let Some(e) = seed_error {
            return Err(e);
        }
    }

    let mut levels = Vec::new();
    for distance in 1..=depth {
        let mut at_level: Vec<(&String, &GraphNode)> = nodes
            .iter()
            .filter(|(_, node)| node.distance == distance)
            .collect();
        if at_level.is_empty() {
            continue;
        }
        at_level.sort_by(|a, b| a.0.cmp(b.0));

        let enriched = futures::future::join_all(at_level.iter().take(DISPLAY_LIMIT).map(
            |(address, node)| async {
                let balance = explorer.confirmed_balance(address).await.ok();
                GraphAddress {
                    address: (*address).clone(),
                    distance,
                    tx_count: node.txs.len(),
                    balance_erg: balance.as_ref().map(|b| b.nano_ergs as f64 / 1e9),
                    token_count: balance.as_ref().map(|b| b.tokens.len()),
                }
            },
        ))
        .await;

        levels.push(GraphLevel {
            distance,
            address_count: at_level.len(),
            addresses: enriched,
        });
    }

    let mut hubs: Vec<HubAddress> = nodes
        .iter()
        .filter(|(_, node)| node.distance > 0 && node.txs.len() > HUB_TX_THRESHOLD)
        .map(|(address, node)| HubAddress {
            address: address.clone(),
            distance: node.distance,
            tx_count: node.txs.len(),
        })
        .collect();
    hubs.sort_by(|a, b| {
        b.tx_count
            .cmp(&a.tx_count)
            .then_with(|| a.address.cmp(&b.address))
    });
    hubs.truncate(HUB_DISPLAY_LIMIT);

    tracing::info!(
        seed,
        depth,
        tx_limit,
        addresses = nodes.len(),
        transactions = total_transactions,
        "address graph built"
    );

    Ok(AddressGraphReport {
        address: seed.to_string(),
        depth,
        tx_limit,
        related_addresses: nodes.len() - 1,
        total_transactions,
        levels,
        hubs,
    })
}
