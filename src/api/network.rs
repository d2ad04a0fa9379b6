use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::models::MempoolTransaction;
use crate::response::{Envelope, ToolResponse};
use crate::upstream::pagination::{self, DEFAULT_PAGE_SIZE};
use crate::upstream::ApiError;
use crate::AppState;

/// Ergo hashrate estimate from difficulty: difficulty * 2^32 / (8192 * 120)
fn hashrate_from_difficulty(difficulty: f64) -> f64 {
    difficulty * 2f64.powi(32) / (8192.0 * 120.0)
}

const NANO_ERG: f64 = 1e9;
/// Mempool snapshots stop after this many transactions.
const MEMPOOL_SCAN_CEILING: usize = 1_000;
const TARGET_BLOCK_TIME_SECS: i64 = 120;

/// GET /api/v1/network/status - Composite chain status from node and Explorer
#[utoipa::path(
    get,
    path = "/network/status",
    tag = "network",
    responses(
        (status = 200, description = "Composite blockchain status", body = ToolResponse)
    )
)]
pub async fn blockchain_status(State(state): State<Arc<AppState>>) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);

    let (node_info, network_state, explorer_info, indexed) = futures::join!(
        state.node.info(),
        state.explorer.network_state(),
        state.explorer.info(),
        state.node.indexed_height(),
    );

    // Each source is best-effort; only a total blackout is an error.
    if node_info.is_err() && network_state.is_err() && explorer_info.is_err() {
        let err = node_info.err().unwrap_or(ApiError::Upstream(
            "no upstream reachable for network status".to_string(),
        ));
        return Json(envelope.error(err));
    }

    let node_info = node_info.ok();
    let network_state = network_state.ok();
    let explorer_info = explorer_info.ok();

    let difficulty = network_state
        .as_ref()
        .map(|s| s.difficulty_f64())
        .filter(|d| *d > 0.0)
        .or_else(|| {
            node_info
                .as_ref()
                .and_then(|i| i.difficulty.as_ref())
                .and_then(|d| d.as_f64())
        })
        .unwrap_or(0.0);

    let data = json!({
        "height": node_info.as_ref().and_then(|i| i.full_height)
            .or_else(|| network_state.as_ref().and_then(|s| s.height)),
        "headersHeight": node_info.as_ref().and_then(|i| i.headers_height),
        "indexedHeight": indexed.ok().and_then(|v| v.get("indexedHeight").cloned()),
        "difficulty": difficulty,
        "estimatedHashrate": hashrate_from_difficulty(difficulty),
        "supply": explorer_info.as_ref().and_then(|i| i.supply.as_ref()),
        "version": node_info.as_ref().and_then(|i| i.app_version.clone())
            .or_else(|| explorer_info.as_ref().and_then(|i| i.version.clone())),
        "networkType": node_info.as_ref().and_then(|i| i.network_type.clone()),
        "peersCount": node_info.as_ref().and_then(|i| i.peers_count),
        "unconfirmedCount": node_info.as_ref().and_then(|i| i.unconfirmed_count),
        "transactionsCount": explorer_info.as_ref().and_then(|i| i.transactions_count),
        "lastBlockId": network_state.as_ref().and_then(|s| s.last_block_id.clone()),
    });
    Json(envelope.success(data))
}

/// GET /api/v1/network/hashrate - Hashrate estimate derived from difficulty
pub async fn get_network_hashrate(State(state): State<Arc<AppState>>) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);
    let result = state.explorer.network_state().await.map(|network_state| {
        let difficulty = network_state.difficulty_f64();
        let hashrate = hashrate_from_difficulty(difficulty);
        json!({
            "difficulty": difficulty,
            "estimatedHashrate": hashrate,
            "hashrateH": hashrate,
            "hashrateKH": hashrate / 1e3,
            "hashrateMH": hashrate / 1e6,
            "hashrateGH": hashrate / 1e9,
            "hashrateTH": hashrate / 1e12,
            "hashratePH": hashrate / 1e15,
            "timestamp": chrono::Utc::now().timestamp_millis(),
        })
    });
    Json(envelope.result(result))
}

/// GET /api/v1/network/difficulty - Current difficulty with the recent
/// adjustment when derivable
pub async fn get_mining_difficulty(State(state): State<Arc<AppState>>) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);

    let (network_state, explorer_info) =
        futures::join!(state.explorer.network_state(), state.explorer.info());
    let network_state = match network_state {
        Ok(s) => s,
        Err(e) => return Json(envelope.error(e)),
    };

    let block_time_target = explorer_info
        .ok()
        .and_then(|i| i.parameters)
        .and_then(|p| p.get("blockInterval").and_then(Value::as_i64))
        .unwrap_or(TARGET_BLOCK_TIME_SECS);

    let difficulty_change = difficulty_change(&network_state.last_blocks);

    let data = json!({
        "difficulty": network_state.difficulty_f64(),
        "blockTimeTarget": block_time_target,
        "difficultyChange": difficulty_change,
        "timestamp": chrono::Utc::now().timestamp_millis(),
    });
    Json(envelope.success(data))
}

fn difficulty_change(last_blocks: &[Value]) -> Option<Value> {
    let current = last_blocks.first()?.get("difficulty")?.as_f64()?;
    let previous = last_blocks.get(1)?.get("difficulty")?.as_f64()?;
    if previous <= 0.0 {
        return None;
    }
    Some(json!({
        "previousDifficulty": previous,
        "currentDifficulty": current,
        "changePercent": (current - previous) / previous * 100.0,
    }))
}

/// GET /api/v1/network/mempool - Aggregate statistics over the mempool
#[utoipa::path(
    get,
    path = "/network/mempool",
    tag = "network",
    responses(
        (status = 200, description = "Mempool statistics", body = ToolResponse)
    )
)]
pub async fn get_mempool_statistics(State(state): State<Arc<AppState>>) -> Json<ToolResponse> {
    let envelope = Envelope::begin(state.verbosity);

    let node = state.node.clone();
    let scan = pagination::walk(
        move |offset, limit| {
            let node = node.clone();
            async move { node.mempool_transactions(offset, limit).await }
        },
        DEFAULT_PAGE_SIZE,
        Some(MEMPOOL_SCAN_CEILING),
    )
    .await;

    if scan.items.is_empty() && scan.is_partial() {
        return Json(envelope.error(ApiError::Upstream(
            "mempool unavailable: could not fetch unconfirmed transactions".to_string(),
        )));
    }

    let data = mempool_stats(&scan.items);
    Json(envelope.success_partial(data, scan.is_partial()))
}

/// Aggregate a mempool snapshot. Fee figures sum the upstream `fee` field
/// where present; exact fees would need input-minus-output derivation.
fn mempool_stats(txs: &[MempoolTransaction]) -> Value {
    let tx_count = txs.len();
    let total_bytes: i64 = txs.iter().filter_map(|tx| tx.size).sum();
    let total_value: i64 = txs
        .iter()
        .map(|tx| tx.outputs.iter().filter_map(|o| o.value).sum::<i64>())
        .sum();

    let fees: Vec<i64> = txs.iter().map(|tx| tx.fee.unwrap_or(0)).collect();
    let (avg_fee, min_fee, max_fee) = if fees.is_empty() {
        (0.0, 0, 0)
    } else {
        (
            fees.iter().sum::<i64>() as f64 / fees.len() as f64,
            *fees.iter().min().unwrap_or(&0),
            *fees.iter().max().unwrap_or(&0),
        )
    };

    let avg_size = if tx_count > 0 {
        total_bytes as f64 / tx_count as f64
    } else {
        0.0
    };
    let total_value_erg = total_value as f64 / NANO_ERG;
    let avg_value_erg = if tx_count > 0 {
        total_value_erg / tx_count as f64
    } else {
        0.0
    };

    json!({
        "timestamp": chrono::Utc::now().timestamp_millis(),
        "transactionCount": tx_count,
        "totalBytes": total_bytes,
        "totalValue": total_value,
        "totalValueERG": total_value_erg,
        "averageSize": avg_size,
        "averageValueERG": avg_value_erg,
        "feeStats": {
            "averageFee": avg_fee,
            "averageFeeERG": avg_fee / NANO_ERG,
            "minFee": min_fee,
            "minFeeERG": min_fee as f64 / NANO_ERG,
            "maxFee": max_fee,
            "maxFeeERG": max_fee as f64 / NANO_ERG,
        },
        "transactions": txs.iter().take(10).collect::<Vec<_>>(),
    })
}
