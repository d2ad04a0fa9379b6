pub mod addresses;
pub mod blocks;
pub mod eips;
pub mod network;
pub mod node;
pub mod swagger;
pub mod tokens;
pub mod transactions;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::AppState;

/// Build the tool-surface router with all operations
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        // Addresses
        .route("/addresses/book", get(addresses::get_address_book))
        .route("/addresses/:address/balance", get(addresses::get_address_balance))
        .route("/addresses/:address/transactions", get(addresses::get_address_history))
        .route("/addresses/:address/analyze", get(addresses::analyze_address))
        // Blocks
        .route("/blocks", get(blocks::get_latest_blocks))
        .route("/blocks/at/:height", get(blocks::get_block_by_height))
        .route("/blocks/:blockId", get(blocks::get_block))
        .route("/blocks/:blockId/transactions", get(blocks::get_block_transactions))
        // Transactions & boxes
        .route("/transactions/submit", post(transactions::submit_transaction))
        .route("/transactions/:txId", get(transactions::get_transaction))
        .route("/boxes/:boxId", get(transactions::get_box))
        // Tokens
        .route("/tokens/search", get(tokens::search_token))
        .route("/tokens/:tokenId", get(tokens::get_token))
        .route("/tokens/:tokenId/holders", get(tokens::get_token_holders))
        // Collections
        .route("/collections/search", get(tokens::search_collections))
        .route("/collections/:tokenId/holders", get(tokens::get_collection_holders))
        // Network
        .route("/network/status", get(network::blockchain_status))
        .route("/network/hashrate", get(network::get_network_hashrate))
        .route("/network/difficulty", get(network::get_mining_difficulty))
        .route("/network/mempool", get(network::get_mempool_statistics))
        // Node
        .route("/node/wallet", get(node::get_node_wallet))
        .route("/node/indexedHeight", get(node::get_indexed_height))
        // EIPs
        .route("/eips", get(eips::list_eips))
        .route("/eips/:number", get(eips::get_eip))
}
