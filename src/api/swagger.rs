//! OpenAPI/Swagger documentation

use axum::Router;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::analytics::collections::{CollectionDescriptor, CollectionMatch};
use crate::analytics::graph::{AddressGraphReport, GraphAddress, GraphLevel, HubAddress};
use crate::analytics::holders::{Concentration, DistributionReport, TokenHolder};
use crate::api::{addresses, blocks, eips, network, node, tokens, transactions};
use crate::eips::{EipDetail, EipSummary};
use crate::models::{
    AddressBalance, AddressBook, Balance, BoxAsset, BoxRecord, MempoolTransaction,
    PaginatedTokens, PaginatedTransactions, TokenBalance, TokenInfo, TransactionInfo, TxEntry,
};
use crate::response::estimator::TokenBreakdown;
use crate::response::{ResponseMetadata, ResponseStatus, ToolResponse};
use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Ergo Lens API",
        version = "1.0.0",
        description = "Read-oriented analytics over the Ergo blockchain.

Every operation composes the public Explorer API and a node's indexed
blockchain API, and answers with a uniform envelope:

```
{ \"status\": \"success\"|\"error\", \"data\": ..., \"message\": ...,
  \"metadata\": { \"execution_time_ms\", \"result_count\", \"result_size_bytes\",
                \"is_truncated\", \"original_count\", \"token_estimate\" } }
```

## Highlights
- Token holder distribution with Gini and top-10% concentration
- NFT collection holder aggregation
- Depth-bounded address graph exploration
- Mempool, hashrate and difficulty analytics
- Mirrored Ergo Improvement Proposals corpus

Set `RESPONSE_VERBOSITY=minimal` to drop the metadata block.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    tags(
        (name = "addresses", description = "Address balances, history and graph analysis"),
        (name = "blocks", description = "Block lookups"),
        (name = "transactions", description = "Transaction lookups and submit"),
        (name = "tokens", description = "Token metadata, search and holder analytics"),
        (name = "collections", description = "NFT collection search and holder analytics"),
        (name = "network", description = "Chain status, mempool, hashrate, difficulty"),
        (name = "node", description = "Node wallet and index state"),
        (name = "eips", description = "Ergo Improvement Proposals")
    ),
    paths(
        addresses::get_address_balance,
        addresses::get_address_history,
        addresses::analyze_address,
        blocks::get_latest_blocks,
        blocks::get_block_by_height,
        transactions::get_transaction,
        tokens::get_token,
        tokens::search_token,
        tokens::get_token_holders,
        tokens::get_collection_holders,
        tokens::search_collections,
        network::blockchain_status,
        network::get_mempool_statistics,
        node::get_node_wallet,
        eips::list_eips,
        eips::get_eip,
    ),
    components(
        schemas(
            ToolResponse,
            ResponseStatus,
            ResponseMetadata,
            TokenBreakdown,
            Balance,
            TokenBalance,
            AddressBalance,
            AddressBook,
            BoxAsset,
            BoxRecord,
            TxEntry,
            TransactionInfo,
            TokenInfo,
            MempoolTransaction,
            PaginatedTransactions,
            PaginatedTokens,
            TokenHolder,
            Concentration,
            DistributionReport,
            CollectionDescriptor,
            CollectionMatch,
            AddressGraphReport,
            GraphLevel,
            GraphAddress,
            HubAddress,
            EipSummary,
            EipDetail,
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_routes() -> Router<Arc<AppState>> {
    Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
