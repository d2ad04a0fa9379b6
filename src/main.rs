use anyhow::Result;
use axum::{routing::get, Router};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod analytics;
mod api;
mod eips;
mod models;
mod response;
mod upstream;

use eips::EipManager;
use response::{ResponseLimits, Verbosity};
use upstream::address_book::{AddressBookClient, DEFAULT_ADDRESS_BOOK_API};
use upstream::explorer::{ExplorerClient, DEFAULT_EXPLORER_API};
use upstream::node::{NodeClient, DEFAULT_NODE_API};

#[derive(Parser, Debug, Clone)]
#[command(name = "ergo-lens")]
#[command(about = "Read-oriented analytics service for the Ergo blockchain")]
pub struct Config {
    /// Ergo node API URL (needs extraIndex enabled)
    #[arg(long, env = "ERGO_NODE_API", default_value = DEFAULT_NODE_API)]
    pub node_api: String,

    /// Node API key (required for wallet endpoints)
    #[arg(long, env = "ERGO_NODE_API_KEY")]
    pub node_api_key: Option<String>,

    /// Explorer API base URL
    #[arg(long, env = "ERGO_EXPLORER_API", default_value = DEFAULT_EXPLORER_API)]
    pub explorer_api: String,

    /// Address book API base URL
    #[arg(long, env = "ERGO_ADDRESS_BOOK_API", default_value = DEFAULT_ADDRESS_BOOK_API)]
    pub address_book_api: String,

    /// HTTP server host
    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP server port
    #[arg(long, env = "SERVER_PORT", default_value = "3001")]
    pub port: u16,

    /// Response verbosity: normal (with metadata) or minimal
    #[arg(long, env = "RESPONSE_VERBOSITY", default_value = "normal")]
    pub verbosity: String,

    /// Directory holding the EIP repository mirror
    #[arg(long, env = "EIP_REPO_DIR", default_value = "./data/eips")]
    pub eip_dir: String,

    /// Hours between EIP mirror refreshes
    #[arg(long, env = "EIP_REFRESH_HOURS", default_value = "24")]
    pub eip_refresh_hours: u64,

    /// Directory with bundled resource files (address book fallback)
    #[arg(long, env = "RESOURCES_DIR", default_value = "./resources")]
    pub resources: String,

    /// Cap on boxes scanned per token holder walk (unbounded when unset)
    #[arg(long, env = "MAX_HOLDER_BOXES")]
    pub max_holder_boxes: Option<usize>,
}

pub struct AppState {
    pub explorer: ExplorerClient,
    pub node: NodeClient,
    pub address_book: AddressBookClient,
    pub eips: Arc<EipManager>,
    pub limits: ResponseLimits,
    pub verbosity: Verbosity,
    pub max_holder_boxes: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ergo_lens=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();

    tracing::info!("Starting ergo-lens v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Node API: {}", config.node_api);
    tracing::info!("Explorer API: {}", config.explorer_api);

    let eip_manager = Arc::new(EipManager::new(
        eips::DEFAULT_EIP_REPO_URL,
        &config.eip_dir,
        Duration::from_secs(config.eip_refresh_hours * 60 * 60),
    ));
    // A failed initial sync is survivable: the index stays empty until the
    // background refresher manages a load.
    match eip_manager.load().await {
        Ok(count) => tracing::info!("Loaded {} EIPs", count),
        Err(e) => tracing::error!("Initial EIP load failed: {e:#}"),
    }
    let refresher = eip_manager.spawn_refresher();

    let state = Arc::new(AppState {
        explorer: ExplorerClient::new(&config.explorer_api),
        node: NodeClient::new(&config.node_api, config.node_api_key.clone()),
        address_book: AddressBookClient::new(
            &config.address_book_api,
            &PathBuf::from(&config.resources),
        ),
        eips: eip_manager.clone(),
        limits: ResponseLimits::from_env(),
        verbosity: Verbosity::parse(&config.verbosity),
        max_holder_boxes: config.max_holder_boxes,
    });

    // Build router
    let app = Router::new()
        .nest("/api/v1", api::routes())
        .route("/health", get(|| async { "OK" }))
        .merge(api::swagger::swagger_routes())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the EIP refresher and give it a bounded window to exit
    eip_manager.stop();
    if tokio::time::timeout(Duration::from_secs(5), refresher)
        .await
        .is_err()
    {
        tracing::warn!("EIP refresher did not stop within 5s");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    tracing::info!("Shutdown signal received");
}
