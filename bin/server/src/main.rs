//! LoopHub Server
//!
//! Serves the LoopHub forum over JSON-RPC 2.0 (`POST /rpc`) with all data
//! kept in RocksDB.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings (localhost:3030, ./loophub_data)
//! loophub-server
//!
//! # Custom address and data directory
//! loophub-server --bind 0.0.0.0:8080 --data-dir /var/lib/loophub
//!
//! # Behind a reverse proxy that sets X-Forwarded-For
//! TRUST_PROXY_HEADERS=true loophub-server
//!
//! # Enable debug logging
//! RUST_LOG=debug loophub-server
//! ```

mod config;
mod rate_limit;
mod rpc;

use clap::Parser;
use config::ServerConfig;
use loophub::forum::{ForumService, ForumStorage};
use loophub::storage::RocksDbConfig;
use rpc::AppState;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "loophub_server=info,loophub=info,tower_http=debug".into()
        }))
        .init();

    let config = ServerConfig::parse();

    let storage = match ForumStorage::with_config(&config.data_dir, &RocksDbConfig::for_server()) {
        Ok(storage) => storage,
        Err(e) => {
            error!("Failed to open data directory {:?}: {}", config.data_dir, e);
            return Err(e.into());
        }
    };
    let service = ForumService::with_system_clock(storage).with_session_ttl(config.session_ttl_ms());
    match service.stats() {
        Ok(stats) => info!(
            users = stats.users,
            communities = stats.communities,
            threads = stats.threads,
            comments = stats.comments,
            "Forum storage loaded from {:?}",
            config.data_dir
        ),
        Err(e) => error!("Failed to read forum stats: {}", e),
    }

    let app = rpc::router(AppState::new(service))
        .layer(config.rate_limit_layer())
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(config.bind).await?;
    info!("LoopHub server running on http://{}", config.bind);
    info!("  POST /rpc     - JSON-RPC 2.0 endpoint");
    info!("  GET  /health  - Health check");
    info!(
        read_rate = config.read_rate,
        write_rate = config.write_rate,
        trust_proxy_headers = config.trust_proxy_headers,
        "Rate limits per IP per 10s"
    );

    // Client IPs come from the connection info for rate limiting.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
