//! Schema Store Server - Binary Entry Point
//!
//! Serves one logical store over HTTP. See `StoreConfig` for the
//! environment variables it reads.

use std::sync::Arc;

use schema_store::api::{create_router, AppState};
use schema_store::{ServiceContext, StoreConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "schema_store=info,schema_store_server=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = StoreConfig::from_env();
    let ctx = Arc::new(ServiceContext::open(config.clone())?);

    let app = create_router(Arc::new(AppState::new(ctx.clone())));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(
        name = schema_store::NAME,
        version = schema_store::VERSION,
        addr = %config.bind_addr,
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ctx.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
    }
}
