//! Points Ledger Service - HTTP API for points transfers and referral bonuses
//!
//! This is the main entry point for the points service.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use points_service::{create_router, AppState, ServiceConfig};
use points_store::PgStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,points=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Points Ledger Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        database_host = %config.database.host,
        database_name = %config.database.name,
        tx_timeout_seconds = config.tx_timeout_seconds,
        "Service configuration loaded"
    );

    let store = PgStore::connect_with(
        config.database.connect_options(),
        config.database.max_connections,
    )
    .await?;

    tracing::info!("Running database migrations");
    store.migrate().await?;

    let state = AppState::new(store, config.clone());
    let app = create_router(state);

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
