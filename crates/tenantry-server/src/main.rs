//! Tenantry Server: application entry point.

use anyhow::Context;
use tenantry_core::events::EventBus;
use tenantry_db::DbManager;
use tenantry_server::{AppState, ServerConfig, create_router, notify};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tenantry=info".parse()?))
        .json()
        .init();

    tracing::info!("Starting Tenantry server...");

    let config = ServerConfig::load().context("loading configuration")?;

    let db = DbManager::connect(&config.db)
        .await
        .with_context(|| format!("connecting to {}", config.db.endpoint))?;

    let events = EventBus::new(config.event_capacity);
    let _notifier = notify::spawn_notifier(&events);
    let state =
        AppState::new(&db, config.auth, events).with_error_detail(config.expose_error_detail);

    let listener = TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("binding {}", config.bind_address))?;
    tracing::info!(address = %config.bind_address, "listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    tracing::info!("Tenantry server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
}
