//! StayWallet Service - wallet ledger and booking settlement jobs
//!
//! This is the main entry point for the staywallet service.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use staywallet_service::{AppState, Collaborators, ServiceConfig};
use staywallet_store::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,staywallet=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting StayWallet Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        data_dir = %config.data_dir,
        instance_id = %config.instance_id,
        config_api_configured = %config.config_api_url.is_some(),
        availability_configured = %config.availability_api_url.is_some(),
        notifications_configured = %config.notification_webhook_url.is_some(),
        gateway_configured = %config.payment_gateway_url.is_some(),
        auto_cancel_hours = config.booking_auto_cancel_hours,
        "Service configuration loaded"
    );

    let store = open_store(&config)?;
    let collaborators = Collaborators::from_config(&config)?;
    let state = AppState::new(store, config, collaborators);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = state.scheduler.spawn(&shutdown_rx);
    tracing::info!(jobs = handles.len(), "Settlement jobs running");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested, waiting for running jobs");
    shutdown_tx.send(true)?;

    for handle in futures::future::join_all(handles).await {
        if let Err(e) = handle {
            tracing::error!(error = %e, "Job task ended abnormally");
        }
    }

    tracing::info!("StayWallet Service stopped");
    Ok(())
}

#[cfg(feature = "rocksdb-backend")]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = staywallet_store::RocksStore::open(&config.data_dir)?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "rocksdb-backend"))]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::warn!(
        data_dir = %config.data_dir,
        "Built without RocksDB, using the in-memory store; data will not survive a restart"
    );
    Ok(Arc::new(staywallet_store::MemoryStore::new()))
}
