use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crmserver::core::store::{CrmStore, MemoryStore, PgStore};
use crmserver::{build_app, AppConfig, AppState};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        return;
    }
    info!("Shutdown signal received");
}

fn open_store(config: &AppConfig) -> Result<Arc<dyn CrmStore>> {
    match &config.database.url {
        Some(url) if !url.trim().is_empty() => {
            let store = PgStore::connect(url, config.database.max_connections)
                .context("Failed to connect to PostgreSQL")?;
            info!("Using PostgreSQL store");
            Ok(Arc::new(store))
        }
        _ => {
            warn!("No database.url configured, records are kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config_file = std::env::var_os("CRM_CONFIG_FILE").map(PathBuf::from);
    let config = AppConfig::load(config_file.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter)),
        )
        .init();

    let store = tokio::task::spawn_blocking({
        let config = config.clone();
        move || open_store(&config)
    })
    .await
    .context("Store initialization task failed")??;

    let addr = config.bind_address();
    let state = Arc::new(AppState::new(config, store)?);
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!("HTTP server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    Ok(())
}
