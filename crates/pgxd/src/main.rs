//! pgxd - pharmacogenomic analysis daemon

use anyhow::{Context, Result};
use pgxd::config::Config;
use pgxd::server::{self, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("[BOOT] pgxd v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::load();
    let state = AppState::from_config(&config).context("Failed to initialize analysis state")?;
    info!("[BOOT] Explanation cache capacity {}", config.cache.capacity);

    server::run(state, &config).await
}
