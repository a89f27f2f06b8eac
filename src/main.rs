use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

mod config;
mod dashboard;
mod db;
mod error;
mod hiscores;
mod tracker;

use config::Config;
use dashboard::AppState;
use db::Database;
use hiscores::HiscoresClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let db = Database::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path))?;
    info!("Database opened: {}", config.database_path);

    let hiscores = HiscoresClient::new(
        &config.hiscores_url,
        config.hiscores_timeout(),
        config.hiscores_expected_lines,
    )?;
    info!(
        "Hiscores endpoint: {} (timeout {:?}, {} lines per payload)",
        config.hiscores_url,
        config.hiscores_timeout(),
        config.hiscores_expected_lines
    );

    let app = dashboard::router(AppState {
        db,
        hiscores: Arc::new(hiscores),
    });
    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
