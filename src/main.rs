//! Uslugo server entry point

use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uslugo::api::ApiServer;
use uslugo::scheduler::{ExpirySweeper, StatusSimulator};
use uslugo::{security, AppState, Result};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("uslugo=debug,info")),
        )
        .init();

    let state = Arc::new(AppState::new()?);

    bootstrap_api_key(&state)?;

    let _sweeper = ExpirySweeper::new(state.clone()).start();

    let _simulator = if std::env::var("USLUGO_SIMULATE_STATUS").is_ok() {
        warn!("Status simulator enabled, provider flags will be randomized");
        Some(StatusSimulator::new(state.clone()).start())
    } else {
        None
    };

    let mut server = ApiServer::new(state);
    let addr = server.start().await?;
    info!("Uslugo listening on http://{}", addr);

    tokio::signal::ctrl_c()
        .await
        .map_err(uslugo::AppError::Io)?;
    info!("Shutdown signal received");
    server.stop();

    Ok(())
}

/// Issue a first API key on an empty key table and print it once.
fn bootstrap_api_key(state: &AppState) -> Result<()> {
    if !state.sqlite.has_no_api_keys()? {
        return Ok(());
    }

    let key = security::generate_api_key();
    state
        .sqlite
        .create_api_key("bootstrap", &security::hash_api_key(&key))?;
    info!("Generated bootstrap API key (shown only once): {}", key);
    Ok(())
}
