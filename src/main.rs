// =============================================================================
// RSI Dashboard Core: Main Entry Point
// =============================================================================
//
// Fetches candles for the selected market on a fixed cadence, computes
// RSI / MACD / trend readings from the cache, and serves them to the
// presentation layer over HTTP.  Nothing here places orders.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod indicators;
mod market_data;
mod numeric;
mod runtime_config;
mod scheduler;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::market_data::UpbitFetcher;
use crate::runtime_config::{parse_symbol_list, RuntimeConfig, DEFAULT_CONFIG_PATH};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("RSI dashboard core starting up");

    let config_path =
        std::env::var("DASHBOARD_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    if let Ok(syms) = std::env::var("DASHBOARD_SYMBOLS") {
        config.symbols = parse_symbol_list(&syms);
    }
    if let Ok(addr) = std::env::var("DASHBOARD_BIND_ADDR") {
        config.bind_addr = addr;
    }
    config.normalize();

    info!(
        symbols = ?config.symbols,
        timeframes = ?config.timeframes,
        mode = %config.mode,
        base_url = %config.base_url,
        "Configured markets"
    );

    // ── 2. Candle source + shared state ──────────────────────────────────
    let fetcher = UpbitFetcher::new(config.base_url.clone(), config.request_timeout())
        .context("failed to build candle fetcher")?;
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, Arc::new(fetcher)));

    // ── 3. Background loops ──────────────────────────────────────────────
    tokio::spawn(scheduler::run_refresh_loop(state.clone()));
    tokio::spawn(scheduler::run_ui_tick_loop(state.clone()));

    // ── 4. API server ────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let app = api::rest::router(state.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received, stopping");

    if let Err(e) = state.runtime_config.read().save(&config_path) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("RSI dashboard core shut down complete.");
    Ok(())
}
