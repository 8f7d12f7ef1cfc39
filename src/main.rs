// =============================================================================
// Candle Overlay -- Main Entry Point
// =============================================================================
//
// Serves OHLCV candles with synthetic options-volume overlays for the selected
// symbol, refreshed every couple of minutes. When the live provider is
// unreachable or throttled, synthetic candles are served instead.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod error;
mod market_data;
mod orchestrator;
mod provider;
mod refresh;
mod runtime_config;
mod synthetic;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::orchestrator::{DataFetchOrchestrator, FetchRequest, FetchSettings};
use crate::provider::HttpTransport;
use crate::refresh::RefreshController;
use crate::runtime_config::{RuntimeConfig, ENV_API_KEY};

const CONFIG_PATH: &str = "candle_overlay.json";

/// Public key accepted by the provider for a handful of demo symbols.
const DEMO_API_KEY: &str = "demo";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Candle Overlay starting up");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env(|key| std::env::var(key).ok());
    let config = config.sanitised();

    let api_key = std::env::var(ENV_API_KEY)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .unwrap_or_else(|| {
            warn!(var = ENV_API_KEY, "API key not set -- using the demo key");
            DEMO_API_KEY.to_string()
        });

    info!(
        symbols = ?config.symbols,
        default_symbol = %config.default_symbol,
        interval = %config.default_interval,
        refresh_period_secs = config.refresh_period_secs,
        fallback_policy = %config.fallback_policy,
        "Configuration resolved"
    );

    // ── 2. Provider, orchestrator, controller ────────────────────────────
    let transport = HttpTransport::new(
        config.provider_base_url.clone(),
        api_key,
        config.request_timeout(),
    )
    .context("failed to build provider HTTP client")?;

    let orchestrator = Arc::new(DataFetchOrchestrator::new(
        Arc::new(transport),
        FetchSettings::from_config(&config),
    ));

    let controller = Arc::new(RefreshController::new(
        orchestrator,
        FetchRequest::new(config.default_symbol.clone(), config.default_interval),
        config.refresh_period(),
    ));

    let bind_addr = config.bind_addr.clone();
    let auto_refresh = config.auto_refresh;
    let state = Arc::new(AppState::new(config, controller.clone()));
    let _listener = state.spawn_notice_listener();

    // ── 3. Initial load + timer ──────────────────────────────────────────
    let initial = controller.clone();
    tokio::spawn(async move {
        match initial.refresh().await {
            Ok(outcome) => info!(
                symbol = %outcome.request.symbol,
                state = %outcome.state,
                bars = outcome.envelope.data().len(),
                "Initial load complete"
            ),
            Err(e) => error!(error = %e, "Initial load failed"),
        }
    });

    if auto_refresh {
        controller.start();
    } else {
        info!("Auto refresh disabled -- manual refresh only");
    }

    // ── 4. API server ────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let app = api::rest::router(state.clone());
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received -- stopping gracefully");

    controller.stop().await;
    server.abort();

    if let Err(e) = state.runtime_config.read().save(CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("Candle Overlay shut down complete.");
    Ok(())
}
