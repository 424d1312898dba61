// =============================================================================
// MELT Index — Main Entry Point
// =============================================================================
//
// Startup order matters: the scoring model is validated before any network
// activity, so a misconfigured weight table stops the process immediately.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod engine;
mod errors;
mod fetch;
mod runtime_config;
mod sources;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::engine::RiskEngine;
use crate::fetch::{SignalCache, SignalFetcher, SystemClock};
use crate::runtime_config::ServiceConfig;
use crate::sources::{
    CbbiSource, FearGreedSource, FredMomentumSource, FundingRateSource, OpenInterestSource,
    SpotPriceSource, StablecoinSupplySource, YahooMomentumSource,
};
use crate::types::{DXY_MOM_PCT, M2_MOM_PCT, WTI_MOM_PCT, YLD_MOM_PCT};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("MELT Index starting up");

    let config_path =
        std::env::var("MELT_CONFIG_PATH").unwrap_or_else(|_| "melt_config.json".into());
    let mut config = ServiceConfig::load_or_init(&config_path)
        .with_context(|| format!("cannot start with config {config_path}"))?;

    if let Ok(addr) = std::env::var("MELT_BIND_ADDR") {
        config.bind_addr = addr;
    }

    // ── 2. Scoring model (fatal if inconsistent) ─────────────────────────
    let engine = RiskEngine::new(config.engine.clone()).context("invalid scoring model")?;
    info!(
        hold_from = engine.config().thresholds.hold_from,
        take_profits_from = engine.config().thresholds.take_profits_from,
        signals = engine.config().signals.len(),
        "scoring model validated"
    );

    // ── 3. Fetch boundary ────────────────────────────────────────────────
    let client = reqwest::Client::builder()
        .timeout(config.fetch_timeout())
        .user_agent(concat!("melt-index/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    let cache = Arc::new(SignalCache::new(config.cache_ttl(), Arc::new(SystemClock)));
    let mut fetcher = SignalFetcher::new(
        cache,
        config.fallbacks.clone().into_iter().collect(),
        config.fetch_timeout(),
    );

    fetcher.register(Arc::new(FearGreedSource::new(client.clone())));
    fetcher.register(Arc::new(CbbiSource::new(client.clone())));
    fetcher.register(Arc::new(YahooMomentumSource::new(client.clone(), "DX-Y.NYB", DXY_MOM_PCT)));
    fetcher.register(Arc::new(YahooMomentumSource::new(client.clone(), "^TNX", YLD_MOM_PCT)));
    fetcher.register(Arc::new(YahooMomentumSource::new(client.clone(), "CL=F", WTI_MOM_PCT)));
    fetcher.register(Arc::new(StablecoinSupplySource::new(client.clone())));
    fetcher.register(Arc::new(FundingRateSource::new(client.clone(), &config.futures_symbol)));
    fetcher.register(Arc::new(OpenInterestSource::new(client.clone(), &config.futures_symbol)));

    match std::env::var("FRED_API_KEY") {
        Ok(key) if !key.trim().is_empty() => {
            fetcher.register(Arc::new(FredMomentumSource::new(
                client.clone(),
                "M2SL",
                key.trim(),
                M2_MOM_PCT,
            )));
        }
        _ => warn!("FRED_API_KEY not set, M2 growth will use its fallback value"),
    }

    // ── 4. Shared state & first refresh ──────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let refresh_interval = config.refresh_interval();
    let price_feed = Arc::new(SpotPriceSource::new(client.clone(), &config.spot_symbol));
    let state = Arc::new(AppState::new(config, engine, fetcher).with_price_feed(price_feed));

    state.refresh().await;

    // ── 5. Refresh loop ──────────────────────────────────────────────────
    let loop_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(refresh_interval);
        // The first tick completes immediately; the initial refresh already ran.
        interval.tick().await;
        loop {
            interval.tick().await;
            loop_state.refresh().await;
        }
    });

    // ── 6. API server ────────────────────────────────────────────────────
    let app = api::rest::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    axum::serve(listener, app).await.context("API server failed")?;
    Ok(())
}
