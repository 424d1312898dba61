// =============================================================================
// Central Application State — MELT Index service
// =============================================================================
//
// Ties the fetch boundary to the scoring engine and keeps the most recent
// report for the API.
//
// Thread safety:
//   - The engine is immutable and shared by reference.
//   - The fetcher's cache manages its own interior mutability.
//   - parking_lot::RwLock guards the latest report; a refresh replaces it
//     wholesale.
// =============================================================================

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::{RiskEngine, ScoreRecord};
use crate::fetch::{Fetched, SignalFetcher, SignalSource, Snapshot};
use crate::runtime_config::ServiceConfig;

// =============================================================================
// ScoreReport
// =============================================================================

/// Everything the rendering layer needs for one refresh: the flat score
/// record plus the data-quality flags gathered at the fetch boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreReport {
    #[serde(flatten)]
    pub record: ScoreRecord,

    /// Unrounded score used for classification.
    pub final_score_exact: f64,

    pub band_color: &'static str,

    /// Resolved raw inputs and whether each one is live.
    pub signals: BTreeMap<String, Fetched>,

    /// Signals whose source failed; served from a stale cache entry or a
    /// static default.
    pub stale_signals: Vec<String>,

    /// Signals with no configured source; always served from their default.
    pub unsourced_signals: Vec<String>,

    /// Signals with no value at all; scored as neutral.
    pub missing_signals: Vec<String>,

    /// True when a source failed or an input had no value at all.
    pub degraded: bool,

    /// BTC spot price for display; `None` when the price feed failed.
    pub btc_price_usd: Option<f64>,

    /// ISO 8601 timestamp of the snapshot.
    pub computed_at: String,
}

impl ScoreReport {
    pub fn build(engine: &RiskEngine, snapshot: &Snapshot, btc_price_usd: Option<f64>) -> Self {
        let result = engine.score(&snapshot.raw());

        let stale_signals = snapshot.stale_signals();
        let mut missing_signals = result.substituted.clone();
        missing_signals.sort();
        missing_signals.dedup();

        Self {
            record: result.to_record(),
            final_score_exact: result.final_score,
            band_color: result.band.color(),
            signals: snapshot.values.clone(),
            degraded: snapshot.is_degraded() || !missing_signals.is_empty(),
            stale_signals,
            unsourced_signals: snapshot.unsourced_signals(),
            missing_signals,
            btc_price_usd,
            computed_at: snapshot.taken_at.to_rfc3339(),
        }
    }
}

// =============================================================================
// AppState
// =============================================================================

/// Shared across the refresh loop and the API via `Arc<AppState>`.
pub struct AppState {
    pub config: ServiceConfig,
    pub engine: RiskEngine,
    pub fetcher: SignalFetcher,

    /// Display-only spot price, fetched alongside each snapshot.
    pub price_feed: Option<Arc<dyn SignalSource>>,

    /// Most recent report; `None` until the first refresh completes.
    pub latest: RwLock<Option<ScoreReport>>,

    /// Number of completed refresh cycles.
    pub refresh_count: AtomicU64,

    /// Instant when the service was started. Used for uptime.
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: ServiceConfig, engine: RiskEngine, fetcher: SignalFetcher) -> Self {
        Self {
            config,
            engine,
            fetcher,
            price_feed: None,
            latest: RwLock::new(None),
            refresh_count: AtomicU64::new(0),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn with_price_feed(mut self, feed: Arc<dyn SignalSource>) -> Self {
        self.price_feed = Some(feed);
        self
    }

    /// Fetch a snapshot, score it and publish the report.
    pub async fn refresh(&self) -> ScoreReport {
        let (snapshot, btc_price) = tokio::join!(self.fetcher.snapshot(), self.spot_price());
        let report = ScoreReport::build(&self.engine, &snapshot, btc_price);

        info!(
            score = report.record.final_score,
            band = %report.record.band,
            stale = report.stale_signals.len(),
            missing = report.missing_signals.len(),
            "risk index refreshed"
        );

        *self.latest.write() = Some(report.clone());
        self.refresh_count.fetch_add(1, Ordering::Relaxed);
        report
    }

    async fn spot_price(&self) -> Option<f64> {
        let feed = self.price_feed.as_ref()?;
        match tokio::time::timeout(self.config.fetch_timeout(), feed.fetch()).await {
            Ok(Ok(price)) if price.is_finite() && price > 0.0 => Some(price),
            Ok(Ok(price)) => {
                warn!(source = feed.name(), price, "implausible spot price ignored");
                None
            }
            Ok(Err(e)) => {
                warn!(source = feed.name(), error = %e, "spot price unavailable");
                None
            }
            Err(_) => {
                warn!(source = feed.name(), "spot price request timed out");
                None
            }
        }
    }

    pub fn latest_report(&self) -> Option<ScoreReport> {
        self.latest.read().clone()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
