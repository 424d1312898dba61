// =============================================================================
// Fetch Boundary — cached, time-bounded retrieval with static fallbacks
// =============================================================================
//
// Every signal is resolved in this order:
//
//   1. fresh cache entry                       → live
//   2. upstream source, bounded by a timeout    → live (and cached)
//   3. most recent cache entry, however old     → stale
//   4. static default from the fallback table   → stale
//   5. nothing                                  → missing (engine uses 50)
//
// A signal with no registered source skips straight to its static default
// and is reported as unsourced.  It is a permanent condition of the
// deployment, not a fetch failure, so it does not count as stale.
//
// Fallback use is logged here and reported through `is_live`; the engine
// never sees the difference between a live and a stale value.
// =============================================================================

pub mod cache;

pub use cache::{SignalCache, SystemClock};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::{join_all, BoxFuture};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::FetchError;
use crate::types::RawSignals;

// =============================================================================
// SignalSource
// =============================================================================

/// An upstream provider for exactly one raw signal.
pub trait SignalSource: Send + Sync {
    /// Provider label used in logs and errors.
    fn name(&self) -> &str;

    /// Signal key this source produces.
    fn signal(&self) -> &str;

    fn fetch(&self) -> BoxFuture<'_, Result<f64, FetchError>>;
}

// =============================================================================
// Fetched values
// =============================================================================

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Upstream,
    Cache,
    StaleCache,
    Default,
    /// No source is registered; the static default is the only value.
    Unsourced,
}

impl Origin {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Upstream | Self::Cache)
    }

    /// A source exists but could not deliver a current value.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleCache | Self::Default)
    }
}

/// A resolved value and whether it can be trusted as current.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Fetched {
    pub value: f64,
    pub is_live: bool,
    pub origin: Origin,
}

impl Fetched {
    fn new(value: f64, origin: Origin) -> Self {
        Self {
            value,
            is_live: origin.is_live(),
            origin,
        }
    }
}

/// Every signal resolved in one refresh cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub values: BTreeMap<String, Fetched>,
    /// Signals with neither a live value nor any fallback.
    pub missing: Vec<String>,
    pub taken_at: DateTime<Utc>,
}

impl Snapshot {
    /// Plain name → value map for the engine.
    pub fn raw(&self) -> RawSignals {
        self.values
            .iter()
            .map(|(k, f)| (k.clone(), f.value))
            .collect()
    }

    /// Signals whose source failed and were served from a stale cache entry
    /// or a static default.
    pub fn stale_signals(&self) -> Vec<String> {
        self.signals_where(|o| o.is_stale())
    }

    /// Signals with no registered source, served from their static default.
    pub fn unsourced_signals(&self) -> Vec<String> {
        self.signals_where(|o| o == Origin::Unsourced)
    }

    /// True when any fetch failed or any signal has no value at all.
    pub fn is_degraded(&self) -> bool {
        !self.missing.is_empty() || self.values.values().any(|f| f.origin.is_stale())
    }

    fn signals_where(&self, pred: impl Fn(Origin) -> bool) -> Vec<String> {
        self.values
            .iter()
            .filter(|(_, f)| pred(f.origin))
            .map(|(k, _)| k.clone())
            .collect()
    }
}

// =============================================================================
// SignalFetcher
// =============================================================================

pub struct SignalFetcher {
    sources: HashMap<String, Arc<dyn SignalSource>>,
    cache: Arc<SignalCache>,
    fallbacks: HashMap<String, f64>,
    timeout: Duration,
}

impl SignalFetcher {
    pub fn new(cache: Arc<SignalCache>, fallbacks: HashMap<String, f64>, timeout: Duration) -> Self {
        Self {
            sources: HashMap::new(),
            cache,
            fallbacks,
            timeout,
        }
    }

    /// Register `source` as the provider for its signal, replacing any
    /// previous provider.
    pub fn register(&mut self, source: Arc<dyn SignalSource>) {
        let signal = source.signal().to_string();
        info!(signal = %signal, source = source.name(), "signal source registered");
        self.sources.insert(signal, source);
    }

    /// Every signal with a source or a fallback default.
    pub fn signal_names(&self) -> Vec<String> {
        self.sources
            .keys()
            .chain(self.fallbacks.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Resolve one signal. `None` only when no value of any kind exists.
    pub async fn get(&self, signal: &str) -> Option<Fetched> {
        if let Some(entry) = self.cache.fresh(signal) {
            debug!(signal, value = entry.value, "cache hit");
            return Some(Fetched::new(entry.value, Origin::Cache));
        }

        match self.fetch_upstream(signal).await {
            Ok(value) => {
                self.cache.insert(signal, value);
                debug!(signal, value, "upstream value cached");
                Some(Fetched::new(value, Origin::Upstream))
            }
            Err(FetchError::NoSource(_)) => {
                let value = self.fallbacks.get(signal).copied();
                debug!(signal, ?value, "no upstream source, using static default");
                value.map(|v| Fetched::new(v, Origin::Unsourced))
            }
            Err(e) => {
                warn!(signal, error = %e, "fetch failed, using fallback");
                self.fallback(signal)
            }
        }
    }

    /// Resolve every known signal concurrently.
    pub async fn snapshot(&self) -> Snapshot {
        let names = self.signal_names();
        let results = join_all(names.iter().map(|n| self.get(n))).await;

        let mut values = BTreeMap::new();
        let mut missing = Vec::new();
        for (name, fetched) in names.into_iter().zip(results) {
            match fetched {
                Some(f) => {
                    values.insert(name, f);
                }
                None => missing.push(name),
            }
        }

        let stale = values.values().filter(|f| f.origin.is_stale()).count();
        if stale > 0 || !missing.is_empty() {
            warn!(
                stale,
                missing = missing.len(),
                total = values.len() + missing.len(),
                "snapshot contains fallback data"
            );
        }

        Snapshot {
            values,
            missing,
            taken_at: self.cache.now(),
        }
    }

    async fn fetch_upstream(&self, signal: &str) -> Result<f64, FetchError> {
        let source = self
            .sources
            .get(signal)
            .ok_or_else(|| FetchError::NoSource(signal.to_string()))?;

        let value = tokio::time::timeout(self.timeout, source.fetch())
            .await
            .map_err(|_| FetchError::Timeout {
                source_name: source.name().to_string(),
                timeout_secs: self.timeout.as_secs(),
            })??;

        if !value.is_finite() {
            return Err(FetchError::parse(source.name(), format!("non-finite value {value}")));
        }
        Ok(value)
    }

    fn fallback(&self, signal: &str) -> Option<Fetched> {
        if let Some(entry) = self.cache.latest(signal) {
            let age_secs = (self.cache.now() - entry.fetched_at).num_seconds();
            warn!(signal, value = entry.value, age_secs, "serving stale cached value");
            return Some(Fetched::new(entry.value, Origin::StaleCache));
        }
        if let Some(&value) = self.fallbacks.get(signal) {
            warn!(signal, value, "serving static default");
            return Some(Fetched::new(value, Origin::Default));
        }
        warn!(signal, "no value available");
        None
    }
}

impl std::fmt::Debug for SignalFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalFetcher")
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .field("fallbacks", &self.fallbacks)
            .field("timeout", &self.timeout)
            .field("cache", &self.cache)
            .finish()
    }
}
