// =============================================================================
// Service Configuration — engine model plus fetch/cache/serve settings
// =============================================================================
//
// Loaded once at startup from a JSON file.  All fields carry
// `#[serde(default)]` so that a partial (or empty) file still loads.  A
// missing file is replaced by the built-in defaults; a file that exists but
// does not parse aborts startup.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.
//
// The nested `engine` section is validated separately when the engine is
// built; a bad model aborts startup.
// =============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::EngineConfig;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_refresh_interval_secs() -> u64 {
    300
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_futures_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_spot_symbol() -> String {
    "BTCUSDT".to_string()
}

/// Neutral value for every scored signal: the raw input that normalizes to
/// 50 under `engine`.
fn neutral_fallbacks(engine: &EngineConfig) -> BTreeMap<String, f64> {
    engine
        .signals
        .iter()
        .map(|(name, spec)| (name.clone(), spec.midpoint()))
        .collect()
}

// =============================================================================
// ServiceConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    // --- API -----------------------------------------------------------------

    /// Address the JSON API listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    // --- Refresh & cache -----------------------------------------------------

    /// Seconds between background refresh cycles.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// How long a fetched value is served without re-fetching.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Upper bound on any single upstream call.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    // --- Upstream ------------------------------------------------------------

    /// Perpetual used for funding rate and open interest.
    #[serde(default = "default_futures_symbol")]
    pub futures_symbol: String,

    /// Spot pair whose price is shown next to the index.
    #[serde(default = "default_spot_symbol")]
    pub spot_symbol: String,

    /// Static value served when a signal has neither a live nor a cached
    /// value.  Signals left out get the neutral midpoint of their window
    /// under `engine`.
    #[serde(default)]
    pub fallbacks: BTreeMap<String, f64>,

    // --- Model ---------------------------------------------------------------

    #[serde(default)]
    pub engine: EngineConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            bind_addr: default_bind_addr(),
            refresh_interval_secs: default_refresh_interval_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            futures_symbol: default_futures_symbol(),
            spot_symbol: default_spot_symbol(),
            fallbacks: neutral_fallbacks(&engine),
            engine,
        }
    }
}

impl ServiceConfig {
    /// Parse a config document and complete its fallback table against the
    /// engine section it carries.
    pub fn from_json(content: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(content)?;
        config.resolve_fallbacks();
        Ok(config)
    }

    /// Fill in a neutral fallback for every scored signal that lacks one.
    /// Returns the fallback keys that name no scored signal; those are kept
    /// but logged, since they are usually typos.
    pub fn resolve_fallbacks(&mut self) -> Vec<String> {
        for (name, value) in neutral_fallbacks(&self.engine) {
            self.fallbacks.entry(name).or_insert(value);
        }

        let unknown: Vec<String> = self
            .fallbacks
            .keys()
            .filter(|k| !self.engine.signals.contains_key(*k))
            .cloned()
            .collect();
        for key in &unknown {
            warn!(signal = %key, "fallback configured for a signal the model does not score");
        }
        unknown
    }

    /// Load `path`, or create it from the defaults when it does not exist.
    ///
    /// Only absence falls back: a file that cannot be read or parsed is an
    /// error, so a typo in the weight tables stops startup instead of
    /// silently scoring with the built-in model.
    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }

        warn!(path = %path.display(), "config file not found, writing defaults");
        let defaults = Self::default();
        if let Err(e) = defaults.save(path) {
            warn!(error = %e, "failed to write default config");
        }
        Ok(defaults)
    }

    /// Load configuration from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read service config from {}", path.display()))?;

        let config = Self::from_json(&content)
            .with_context(|| format!("failed to parse service config from {}", path.display()))?;

        info!(
            path = %path.display(),
            bind_addr = %config.bind_addr,
            cache_ttl_secs = config.cache_ttl_secs,
            "service config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` using an atomic write (write to
    /// `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise service config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "service config saved (atomic)");
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        // A zero period would make tokio's interval panic.
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}
