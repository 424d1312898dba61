// =============================================================================
// Error types for the engine configuration and the fetch boundary
// =============================================================================
//
// Only two things can fail loudly:
//   - a misconfigured engine (caught once, before any scoring happens);
//   - an individual upstream fetch (caught at the boundary and replaced by a
//     cached or default value).
//
// Missing and out-of-range inputs are not errors at all: the engine absorbs
// them by substitution and clamping.

use thiserror::Error;

use crate::types::Pillar;

/// Startup-time configuration errors. Any of these aborts the service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{pillar} pillar weights sum to {sum:.6}, expected 1.0")]
    MisconfiguredPillarWeights { pillar: Pillar, sum: f64 },

    #[error("cross-pillar weights sum to {sum:.6}, expected 1.0")]
    MisconfiguredCrossWeights { sum: f64 },

    #[error("weight for '{name}' is negative or not finite: {weight}")]
    InvalidWeight { name: String, weight: f64 },

    #[error("{pillar} pillar has no sub-signals")]
    EmptyPillar { pillar: Pillar },

    #[error("signal '{name}' has no normalization bounds configured")]
    UnknownSignal { name: String },

    #[error("signal '{name}' has invalid bounds [{lower}, {upper}]: {reason}")]
    InvalidBounds {
        name: String,
        lower: f64,
        upper: f64,
        reason: &'static str,
    },

    #[error("band thresholds must satisfy 0 <= hold_from < take_profits_from <= 100, got {hold_from}/{take_profits_from}")]
    InvalidThresholds { hold_from: f64, take_profits_from: f64 },
}

/// Failure of a single upstream fetch.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {source_name} failed: {error}")]
    Http {
        source_name: String,
        #[source]
        error: reqwest::Error,
    },

    #[error("{source_name} returned HTTP {status}")]
    Status { source_name: String, status: u16 },

    #[error("{source_name} did not respond within {timeout_secs}s")]
    Timeout { source_name: String, timeout_secs: u64 },

    #[error("{source_name} response could not be parsed: {reason}")]
    Parse { source_name: String, reason: String },

    #[error("no source registered for signal '{0}'")]
    NoSource(String),
}

impl FetchError {
    pub fn parse(source_name: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }
}
