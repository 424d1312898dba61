// =============================================================================
// Scoring Engine
// =============================================================================
//
// raw signals → normalizer → pillars → aggregator → classifier → ScoreResult
//
// The engine is a pure function of its (validated) configuration and one
// snapshot of raw signals.  It holds no mutable state and does no I/O, so a
// single instance can be shared freely between tasks.

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod normalizer;
pub mod pillars;

pub use aggregator::{aggregate, display_score, PillarScores};
pub use classifier::classify;
pub use config::{EngineConfig, PerPillar};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ConfigError;
use crate::types::{ActionBand, RawSignals};

// =============================================================================
// Output types
// =============================================================================

/// Outcome of one scoring run. Built fresh each time and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    /// Unrounded final score in `[0, 100]`.
    pub final_score: f64,
    pub pillars: PillarScores,
    pub band: ActionBand,
    /// Sub-signals that were unavailable and scored as neutral.
    pub substituted: Vec<String>,
}

/// Flat record handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub final_score: u32,
    pub band: ActionBand,
    pub pillars: PerPillar<u32>,
}

impl ScoreResult {
    pub fn display_score(&self) -> u32 {
        display_score(self.final_score)
    }

    pub fn to_record(&self) -> ScoreRecord {
        ScoreRecord {
            final_score: self.display_score(),
            band: self.band,
            pillars: self.pillars.map(|s| display_score(*s)),
        }
    }
}

// =============================================================================
// RiskEngine
// =============================================================================

#[derive(Debug, Clone)]
pub struct RiskEngine {
    config: EngineConfig,
}

impl RiskEngine {
    /// Build an engine, rejecting any configuration whose weights, bounds or
    /// thresholds are inconsistent.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Score one snapshot. Never fails: missing inputs are neutral and
    /// out-of-range inputs saturate.
    pub fn score(&self, raw: &RawSignals) -> ScoreResult {
        let mut substituted = Vec::new();
        let pillars = PerPillar::from_fn(|pillar| {
            let p = pillars::compute_pillar(pillar, &self.config, raw);
            substituted.extend(p.substituted);
            p.score
        });

        let final_score = aggregate(&pillars, &self.config.cross_weights);
        let band = classify(final_score, &self.config.thresholds);

        debug!(
            final_score = format!("{:.2}", final_score),
            band = %band,
            substituted = substituted.len(),
            "risk score computed"
        );

        ScoreResult {
            final_score,
            pillars,
            band,
            substituted,
        }
    }
}

impl Default for RiskEngine {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    const EPS: f64 = 1e-9;

    fn signals(pairs: &[(&str, f64)]) -> RawSignals {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn golden_snapshot() {
        let engine = RiskEngine::default();
        let raw = signals(&[
            (DXY_MOM_PCT, -1.45),
            (WTI_MOM_PCT, 8.22),
            (YLD_MOM_PCT, 0.17),
            (M2_MOM_PCT, 1.5),
            (FGI, 29.0),
            (CBBI, 50.0),
            (ETF_MOM_PCT, 0.0),
            (FUNDING_RATE_PCT, 0.01),
        ]);
        let r = engine.score(&raw);

        // macro 24.875, sentiment 29, technicals 50, adoption 50, structure 30
        assert!((r.pillars.macro_ - 24.875).abs() < EPS);
        assert!((r.pillars.sentiment - 29.0).abs() < EPS);
        assert!((r.pillars.technicals - 50.0).abs() < EPS);
        assert!((r.pillars.adoption - 50.0).abs() < EPS);
        assert!((r.pillars.structure - 30.0).abs() < EPS);
        assert!((r.final_score - 33.75).abs() < EPS, "got {}", r.final_score);
        assert_eq!(r.display_score(), 34);
        assert_eq!(r.band, ActionBand::Accumulate);

        let mut missing = r.substituted.clone();
        missing.sort();
        assert_eq!(missing, vec![OI_MOM_PCT, STABLECOIN_MOM_PCT]);
    }

    #[test]
    fn neutral_snapshot_scores_fifty() {
        let engine = RiskEngine::default();
        let cfg = engine.config();
        let raw: RawSignals = cfg
            .signals
            .iter()
            .map(|(name, spec)| (name.clone(), spec.midpoint()))
            .collect();
        assert_eq!(raw[FGI], 50.0);
        assert_eq!(raw[DXY_MOM_PCT], 0.0);

        let r = engine.score(&raw);
        assert!((r.final_score - 50.0).abs() < EPS, "got {}", r.final_score);
        assert_eq!(r.display_score(), 50);
        assert_eq!(r.band, ActionBand::Hold);
        assert!(r.substituted.is_empty());
    }

    #[test]
    fn saturated_snapshot_scores_hundred() {
        let engine = RiskEngine::default();
        let raw: RawSignals = engine
            .config()
            .signals
            .iter()
            .map(|(name, spec)| (name.clone(), spec.worst_case()))
            .collect();

        let r = engine.score(&raw);
        assert!((r.final_score - 100.0).abs() < EPS, "got {}", r.final_score);
        assert_eq!(r.display_score(), 100);
        assert_eq!(r.band, ActionBand::TakeProfits);
    }

    #[test]
    fn empty_snapshot_is_fully_neutral() {
        let engine = RiskEngine::default();
        let r = engine.score(&RawSignals::new());
        assert!((r.final_score - 50.0).abs() < EPS);
        assert_eq!(r.substituted.len(), 10);
    }

    #[test]
    fn scoring_is_repeatable() {
        let engine = RiskEngine::default();
        let raw = signals(&[(FGI, 80.0), (CBBI, 71.0), (DXY_MOM_PCT, 3.0)]);
        assert_eq!(engine.score(&raw), engine.score(&raw));
    }

    #[test]
    fn misconfigured_engine_fails_to_build() {
        let mut cfg = EngineConfig::default();
        cfg.cross_weights.macro_ = 0.5;
        assert!(RiskEngine::new(cfg).is_err());
    }

    #[test]
    fn record_is_flat_and_rounded() {
        let engine = RiskEngine::default();
        let raw = signals(&[(FGI, 29.0), (FUNDING_RATE_PCT, 0.01)]);
        let record = engine.score(&raw).to_record();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["pillars"]["sentiment"], 29);
        assert_eq!(json["pillars"]["structure"], 30);
        assert!(json["final_score"].is_u64());
        assert!(json["band"].is_string());
    }
}
