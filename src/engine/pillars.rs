// =============================================================================
// Pillar Calculators
// =============================================================================
//
// Each pillar is a weighted blend of normalized sub-signals:
//
//   Macro       50% financial conditions (DXY, 10Y yield, WTI; equal thirds)
//               50% liquidity (M2 growth, risk-decreasing)
//   Sentiment   Fear & Greed, identity
//   Technicals  CBBI, identity
//   Adoption    ETF flows / stablecoin supply growth, 50/50, risk-decreasing
//   Structure   funding rate / open-interest momentum, 50/50
//
// A sub-signal that is absent (or not a finite number) contributes the
// neutral 50 on its own; the rest of the pillar is computed normally.

use serde::Serialize;
use tracing::debug;

use crate::types::{Pillar, RawSignals, NEUTRAL_SCORE};

use super::config::{EngineConfig, PillarWeights};

/// A computed pillar together with the sub-signals that had to be
/// substituted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PillarScore {
    pub score: f64,
    pub substituted: Vec<String>,
}

/// Normalized contribution of one sub-signal, or `None` if it was
/// unavailable.
fn contribution(config: &EngineConfig, raw: &RawSignals, name: &str) -> Option<f64> {
    let value = raw.get(name).copied().filter(|v| v.is_finite())?;
    // Validation guarantees a spec for every weighted signal.
    let spec = config.spec(name)?;

    if value < spec.lower || value > spec.upper {
        debug!(
            signal = name,
            value,
            lower = spec.lower,
            upper = spec.upper,
            "input outside normalization window, clamping"
        );
    }
    Some(spec.normalize(value))
}

fn weighted_pillar(config: &EngineConfig, raw: &RawSignals, weights: &PillarWeights) -> PillarScore {
    let mut score = 0.0;
    let mut substituted = Vec::new();

    for (name, weight) in weights.iter() {
        let value = match contribution(config, raw, name) {
            Some(v) => v,
            None => {
                debug!(signal = name, "signal unavailable, using neutral value");
                substituted.push(name.to_string());
                NEUTRAL_SCORE
            }
        };
        score += weight * value;
    }

    PillarScore { score, substituted }
}

/// Macroeconomic momentum: tightening financial conditions raise risk,
/// growing liquidity lowers it.
pub fn macro_pillar(config: &EngineConfig, raw: &RawSignals) -> PillarScore {
    weighted_pillar(config, raw, &config.pillars.macro_)
}

/// Crowd sentiment: higher greed means higher risk.
pub fn sentiment_pillar(config: &EngineConfig, raw: &RawSignals) -> PillarScore {
    weighted_pillar(config, raw, &config.pillars.sentiment)
}

/// On-chain cycle maturity.
pub fn technicals_pillar(config: &EngineConfig, raw: &RawSignals) -> PillarScore {
    weighted_pillar(config, raw, &config.pillars.technicals)
}

/// Adoption flow: inflows absorb supply and lower risk.
pub fn adoption_pillar(config: &EngineConfig, raw: &RawSignals) -> PillarScore {
    weighted_pillar(config, raw, &config.pillars.adoption)
}

/// Leverage structure: expensive funding and fast OI build-up raise risk.
pub fn structure_pillar(config: &EngineConfig, raw: &RawSignals) -> PillarScore {
    weighted_pillar(config, raw, &config.pillars.structure)
}

pub fn compute_pillar(pillar: Pillar, config: &EngineConfig, raw: &RawSignals) -> PillarScore {
    match pillar {
        Pillar::Macro => macro_pillar(config, raw),
        Pillar::Sentiment => sentiment_pillar(config, raw),
        Pillar::Technicals => technicals_pillar(config, raw),
        Pillar::Adoption => adoption_pillar(config, raw),
        Pillar::Structure => structure_pillar(config, raw),
    }
}
