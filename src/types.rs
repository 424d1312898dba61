// =============================================================================
// Shared types used across the MELT risk engine
// =============================================================================

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One snapshot of raw observations keyed by signal name.
///
/// A key that is absent means "unavailable"; the engine substitutes the
/// neutral value for it rather than failing.
pub type RawSignals = HashMap<String, f64>;

// ── Signal names ─────────────────────────────────────────────────────────────

/// US dollar index, 1-month % change.
pub const DXY_MOM_PCT: &str = "dxy_mom_pct";
/// 10-year Treasury yield, 1-month % change.
pub const YLD_MOM_PCT: &str = "yld_mom_pct";
/// WTI crude, 1-month % change.
pub const WTI_MOM_PCT: &str = "wti_mom_pct";
/// M2 money supply, month-over-month % change.
pub const M2_MOM_PCT: &str = "m2_mom_pct";
/// Crypto Fear & Greed index (0–100).
pub const FGI: &str = "fgi";
/// CBBI cycle-maturity confidence (0–100).
pub const CBBI: &str = "cbbi";
/// Spot ETF net-flow momentum, % change.
pub const ETF_MOM_PCT: &str = "etf_mom_pct";
/// Total stablecoin supply, 30-day % change.
pub const STABLECOIN_MOM_PCT: &str = "stablecoin_mom_pct";
/// Perpetual funding rate in percent per funding interval.
pub const FUNDING_RATE_PCT: &str = "funding_rate_pct";
/// Perpetual open interest, 30-day % change.
pub const OI_MOM_PCT: &str = "oi_mom_pct";

/// BTC spot price in USD. Shown next to the index, never scored.
pub const BTC_PRICE_USD: &str = "btc_price_usd";

/// Value every normalized contribution falls back to when its input is
/// unavailable or unusable.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Whether a larger raw value pushes risk up or down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    RiskIncreasing,
    RiskDecreasing,
}

/// Semantic type of a raw observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    /// Signed momentum figure such as a month-over-month % change.
    PercentChange,
    /// Already bounded to 0–100 by its publisher.
    AbsoluteIndex,
    /// An unbounded level (index value, rate).
    AbsoluteLevel,
}

/// The five weighted pillars that make up the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pillar {
    Macro,
    Sentiment,
    Technicals,
    Adoption,
    Structure,
}

impl Pillar {
    pub const ALL: [Pillar; 5] = [
        Pillar::Macro,
        Pillar::Sentiment,
        Pillar::Technicals,
        Pillar::Adoption,
        Pillar::Structure,
    ];
}

impl std::fmt::Display for Pillar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Macro => write!(f, "Macro"),
            Self::Sentiment => write!(f, "Sentiment"),
            Self::Technicals => write!(f, "Technicals"),
            Self::Adoption => write!(f, "Adoption"),
            Self::Structure => write!(f, "Structure"),
        }
    }
}

/// Discrete strategy label derived from the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionBand {
    #[serde(rename = "Accumulate")]
    Accumulate,
    #[serde(rename = "Hold")]
    Hold,
    #[serde(rename = "Take-Profits / Hedge")]
    TakeProfits,
}

impl ActionBand {
    /// Label shown on the strategy card.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accumulate => "Accumulate",
            Self::Hold => "Hold",
            Self::TakeProfits => "Take-Profits / Hedge",
        }
    }

    /// Accent colour used by the dashboard for this band.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Accumulate => "#00c853",
            Self::Hold => "#ffab00",
            Self::TakeProfits => "#d50000",
        }
    }
}

impl std::fmt::Display for ActionBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_serialises_to_display_label() {
        let json = serde_json::to_string(&ActionBand::TakeProfits).unwrap();
        assert_eq!(json, "\"Take-Profits / Hedge\"");
        let back: ActionBand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ActionBand::TakeProfits);
    }

    #[test]
    fn bands_are_ordered_by_risk() {
        assert!(ActionBand::Accumulate < ActionBand::Hold);
        assert!(ActionBand::Hold < ActionBand::TakeProfits);
    }

    #[test]
    fn direction_defaults_to_risk_increasing() {
        assert_eq!(Direction::default(), Direction::RiskIncreasing);
    }

    #[test]
    fn pillar_serialises_snake_case() {
        assert_eq!(serde_json::to_string(&Pillar::Technicals).unwrap(), "\"technicals\"");
    }
}
