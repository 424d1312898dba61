// =============================================================================
// Engine Configuration — bounds, weights and band thresholds
// =============================================================================
//
// Everything that shapes a score lives in one immutable `EngineConfig` value.
// It is validated exactly once, when the engine is built; a config that gets
// past `validate()` can never make scoring fail.
//
// Bound choices (all symmetric windows are in percent):
//
//   dxy_mom_pct          ±2.5   RiskIncreasing   strong dollar tightens
//   yld_mom_pct          ±10    RiskIncreasing   rising long rates tighten
//   wti_mom_pct          ±15    RiskIncreasing   energy shock tightens
//   m2_mom_pct           ±1.5   RiskDecreasing   liquidity growth eases
//   etf_mom_pct          ±5     RiskDecreasing   inflows absorb supply
//   stablecoin_mom_pct   ±5     RiskDecreasing   dry powder absorbs supply
//   oi_mom_pct           ±20    RiskIncreasing   leverage build-up
//   funding_rate_pct     [0, 0.1]  RiskIncreasing
//   fgi, cbbi            identity [0, 100]
// =============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::types::{
    ActionBand, Direction, Pillar, SignalKind, CBBI, DXY_MOM_PCT, ETF_MOM_PCT, FGI,
    FUNDING_RATE_PCT, M2_MOM_PCT, OI_MOM_PCT, STABLECOIN_MOM_PCT, WTI_MOM_PCT, YLD_MOM_PCT,
};

use super::normalizer;

// =============================================================================
// Named constants
// =============================================================================

/// Scores at or above this fall into the Hold band.
pub const HOLD_FROM: f64 = 35.0;
/// Scores at or above this fall into the Take-Profits / Hedge band.
pub const TAKE_PROFITS_FROM: f64 = 70.0;

pub const DXY_BAND_PCT: f64 = 2.5;
pub const YLD_BAND_PCT: f64 = 10.0;
pub const WTI_BAND_PCT: f64 = 15.0;
pub const M2_BAND_PCT: f64 = 1.5;
pub const ETF_BAND_PCT: f64 = 5.0;
pub const STABLECOIN_BAND_PCT: f64 = 5.0;
pub const OI_BAND_PCT: f64 = 20.0;
/// Funding above this (percent per interval) saturates the structure pillar.
pub const FUNDING_RATE_CAP_PCT: f64 = 0.1;

/// Share of the macro pillar given to financial conditions; the rest is
/// liquidity.
pub const FINANCIAL_CONDITIONS_SHARE: f64 = 0.5;

/// Allowed drift of a weight sum away from exactly 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

// =============================================================================
// NormalizationSpec
// =============================================================================

/// How one raw signal is mapped onto the 0–100 risk scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationSpec {
    pub kind: SignalKind,
    pub lower: f64,
    pub upper: f64,
    #[serde(default)]
    pub direction: Direction,
}

impl NormalizationSpec {
    /// Pass-through for indices already published on a 0–100 scale.
    pub fn identity() -> Self {
        Self {
            kind: SignalKind::AbsoluteIndex,
            lower: 0.0,
            upper: 100.0,
            direction: Direction::RiskIncreasing,
        }
    }

    /// Symmetric `[-k, +k]` window for percent changes; 0 % maps to 50.
    pub fn bipolar(k: f64, direction: Direction) -> Self {
        Self {
            kind: SignalKind::PercentChange,
            lower: -k,
            upper: k,
            direction,
        }
    }

    /// Plain `[lower, upper]` window for absolute levels.
    pub fn unipolar(lower: f64, upper: f64, direction: Direction) -> Self {
        Self {
            kind: SignalKind::AbsoluteLevel,
            lower,
            upper,
            direction,
        }
    }

    pub fn normalize(&self, value: f64) -> f64 {
        normalizer::normalize(value, self.lower, self.upper, self.direction)
    }

    /// Raw value that maps to the neutral score of 50.
    pub fn midpoint(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }

    /// Raw value that maps to a risk contribution of 100.
    pub fn worst_case(&self) -> f64 {
        match self.direction {
            Direction::RiskIncreasing => self.upper,
            Direction::RiskDecreasing => self.lower,
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let invalid = |reason: &'static str| ConfigError::InvalidBounds {
            name: name.to_string(),
            lower: self.lower,
            upper: self.upper,
            reason,
        };

        if !self.lower.is_finite() || !self.upper.is_finite() {
            return Err(invalid("bounds must be finite"));
        }
        if self.lower >= self.upper {
            return Err(invalid("lower bound must be below upper bound"));
        }
        if !(self.upper - self.lower).is_finite() {
            return Err(invalid("window width overflows"));
        }
        match self.kind {
            SignalKind::PercentChange if self.lower != -self.upper => {
                Err(invalid("percent-change window must be symmetric around 0"))
            }
            SignalKind::AbsoluteIndex
                if self.lower != 0.0
                    || self.upper != 100.0
                    || self.direction != Direction::RiskIncreasing =>
            {
                Err(invalid("absolute indices use the identity mapping"))
            }
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Per-pillar table
// =============================================================================

/// One value per pillar. Used for weights, sub-signal tables and scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerPillar<T> {
    #[serde(rename = "macro")]
    pub macro_: T,
    pub sentiment: T,
    pub technicals: T,
    pub adoption: T,
    pub structure: T,
}

impl<T> PerPillar<T> {
    pub fn get(&self, pillar: Pillar) -> &T {
        match pillar {
            Pillar::Macro => &self.macro_,
            Pillar::Sentiment => &self.sentiment,
            Pillar::Technicals => &self.technicals,
            Pillar::Adoption => &self.adoption,
            Pillar::Structure => &self.structure,
        }
    }

    pub fn from_fn(mut f: impl FnMut(Pillar) -> T) -> Self {
        Self {
            macro_: f(Pillar::Macro),
            sentiment: f(Pillar::Sentiment),
            technicals: f(Pillar::Technicals),
            adoption: f(Pillar::Adoption),
            structure: f(Pillar::Structure),
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> PerPillar<U> {
        PerPillar::from_fn(|p| f(self.get(p)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Pillar, &T)> {
        Pillar::ALL.into_iter().map(move |p| (p, self.get(p)))
    }
}

/// Intra-pillar weights: sub-signal name to weight, summing to 1.0.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PillarWeights(pub BTreeMap<String, f64>);

impl PillarWeights {
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(name, w)| (name.to_string(), w))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }
}

pub type CrossPillarWeights = PerPillar<f64>;

impl CrossPillarWeights {
    pub fn standard() -> Self {
        Self {
            macro_: 0.40,
            sentiment: 0.20,
            technicals: 0.20,
            adoption: 0.10,
            structure: 0.10,
        }
    }

    pub fn sum(&self) -> f64 {
        self.iter().map(|(_, w)| *w).sum()
    }
}

// =============================================================================
// BandThresholds
// =============================================================================

/// Cut points between the three action bands. Intervals are closed-open, so a
/// score sitting exactly on a cut point belongs to the upper band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandThresholds {
    pub hold_from: f64,
    pub take_profits_from: f64,
}

impl Default for BandThresholds {
    fn default() -> Self {
        Self {
            hold_from: HOLD_FROM,
            take_profits_from: TAKE_PROFITS_FROM,
        }
    }
}

impl BandThresholds {
    pub fn classify(&self, score: f64) -> ActionBand {
        if score < self.hold_from {
            ActionBand::Accumulate
        } else if score < self.take_profits_from {
            ActionBand::Hold
        } else {
            ActionBand::TakeProfits
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let ok = self.hold_from.is_finite()
            && self.take_profits_from.is_finite()
            && 0.0 <= self.hold_from
            && self.hold_from < self.take_profits_from
            && self.take_profits_from <= 100.0;
        if ok {
            Ok(())
        } else {
            Err(ConfigError::InvalidThresholds {
                hold_from: self.hold_from,
                take_profits_from: self.take_profits_from,
            })
        }
    }
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Immutable description of the whole scoring model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Normalization bounds per raw signal.
    pub signals: BTreeMap<String, NormalizationSpec>,

    /// Sub-signal weights inside each pillar.
    pub pillars: PerPillar<PillarWeights>,

    /// Weight of each pillar in the final score.
    pub cross_weights: CrossPillarWeights,

    #[serde(default)]
    pub thresholds: BandThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let signals = [
            (DXY_MOM_PCT, NormalizationSpec::bipolar(DXY_BAND_PCT, Direction::RiskIncreasing)),
            (YLD_MOM_PCT, NormalizationSpec::bipolar(YLD_BAND_PCT, Direction::RiskIncreasing)),
            (WTI_MOM_PCT, NormalizationSpec::bipolar(WTI_BAND_PCT, Direction::RiskIncreasing)),
            (M2_MOM_PCT, NormalizationSpec::bipolar(M2_BAND_PCT, Direction::RiskDecreasing)),
            (FGI, NormalizationSpec::identity()),
            (CBBI, NormalizationSpec::identity()),
            (ETF_MOM_PCT, NormalizationSpec::bipolar(ETF_BAND_PCT, Direction::RiskDecreasing)),
            (
                STABLECOIN_MOM_PCT,
                NormalizationSpec::bipolar(STABLECOIN_BAND_PCT, Direction::RiskDecreasing),
            ),
            (
                FUNDING_RATE_PCT,
                NormalizationSpec::unipolar(0.0, FUNDING_RATE_CAP_PCT, Direction::RiskIncreasing),
            ),
            (OI_MOM_PCT, NormalizationSpec::bipolar(OI_BAND_PCT, Direction::RiskIncreasing)),
        ]
        .into_iter()
        .map(|(name, spec)| (name.to_string(), spec))
        .collect();

        let fc_each = FINANCIAL_CONDITIONS_SHARE / 3.0;
        let pillars = PerPillar {
            macro_: PillarWeights::new([
                (DXY_MOM_PCT, fc_each),
                (YLD_MOM_PCT, fc_each),
                (WTI_MOM_PCT, fc_each),
                (M2_MOM_PCT, 1.0 - FINANCIAL_CONDITIONS_SHARE),
            ]),
            sentiment: PillarWeights::new([(FGI, 1.0)]),
            technicals: PillarWeights::new([(CBBI, 1.0)]),
            adoption: PillarWeights::new([(ETF_MOM_PCT, 0.5), (STABLECOIN_MOM_PCT, 0.5)]),
            structure: PillarWeights::new([(FUNDING_RATE_PCT, 0.5), (OI_MOM_PCT, 0.5)]),
        };

        Self {
            signals,
            pillars,
            cross_weights: CrossPillarWeights::standard(),
            thresholds: BandThresholds::default(),
        }
    }
}

fn check_weight(name: &str, weight: f64) -> Result<(), ConfigError> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidWeight {
            name: name.to_string(),
            weight,
        })
    }
}

fn sums_to_one(sum: f64) -> bool {
    (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
}

impl EngineConfig {
    /// Check every invariant the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, spec) in &self.signals {
            spec.validate(name)?;
        }

        for (pillar, weights) in self.pillars.iter() {
            if weights.0.is_empty() {
                return Err(ConfigError::EmptyPillar { pillar });
            }
            for (name, w) in weights.iter() {
                check_weight(name, w)?;
                if !self.signals.contains_key(name) {
                    return Err(ConfigError::UnknownSignal {
                        name: name.to_string(),
                    });
                }
            }
            let sum = weights.sum();
            if !sums_to_one(sum) {
                return Err(ConfigError::MisconfiguredPillarWeights { pillar, sum });
            }
        }

        for (pillar, w) in self.cross_weights.iter() {
            check_weight(&pillar.to_string(), *w)?;
        }
        let sum = self.cross_weights.sum();
        if !sums_to_one(sum) {
            return Err(ConfigError::MisconfiguredCrossWeights { sum });
        }

        self.thresholds.validate()
    }

    pub fn spec(&self, name: &str) -> Option<&NormalizationSpec> {
        self.signals.get(name)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.signals.len(), 10);
        assert!((cfg.cross_weights.macro_ - 0.40).abs() < f64::EPSILON);
        assert!((cfg.thresholds.hold_from - 35.0).abs() < f64::EPSILON);
        assert!((cfg.thresholds.take_profits_from - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn pillar_weights_not_summing_to_one_are_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.pillars.adoption = PillarWeights::new([(ETF_MOM_PCT, 0.5), (STABLECOIN_MOM_PCT, 0.4)]);
        match cfg.validate() {
            Err(ConfigError::MisconfiguredPillarWeights { pillar, sum }) => {
                assert_eq!(pillar, Pillar::Adoption);
                assert!((sum - 0.9).abs() < 1e-9);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn cross_weights_not_summing_to_one_are_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.cross_weights.structure = 0.2;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MisconfiguredCrossWeights { .. })
        ));
    }

    #[test]
    fn negative_weight_is_rejected_even_if_sum_is_one() {
        let mut cfg = EngineConfig::default();
        cfg.pillars.structure = PillarWeights::new([(FUNDING_RATE_PCT, 1.5), (OI_MOM_PCT, -0.5)]);
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidWeight { .. })));
    }

    #[test]
    fn weighted_signal_without_bounds_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.signals.remove(OI_MOM_PCT);
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::UnknownSignal {
                name: OI_MOM_PCT.to_string()
            })
        );
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.signals.insert(
            FUNDING_RATE_PCT.to_string(),
            NormalizationSpec::unipolar(0.1, 0.0, Direction::RiskIncreasing),
        );
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidBounds { .. })));
    }

    #[test]
    fn overflowing_window_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.signals.insert(
            DXY_MOM_PCT.to_string(),
            NormalizationSpec::bipolar(f64::MAX, Direction::RiskIncreasing),
        );
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidBounds { .. })));
    }

    #[test]
    fn asymmetric_percent_change_window_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.signals.insert(
            DXY_MOM_PCT.to_string(),
            NormalizationSpec {
                kind: SignalKind::PercentChange,
                lower: -2.0,
                upper: 3.0,
                direction: Direction::RiskIncreasing,
            },
        );
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidBounds { .. })));
    }

    #[test]
    fn overlapping_thresholds_are_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.thresholds = BandThresholds {
            hold_from: 70.0,
            take_profits_from: 70.0,
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidThresholds { .. })));
    }

    #[test]
    fn config_roundtrips_through_json() {
        let cfg = EngineConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"macro\""));
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.signals, back.signals);
        assert_eq!(cfg.cross_weights, back.cross_weights);
        assert_eq!(cfg.thresholds, back.thresholds);
        for (pillar, weights) in back.pillars.iter() {
            assert!((weights.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE, "{pillar}");
        }
        assert!(back.validate().is_ok());
    }

    #[test]
    fn worst_case_follows_direction() {
        let inc = NormalizationSpec::bipolar(2.5, Direction::RiskIncreasing);
        let dec = NormalizationSpec::bipolar(2.5, Direction::RiskDecreasing);
        assert_eq!(inc.worst_case(), 2.5);
        assert_eq!(dec.worst_case(), -2.5);
        assert_eq!(inc.midpoint(), 0.0);
    }
}
