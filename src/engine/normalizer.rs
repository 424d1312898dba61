// =============================================================================
// Normalizer — raw scalar to 0–100 risk contribution
// =============================================================================
//
// Values outside the window saturate at 0 or 100 so a single extreme move can
// never push a pillar out of range.  Unusable input (NaN, infinities, an
// empty window) degrades to the neutral 50 instead of failing.

use crate::types::{Direction, NEUTRAL_SCORE};

/// Linearly rescale `value` from `[lower, upper]` onto `[0, 100]`.
///
/// The value is clamped to the window first. `RiskDecreasing` flips the
/// result so that a larger raw value means less risk.
pub fn normalize(value: f64, lower: f64, upper: f64, direction: Direction) -> f64 {
    let width = upper - lower;
    if !value.is_finite() || !lower.is_finite() || !upper.is_finite() {
        return NEUTRAL_SCORE;
    }
    // A window wider than f64::MAX overflows to infinity.
    if !width.is_finite() || width <= 0.0 {
        return NEUTRAL_SCORE;
    }

    let clamped = value.clamp(lower, upper);
    let scaled = ((clamped - lower) / width * 100.0).clamp(0.0, 100.0);
    if !scaled.is_finite() {
        return NEUTRAL_SCORE;
    }

    match direction {
        Direction::RiskIncreasing => scaled,
        Direction::RiskDecreasing => 100.0 - scaled,
    }
}
