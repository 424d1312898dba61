// =============================================================================
// Aggregator — cross-pillar weighted sum
// =============================================================================

use super::config::{CrossPillarWeights, PerPillar};

pub type PillarScores = PerPillar<f64>;

/// Weighted sum of the five pillar scores.
///
/// With non-negative weights summing to 1.0 and pillars inside `[0, 100]`
/// the result stays inside `[0, 100]`, so no clamp is applied here.
pub fn aggregate(pillars: &PillarScores, weights: &CrossPillarWeights) -> f64 {
    pillars
        .iter()
        .map(|(pillar, score)| weights.get(pillar) * score)
        .sum()
}

/// Integer form shown on the gauge.
pub fn display_score(score: f64) -> u32 {
    score.round().clamp(0.0, 100.0) as u32
}
