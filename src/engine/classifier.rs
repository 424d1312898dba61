// =============================================================================
// Classifier — final score to action band
// =============================================================================
//
//   [0, hold_from)                  Accumulate
//   [hold_from, take_profits_from)  Hold
//   [take_profits_from, 100]        Take-Profits / Hedge
//
// Classification always runs on the unrounded score; rounding is for display
// only, so a 69.6 stays in Hold even though the gauge reads 70.

use crate::types::ActionBand;

use super::config::BandThresholds;

pub fn classify(score: f64, thresholds: &BandThresholds) -> ActionBand {
    thresholds.classify(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn boundaries_belong_to_upper_band() {
        let t = BandThresholds::default();
        assert_eq!(classify(34.999, &t), ActionBand::Accumulate);
        assert_eq!(classify(35.0, &t), ActionBand::Hold);
        assert_eq!(classify(69.999, &t), ActionBand::Hold);
        assert_eq!(classify(70.0, &t), ActionBand::TakeProfits);
    }

    #[test]
    fn extremes() {
        let t = BandThresholds::default();
        assert_eq!(classify(0.0, &t), ActionBand::Accumulate);
        assert_eq!(classify(100.0, &t), ActionBand::TakeProfits);
    }

    #[test]
    fn custom_cut_points_are_honoured() {
        let t = BandThresholds {
            hold_from: 30.0,
            take_profits_from: 80.0,
        };
        assert_eq!(classify(32.0, &t), ActionBand::Hold);
        assert_eq!(classify(75.0, &t), ActionBand::Hold);
        assert_eq!(classify(80.0, &t), ActionBand::TakeProfits);
    }

    #[test]
    fn classification_uses_unrounded_score() {
        let t = BandThresholds::default();
        assert_eq!(classify(69.6, &t), ActionBand::Hold);
    }

    proptest! {
        #[test]
        fn bands_partition_the_scale(score in 0.0..=100.0f64) {
            let t = BandThresholds::default();
            let band = classify(score, &t);
            let in_accumulate = score < t.hold_from;
            let in_hold = score >= t.hold_from && score < t.take_profits_from;
            let in_take = score >= t.take_profits_from;
            prop_assert_eq!(
                [in_accumulate, in_hold, in_take].iter().filter(|b| **b).count(),
                1
            );
            match band {
                ActionBand::Accumulate => prop_assert!(in_accumulate),
                ActionBand::Hold => prop_assert!(in_hold),
                ActionBand::TakeProfits => prop_assert!(in_take),
            }
        }

        #[test]
        fn band_is_monotonic(a in 0.0..=100.0f64, b in 0.0..=100.0f64) {
            let t = BandThresholds::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(classify(lo, &t) <= classify(hi, &t));
        }
    }
}
