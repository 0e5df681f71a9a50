//! Asymmetric time-decay weighting.
//!
//! As expiry approaches, the side the underlying currently favors gets boosted
//! while the other side is suppressed. How hard depends on how many expected
//! moves separate the underlying from the strike.

use serde::Serialize;

use crate::types::Side;

/// One full contract window.
pub const CONTRACT_WINDOW_SECS: f64 = 900.0;

const MIN_OBSERVED_VOL: f64 = 50.0;
const FALLBACK_VOL: f64 = 200.0;
const MIN_EXPECTED_MOVE: f64 = 50.0;
const MAX_DISTANCE_RATIO: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceBand {
    /// More than 1.5 expected moves away.
    NearCertain,
    /// Between 1.0 and 1.5 expected moves away.
    Likely,
    Ambiguous,
}

impl DistanceBand {
    pub fn classify(distance_ratio: f64) -> Self {
        if distance_ratio > 1.5 {
            DistanceBand::NearCertain
        } else if distance_ratio > 1.0 {
            DistanceBand::Likely
        } else {
            DistanceBand::Ambiguous
        }
    }

    /// `(winning_boost, losing_factor)` for a given raw time factor.
    pub fn factors(self, raw_time_factor: f64) -> (f64, f64) {
        let elapsed = 1.0 - raw_time_factor;
        match self {
            DistanceBand::NearCertain => (1.0 + elapsed * 0.75, raw_time_factor * 0.3),
            DistanceBand::Likely => (1.0 + elapsed * 0.4, raw_time_factor * 0.6),
            DistanceBand::Ambiguous => (raw_time_factor, raw_time_factor),
        }
    }
}

/// Sparse data produces tiny or missing magnitudes; those get a fixed floor.
pub fn effective_vol(vol_dollar_per_min: f64) -> f64 {
    if vol_dollar_per_min.is_finite() && vol_dollar_per_min >= MIN_OBSERVED_VOL {
        vol_dollar_per_min
    } else {
        FALLBACK_VOL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeDecay {
    pub raw_time_factor: f64,
    pub expected_move: f64,
    pub distance_ratio: f64,
    pub band: DistanceBand,
    pub yes_factor: f64,
    pub no_factor: f64,
}

impl TimeDecay {
    pub fn compute(seconds_left: f64, vol_dollar_per_min: f64, btc_vs_strike: f64) -> Self {
        let seconds_left = if seconds_left.is_finite() { seconds_left } else { 0.0 };
        let raw_time_factor = (seconds_left / CONTRACT_WINDOW_SECS).clamp(0.0, 1.0);

        let expected_move = effective_vol(vol_dollar_per_min) * (seconds_left.max(1.0) / 60.0).sqrt();
        let ratio = btc_vs_strike.abs() / expected_move.max(MIN_EXPECTED_MOVE);
        let distance_ratio = if ratio.is_nan() {
            0.0
        } else {
            ratio.clamp(0.0, MAX_DISTANCE_RATIO)
        };

        let band = DistanceBand::classify(distance_ratio);
        let (winning, losing) = band.factors(raw_time_factor);
        let (yes_factor, no_factor) = if btc_vs_strike > 0.0 {
            (winning, losing)
        } else {
            (losing, winning)
        };

        Self {
            raw_time_factor,
            expected_move,
            distance_ratio,
            band,
            yes_factor,
            no_factor,
        }
    }

    pub fn factor_for(&self, side: Side) -> f64 {
        match side {
            Side::Yes => self.yes_factor,
            Side::No => self.no_factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_directional_consistency() {
        let seconds = [0.0, 1.0, 10.0, 60.0, 300.0, 800.0, 900.0, 2_000.0];
        let distances = [0.5, 10.0, 60.0, 120.0, 250.0, 900.0, 5_000.0, 1e9];
        let vols = [0.0, 49.9, 80.0, 250.0, 900.0];

        for &secs in &seconds {
            for &dist in &distances {
                for &vol in &vols {
                    let above = TimeDecay::compute(secs, vol, dist);
                    assert!(
                        above.yes_factor >= above.no_factor,
                        "secs={secs} dist={dist} vol={vol}: {above:?}"
                    );

                    let below = TimeDecay::compute(secs, vol, -dist);
                    assert!(
                        below.no_factor >= below.yes_factor,
                        "secs={secs} dist=-{dist} vol={vol}: {below:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_distance_ratio_is_clamped() {
        let far = TimeDecay::compute(30.0, 250.0, 1e12);
        assert_eq!(far.distance_ratio, MAX_DISTANCE_RATIO);

        let inf = TimeDecay::compute(30.0, 250.0, f64::INFINITY);
        assert_eq!(inf.distance_ratio, MAX_DISTANCE_RATIO);

        let nan = TimeDecay::compute(30.0, 250.0, f64::NAN);
        assert_eq!(nan.distance_ratio, 0.0);
        assert_eq!(nan.band, DistanceBand::Ambiguous);
    }

    #[test]
    fn test_low_vol_uses_floor() {
        // 10/min observed is replaced by 200/min: one minute left, 200 expected.
        let decay = TimeDecay::compute(60.0, 10.0, 100.0);
        assert!((decay.expected_move - 200.0).abs() < EPS);
        assert!((decay.distance_ratio - 0.5).abs() < EPS);

        let exact = TimeDecay::compute(60.0, 50.0, 100.0);
        assert!((exact.expected_move - 50.0).abs() < EPS);
    }

    #[test]
    fn test_expected_move_floor_in_ratio() {
        // Expected move below 50 is treated as 50.
        let decay = TimeDecay::compute(0.0, 60.0, 100.0);
        assert!((decay.expected_move - 60.0 * (1.0f64 / 60.0).sqrt()).abs() < EPS);
        assert!((decay.distance_ratio - 2.0).abs() < EPS);
        assert_eq!(decay.band, DistanceBand::NearCertain);
    }

    #[test]
    fn test_near_expiry_far_from_strike() {
        let decay = TimeDecay::compute(10.0, 250.0, 900.0);
        assert_eq!(decay.band, DistanceBand::NearCertain);

        let raw = 10.0 / CONTRACT_WINDOW_SECS;
        assert!((decay.yes_factor - (1.0 + (1.0 - raw) * 0.75)).abs() < EPS);
        assert!((decay.no_factor - raw * 0.3).abs() < EPS);
        assert!(decay.yes_factor > 1.74);
        assert!(decay.no_factor < 0.004);
    }

    #[test]
    fn test_likely_band() {
        // 60s left at 100/min: expected move 100, distance 120 => ratio 1.2.
        let decay = TimeDecay::compute(60.0, 100.0, -120.0);
        assert_eq!(decay.band, DistanceBand::Likely);

        let raw = 60.0 / CONTRACT_WINDOW_SECS;
        assert!((decay.no_factor - (1.0 + (1.0 - raw) * 0.4)).abs() < EPS);
        assert!((decay.yes_factor - raw * 0.6).abs() < EPS);
    }

    #[test]
    fn test_ambiguous_band_is_symmetric() {
        let decay = TimeDecay::compute(450.0, 250.0, 30.0);
        assert_eq!(decay.band, DistanceBand::Ambiguous);
        assert!((decay.yes_factor - 0.5).abs() < EPS);
        assert_eq!(decay.yes_factor, decay.no_factor);
    }

    #[test]
    fn test_raw_time_factor_clamped() {
        assert_eq!(TimeDecay::compute(5_000.0, 250.0, 0.0).raw_time_factor, 1.0);
        assert_eq!(TimeDecay::compute(-30.0, 250.0, 0.0).raw_time_factor, 0.0);
        assert_eq!(TimeDecay::compute(f64::NAN, 250.0, 0.0).raw_time_factor, 0.0);
    }
}
