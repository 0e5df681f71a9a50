use serde::Serialize;

use crate::types::{clamp_confidence, Side, VolRegime};

/// Confidence a winning side starts from before its score is added.
pub const BASE_CONFIDENCE: f64 = 0.45;
pub const TREND_BONUS: f64 = 0.10;
pub const MOMENTUM_BONUS: f64 = 0.05;

const HIGH_VOL_EDGE_RELIEF: i64 = 3;
const HIGH_VOL_EDGE_FLOOR: i64 = 3;

/// Per-side mispricing in cents. Negative means no opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edges {
    pub yes_cost: i64,
    pub no_cost: i64,
    pub yes_edge: i64,
    pub no_edge: i64,
}

impl Edges {
    pub fn from_quotes(fair_yes_cents: i64, best_bid: i64, best_ask: i64) -> Self {
        let yes_cost = best_ask;
        let no_cost = 100 - best_bid;
        Self {
            yes_cost,
            no_cost,
            yes_edge: fair_yes_cents - yes_cost,
            no_edge: (100 - fair_yes_cents) - no_cost,
        }
    }

    pub fn for_side(&self, side: Side) -> i64 {
        match side {
            Side::Yes => self.yes_edge,
            Side::No => self.no_edge,
        }
    }
}

/// High volatility relaxes the edge requirement, never below the floor.
pub fn effective_min_edge(min_edge_cents: i64, regime: VolRegime) -> i64 {
    match regime {
        VolRegime::High => (min_edge_cents - HIGH_VOL_EDGE_RELIEF).max(HIGH_VOL_EDGE_FLOOR),
        VolRegime::Low | VolRegime::Medium => min_edge_cents,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideInputs {
    pub edge: i64,
    pub min_edge: i64,
    pub trend_confirms: bool,
    /// High regime and velocity above the trend-follow threshold.
    pub momentum: bool,
    pub time_factor: f64,
}

/// Score for one side; zero when the edge misses the threshold.
///
/// The momentum bonus only stacks on top of a confirming trend.
pub fn score_side(inputs: SideInputs) -> f64 {
    if inputs.edge < inputs.min_edge {
        return 0.0;
    }

    let mut score = inputs.edge as f64 / 100.0;
    if inputs.trend_confirms {
        score += TREND_BONUS;
        if inputs.momentum {
            score += MOMENTUM_BONUS;
        }
    }
    score * inputs.time_factor
}

pub fn confidence_from_score(score: f64) -> f64 {
    clamp_confidence(BASE_CONFIDENCE + score)
}

/// What a side's confidence would have been on raw edge alone.
pub fn potential_confidence(edge: i64, time_factor: f64) -> f64 {
    if edge <= 0 {
        return 0.0;
    }
    clamp_confidence(BASE_CONFIDENCE + edge as f64 / 100.0 * time_factor)
}

/// Strictly greater positive score wins. Ties and non-positive scores hold.
pub fn arbitrate(yes_score: f64, no_score: f64) -> Option<Side> {
    if yes_score > no_score && yes_score > 0.0 {
        Some(Side::Yes)
    } else if no_score > yes_score && no_score > 0.0 {
        Some(Side::No)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn inputs(edge: i64) -> SideInputs {
        SideInputs {
            edge,
            min_edge: 3,
            trend_confirms: false,
            momentum: false,
            time_factor: 1.0,
        }
    }

    #[test]
    fn test_edges_from_quotes() {
        let edges = Edges::from_quotes(55, 40, 45);
        assert_eq!(edges.yes_cost, 45);
        assert_eq!(edges.no_cost, 60);
        assert_eq!(edges.yes_edge, 10);
        assert_eq!(edges.no_edge, -15);
        assert_eq!(edges.for_side(Side::No), -15);
    }

    #[test]
    fn test_effective_min_edge() {
        assert_eq!(effective_min_edge(8, VolRegime::High), 5);
        assert_eq!(effective_min_edge(4, VolRegime::High), 3);
        assert_eq!(effective_min_edge(1, VolRegime::High), 3);
        assert_eq!(effective_min_edge(8, VolRegime::Medium), 8);
        assert_eq!(effective_min_edge(8, VolRegime::Low), 8);
    }

    #[test]
    fn test_score_below_threshold_is_zero() {
        assert_eq!(score_side(inputs(2)), 0.0);
        assert!((score_side(inputs(3)) - 0.03).abs() < EPS);
    }

    #[test]
    fn test_momentum_bonus_requires_trend() {
        let mut s = inputs(10);
        s.momentum = true;
        assert!((score_side(s) - 0.10).abs() < EPS);

        s.trend_confirms = true;
        assert!((score_side(s) - 0.25).abs() < EPS);

        s.time_factor = 0.5;
        assert!((score_side(s) - 0.125).abs() < EPS);
    }

    #[test]
    fn test_score_monotonic_in_edge() {
        for factor in [0.0, 0.003, 0.5, 1.0, 1.75] {
            for confirms in [false, true] {
                let mut previous = f64::NEG_INFINITY;
                for edge in -20..=60 {
                    let score = score_side(SideInputs {
                        edge,
                        min_edge: 4,
                        trend_confirms: confirms,
                        momentum: confirms,
                        time_factor: factor,
                    });
                    assert!(score >= previous, "edge={edge} factor={factor}");
                    previous = score;
                }
            }
        }
    }

    #[test]
    fn test_potential_confidence() {
        assert_eq!(potential_confidence(0, 1.0), 0.0);
        assert_eq!(potential_confidence(-4, 1.0), 0.0);
        assert!((potential_confidence(10, 0.5) - 0.50).abs() < EPS);
        assert_eq!(potential_confidence(90, 1.75), 0.95);
    }

    #[test]
    fn test_arbitrate() {
        assert_eq!(arbitrate(0.2, 0.1), Some(Side::Yes));
        assert_eq!(arbitrate(0.1, 0.2), Some(Side::No));
        assert_eq!(arbitrate(0.2, 0.2), None);
        assert_eq!(arbitrate(0.0, 0.0), None);
        assert_eq!(arbitrate(0.0, -0.1), None);
    }

    #[test]
    fn test_confidence_from_score_capped() {
        assert!((confidence_from_score(0.1778) - 0.6278).abs() < EPS);
        assert_eq!(confidence_from_score(2.0), 0.95);
    }
}
