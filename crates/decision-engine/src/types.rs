use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ceiling for every confidence the engine emits.
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Clamp into `[0, MAX_CONFIDENCE]`. NaN collapses to zero.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, MAX_CONFIDENCE)
}

/// Order book and contract terms for one polling cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub ticker: String,
    #[serde(default)]
    pub strike_price: Option<f64>,
    #[serde(default)]
    pub seconds_to_close: f64,
    #[serde(default)]
    pub best_bid: i64,
    #[serde(default = "default_best_ask")]
    pub best_ask: i64,
}

fn default_best_ask() -> i64 {
    100
}

impl MarketSnapshot {
    /// Strike usable for pricing, if present, finite and positive.
    pub fn valid_strike(&self) -> Option<f64> {
        self.strike_price
            .filter(|strike| strike.is_finite() && *strike > 0.0)
    }

    /// `(best_bid, best_ask)` when both are real cent prices.
    pub fn valid_quotes(&self) -> Option<(i64, i64)> {
        let in_range = |cents: i64| (0..=100).contains(&cents);
        (in_range(self.best_bid) && in_range(self.best_ask)).then_some((self.best_bid, self.best_ask))
    }

    pub fn seconds_left(&self) -> f64 {
        if self.seconds_to_close.is_finite() {
            self.seconds_to_close
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Side::Yes => "YES",
            Side::No => "NO",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    BuyYes,
    BuyNo,
    Hold,
}

impl From<Side> for Action {
    fn from(side: Side) -> Self {
        match side {
            Side::Yes => Action::BuyYes,
            Side::No => Action::BuyNo,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::BuyYes => write!(f, "BUY_YES"),
            Action::BuyNo => write!(f, "BUY_NO"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

/// Outcome of one evaluation.
///
/// Fields are private so every instance goes through a constructor that
/// clamps the confidence. There are no setters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    #[serde(rename = "decision")]
    action: Action,
    confidence: f64,
    reasoning: String,
}

impl Decision {
    pub fn buy(side: Side, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            action: side.into(),
            confidence: clamp_confidence(confidence),
            reasoning: reasoning.into(),
        }
    }

    pub fn hold(reasoning: impl Into<String>, confidence: f64) -> Self {
        Self {
            action: Action::Hold,
            confidence: clamp_confidence(confidence),
            reasoning: reasoning.into(),
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn is_hold(&self) -> bool {
        self.action == Action::Hold
    }
}

/// Modeled settlement probability for the YES side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FairValue {
    pub fair_yes_cents: i64,
    pub fair_yes_prob: f64,
    /// Underlying price minus strike, in dollars.
    pub btc_vs_strike: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolRegime {
    Low,
    Medium,
    High,
}

impl fmt::Display for VolRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolRegime::Low => write!(f, "low"),
            VolRegime::Medium => write!(f, "medium"),
            VolRegime::High => write!(f, "high"),
        }
    }
}

impl FromStr for VolRegime {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(VolRegime::Low),
            "medium" => Ok(VolRegime::Medium),
            "high" => Ok(VolRegime::High),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Volatility {
    pub regime: VolRegime,
    /// Observed magnitude. Zero when the provider had nothing usable.
    pub vol_dollar_per_min: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

impl TrendDirection {
    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            TrendDirection::Up
        } else if value < 0.0 {
            TrendDirection::Down
        } else {
            TrendDirection::Flat
        }
    }

    /// Whether this direction supports buying `side`.
    pub fn confirms(self, side: Side) -> bool {
        matches!(
            (self, side),
            (TrendDirection::Up, Side::Yes) | (TrendDirection::Down, Side::No)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Velocity {
    /// Dollars per second over the last minute, signed.
    pub velocity_1m: f64,
    pub direction_1m: TrendDirection,
    pub price_change_1m: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_confidence_is_clamped() {
        let high = Decision::buy(Side::Yes, 1.7, "r");
        assert_eq!(high.confidence(), MAX_CONFIDENCE);

        let negative = Decision::hold("r", -0.2);
        assert_eq!(negative.confidence(), 0.0);

        let nan = Decision::hold("r", f64::NAN);
        assert_eq!(nan.confidence(), 0.0);
    }

    #[test]
    fn test_action_wire_names() {
        let decision = Decision::buy(Side::No, 0.6, "because");
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["decision"], "BUY_NO");
        assert_eq!(json["reasoning"], "because");
        assert_eq!(Action::Hold.to_string(), "HOLD");
    }

    #[test]
    fn test_valid_strike() {
        let mut market = MarketSnapshot {
            ticker: "KXBTC15M-T".into(),
            strike_price: Some(50_000.0),
            seconds_to_close: 300.0,
            best_bid: 40,
            best_ask: 45,
        };
        assert_eq!(market.valid_strike(), Some(50_000.0));

        market.strike_price = Some(0.0);
        assert_eq!(market.valid_strike(), None);
        market.strike_price = Some(f64::NAN);
        assert_eq!(market.valid_strike(), None);
        market.strike_price = None;
        assert_eq!(market.valid_strike(), None);
    }

    #[test]
    fn test_valid_quotes_range() {
        let mut market = MarketSnapshot {
            ticker: "KXBTC15M-T".into(),
            strike_price: Some(50_000.0),
            seconds_to_close: 300.0,
            best_bid: 0,
            best_ask: 100,
        };
        assert_eq!(market.valid_quotes(), Some((0, 100)));

        market.best_bid = i64::MIN;
        assert_eq!(market.valid_quotes(), None);
        market.best_bid = 40;
        market.best_ask = -500;
        assert_eq!(market.valid_quotes(), None);
        market.best_ask = 101;
        assert_eq!(market.valid_quotes(), None);
    }

    #[test]
    fn test_snapshot_defaults_match_empty_book() {
        let market: MarketSnapshot =
            serde_json::from_str(r#"{"ticker":"KXBTC15M-T","strike_price":65000}"#).unwrap();
        assert_eq!(market.best_bid, 0);
        assert_eq!(market.best_ask, 100);
        assert_eq!(market.seconds_left(), 0.0);
    }

    #[test]
    fn test_trend_confirms() {
        assert!(TrendDirection::Up.confirms(Side::Yes));
        assert!(!TrendDirection::Up.confirms(Side::No));
        assert!(TrendDirection::Down.confirms(Side::No));
        assert!(!TrendDirection::Flat.confirms(Side::Yes));
        assert!(!TrendDirection::Flat.confirms(Side::No));
    }

    #[test]
    fn test_regime_parse() {
        assert_eq!(" High ".parse::<VolRegime>(), Ok(VolRegime::High));
        assert!("extreme".parse::<VolRegime>().is_err());
    }
}
