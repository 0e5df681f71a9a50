//! Alpha-signal provider boundary.
//!
//! Providers hand over fair value, volatility and price velocity. Raw payloads
//! are validated here, once, before the engine ever sees them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{FairValue, TrendDirection, Velocity, VolRegime, Volatility};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("fair value out of range: {0}")]
    FairValueOutOfRange(String),
    #[error("unknown volatility regime: {0}")]
    UnknownRegime(String),
    #[error("non-finite {field}: {value}")]
    NonFinite { field: &'static str, value: f64 },
    #[error("signal unavailable: {0}")]
    Unavailable(String),
}

/// Source of already-computed, in-memory alpha signals.
pub trait AlphaSignals: Send + Sync {
    fn fair_value(&self, strike: f64, seconds_left: f64) -> Result<FairValue, SignalError>;
    fn volatility(&self) -> Result<Volatility, SignalError>;
    fn price_velocity(&self) -> Result<Velocity, SignalError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFairValue {
    pub fair_yes_cents: i64,
    pub fair_yes_prob: f64,
    pub btc_vs_strike: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawVolatility {
    pub regime: String,
    #[serde(default)]
    pub vol_dollar_per_min: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawVelocity {
    pub velocity_1m: f64,
    /// Signed; only the sign is used.
    pub direction_1m: f64,
    #[serde(default)]
    pub price_change_1m: f64,
}

fn finite(field: &'static str, value: f64) -> Result<f64, SignalError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SignalError::NonFinite { field, value })
    }
}

impl TryFrom<RawFairValue> for FairValue {
    type Error = SignalError;

    fn try_from(raw: RawFairValue) -> Result<Self, Self::Error> {
        if !(0..=100).contains(&raw.fair_yes_cents) {
            return Err(SignalError::FairValueOutOfRange(format!(
                "fair_yes_cents={}",
                raw.fair_yes_cents
            )));
        }
        let prob = finite("fair_yes_prob", raw.fair_yes_prob)?;
        if !(0.0..=1.0).contains(&prob) {
            return Err(SignalError::FairValueOutOfRange(format!(
                "fair_yes_prob={}",
                prob
            )));
        }

        Ok(FairValue {
            fair_yes_cents: raw.fair_yes_cents,
            fair_yes_prob: prob,
            btc_vs_strike: finite("btc_vs_strike", raw.btc_vs_strike)?,
        })
    }
}

impl TryFrom<RawVolatility> for Volatility {
    type Error = SignalError;

    fn try_from(raw: RawVolatility) -> Result<Self, Self::Error> {
        let regime = raw
            .regime
            .parse::<VolRegime>()
            .map_err(SignalError::UnknownRegime)?;

        // A missing or garbage magnitude is degenerate, not an error: the
        // time-decay stage substitutes its floor.
        let vol_dollar_per_min = raw
            .vol_dollar_per_min
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(0.0);

        Ok(Volatility {
            regime,
            vol_dollar_per_min,
        })
    }
}

impl TryFrom<RawVelocity> for Velocity {
    type Error = SignalError;

    fn try_from(raw: RawVelocity) -> Result<Self, Self::Error> {
        let direction = finite("direction_1m", raw.direction_1m)?;
        Ok(Velocity {
            velocity_1m: finite("velocity_1m", raw.velocity_1m)?,
            direction_1m: TrendDirection::from_sign(direction),
            price_change_1m: finite("price_change_1m", raw.price_change_1m)?,
        })
    }
}

/// Provider over one fixed, validated set of readings.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticSignals {
    pub fair_value: FairValue,
    pub volatility: Volatility,
    pub velocity: Velocity,
}

impl StaticSignals {
    pub fn from_raw(
        fair_value: RawFairValue,
        volatility: RawVolatility,
        velocity: RawVelocity,
    ) -> Result<Self, SignalError> {
        Ok(Self {
            fair_value: fair_value.try_into()?,
            volatility: volatility.try_into()?,
            velocity: velocity.try_into()?,
        })
    }
}

impl AlphaSignals for StaticSignals {
    fn fair_value(&self, _strike: f64, _seconds_left: f64) -> Result<FairValue, SignalError> {
        Ok(self.fair_value)
    }

    fn volatility(&self) -> Result<Volatility, SignalError> {
        Ok(self.volatility)
    }

    fn price_velocity(&self) -> Result<Velocity, SignalError> {
        Ok(self.velocity)
    }
}
