//! Versioned rule configuration.
//!
//! The engine reads one immutable [`RuleSnapshot`] per evaluation. Operators
//! (config file, tunables file, advisor tool calls) change rules by publishing
//! a whole new snapshot; nothing is edited in place.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

pub const MIN_EDGE_CENTS: &str = "MIN_EDGE_CENTS";
pub const RULE_SIT_OUT_LOW_VOL: &str = "RULE_SIT_OUT_LOW_VOL";
pub const RULE_MIN_CONFIDENCE: &str = "RULE_MIN_CONFIDENCE";
pub const TREND_FOLLOW_VELOCITY: &str = "TREND_FOLLOW_VELOCITY";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default = "default_min_edge_cents")]
    pub min_edge_cents: i64,
    #[serde(default = "default_true")]
    pub sit_out_low_vol: bool,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Dollars per second.
    #[serde(default = "default_trend_follow_velocity")]
    pub trend_follow_velocity: f64,
}

fn default_min_edge_cents() -> i64 {
    3
}

fn default_true() -> bool {
    true
}

fn default_min_confidence() -> f64 {
    0.6
}

fn default_trend_follow_velocity() -> f64 {
    2.0
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            min_edge_cents: default_min_edge_cents(),
            sit_out_low_vol: default_true(),
            min_confidence: default_min_confidence(),
            trend_follow_velocity: default_trend_follow_velocity(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TunableValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl From<TunableValue> for Value {
    fn from(value: TunableValue) -> Self {
        match value {
            TunableValue::Bool(b) => Value::from(b),
            TunableValue::Int(i) => Value::from(i),
            TunableValue::Float(f) => Value::from(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TunableKind {
    Bool,
    Int { min: i64, max: i64 },
    Float { min: f64, max: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tunable {
    pub key: &'static str,
    pub kind: TunableKind,
}

pub const TUNABLES: [Tunable; 4] = [
    Tunable {
        key: MIN_EDGE_CENTS,
        kind: TunableKind::Int { min: 1, max: 30 },
    },
    Tunable {
        key: RULE_SIT_OUT_LOW_VOL,
        kind: TunableKind::Bool,
    },
    Tunable {
        key: RULE_MIN_CONFIDENCE,
        kind: TunableKind::Float { min: 0.3, max: 0.95 },
    },
    Tunable {
        key: TREND_FOLLOW_VELOCITY,
        kind: TunableKind::Float { min: 0.5, max: 20.0 },
    },
];

pub fn tunable(key: &str) -> Option<&'static Tunable> {
    TUNABLES.iter().find(|t| t.key == key)
}

impl Tunable {
    /// Coerce a loosely-typed value and clamp it into range.
    pub fn coerce(&self, value: &Value) -> Option<TunableValue> {
        match self.kind {
            TunableKind::Bool => {
                let flag = match value {
                    Value::Bool(b) => *b,
                    Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"),
                    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                    _ => return None,
                };
                Some(TunableValue::Bool(flag))
            }
            TunableKind::Int { min, max } => {
                let raw = match value {
                    Value::Number(n) => match n.as_i64() {
                        Some(i) => i,
                        None => {
                            let f = n.as_f64().filter(|f| f.is_finite())?;
                            f.trunc() as i64
                        }
                    },
                    Value::String(s) => s.trim().parse::<i64>().ok()?,
                    Value::Bool(b) => i64::from(*b),
                    _ => return None,
                };
                Some(TunableValue::Int(raw.clamp(min, max)))
            }
            TunableKind::Float { min, max } => {
                let raw = match value {
                    Value::Number(n) => n.as_f64()?,
                    Value::String(s) => s.trim().parse::<f64>().ok()?,
                    Value::Bool(b) => f64::from(u8::from(*b)),
                    _ => return None,
                };
                if !raw.is_finite() {
                    return None;
                }
                Some(TunableValue::Float(raw.clamp(min, max)))
            }
        }
    }
}

impl RuleConfig {
    fn set(&mut self, key: &str, value: TunableValue) {
        match (key, value) {
            (MIN_EDGE_CENTS, TunableValue::Int(v)) => self.min_edge_cents = v,
            (RULE_SIT_OUT_LOW_VOL, TunableValue::Bool(v)) => self.sit_out_low_vol = v,
            (RULE_MIN_CONFIDENCE, TunableValue::Float(v)) => self.min_confidence = v,
            (TREND_FOLLOW_VELOCITY, TunableValue::Float(v)) => self.trend_follow_velocity = v,
            _ => debug!("ignoring mismatched tunable {} = {:?}", key, value),
        }
    }

    pub fn tunables(&self) -> BTreeMap<&'static str, TunableValue> {
        BTreeMap::from([
            (MIN_EDGE_CENTS, TunableValue::Int(self.min_edge_cents)),
            (RULE_SIT_OUT_LOW_VOL, TunableValue::Bool(self.sit_out_low_vol)),
            (RULE_MIN_CONFIDENCE, TunableValue::Float(self.min_confidence)),
            (TREND_FOLLOW_VELOCITY, TunableValue::Float(self.trend_follow_velocity)),
        ])
    }

    /// Loosely-typed form accepted by [`RuleStore::apply`].
    pub fn as_updates(&self) -> BTreeMap<String, Value> {
        self.tunables()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.into()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSnapshot {
    pub version: u64,
    pub rules: RuleConfig,
}

#[derive(Debug)]
pub struct RuleStore {
    current: RwLock<Arc<RuleSnapshot>>,
}

impl RuleStore {
    /// Stores `rules` verbatim as version 1. Use [`RuleStore::apply`] for
    /// untrusted input.
    pub fn new(rules: RuleConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(RuleSnapshot { version: 1, rules })),
        }
    }

    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.current.read().clone()
    }

    pub fn tunables(&self) -> BTreeMap<&'static str, TunableValue> {
        self.snapshot().rules.tunables()
    }

    /// Apply updates and publish a new snapshot.
    ///
    /// Unknown keys and values that cannot be coerced are skipped. Returns the
    /// values actually applied, after clamping.
    pub fn apply(&self, updates: &BTreeMap<String, Value>) -> BTreeMap<String, TunableValue> {
        let mut current = self.current.write();
        let mut rules = current.rules;
        let mut applied = BTreeMap::new();

        for (key, raw) in updates {
            let Some(entry) = tunable(key) else {
                debug!("ignoring unknown tunable {}", key);
                continue;
            };
            let Some(value) = entry.coerce(raw) else {
                debug!("ignoring uncoercible value for {}: {}", key, raw);
                continue;
            };
            rules.set(entry.key, value);
            applied.insert(entry.key.to_string(), value);
        }

        if !applied.is_empty() {
            let version = current.version + 1;
            *current = Arc::new(RuleSnapshot { version, rules });
            info!("rules updated to v{}: {:?}", version, applied);
        }
        applied
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new(RuleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn updates(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_apply_clamps_and_bumps_version() {
        let store = RuleStore::default();
        let applied = store.apply(&updates(&[
            (MIN_EDGE_CENTS, json!(99)),
            (RULE_MIN_CONFIDENCE, json!(0.1)),
            (TREND_FOLLOW_VELOCITY, json!("3.5")),
        ]));

        assert_eq!(applied[MIN_EDGE_CENTS], TunableValue::Int(30));
        assert_eq!(applied[RULE_MIN_CONFIDENCE], TunableValue::Float(0.3));
        assert_eq!(applied[TREND_FOLLOW_VELOCITY], TunableValue::Float(3.5));

        let snap = store.snapshot();
        assert_eq!(snap.version, 2);
        assert_eq!(snap.rules.min_edge_cents, 30);
        assert_eq!(snap.rules.min_confidence, 0.3);
        assert!(snap.rules.sit_out_low_vol);
    }

    #[test]
    fn test_unknown_and_invalid_values_skipped() {
        let store = RuleStore::default();
        let applied = store.apply(&updates(&[
            ("VOL_HIGH_THRESHOLD", json!(500)),
            (MIN_EDGE_CENTS, json!("four")),
            (RULE_MIN_CONFIDENCE, json!(null)),
        ]));

        assert!(applied.is_empty());
        assert_eq!(store.snapshot().version, 1);
        assert_eq!(store.snapshot().rules, RuleConfig::default());
    }

    #[test]
    fn test_bool_coercion() {
        let entry = tunable(RULE_SIT_OUT_LOW_VOL).unwrap();
        assert_eq!(entry.coerce(&json!(false)), Some(TunableValue::Bool(false)));
        assert_eq!(entry.coerce(&json!("TRUE")), Some(TunableValue::Bool(true)));
        assert_eq!(entry.coerce(&json!("1")), Some(TunableValue::Bool(true)));
        assert_eq!(entry.coerce(&json!("yes")), Some(TunableValue::Bool(false)));
        assert_eq!(entry.coerce(&json!(0)), Some(TunableValue::Bool(false)));
        assert_eq!(entry.coerce(&json!(1.0)), Some(TunableValue::Bool(true)));
        assert_eq!(entry.coerce(&json!([1])), None);
    }

    #[test]
    fn test_int_coercion_truncates() {
        let entry = tunable(MIN_EDGE_CENTS).unwrap();
        assert_eq!(entry.coerce(&json!(5.9)), Some(TunableValue::Int(5)));
        assert_eq!(entry.coerce(&json!(0)), Some(TunableValue::Int(1)));
        assert_eq!(entry.coerce(&json!(" 7 ")), Some(TunableValue::Int(7)));
    }

    #[test]
    fn test_old_snapshot_is_untouched_by_update() {
        let store = RuleStore::default();
        let before = store.snapshot();
        store.apply(&updates(&[(RULE_SIT_OUT_LOW_VOL, json!(false))]));

        assert!(before.rules.sit_out_low_vol);
        assert_eq!(before.version, 1);
        assert!(!store.snapshot().rules.sit_out_low_vol);
    }

    #[test]
    fn test_as_updates_roundtrips_through_apply() {
        let rules = RuleConfig {
            min_edge_cents: 6,
            sit_out_low_vol: false,
            min_confidence: 0.7,
            trend_follow_velocity: 4.0,
        };
        let store = RuleStore::default();
        store.apply(&rules.as_updates());
        assert_eq!(store.snapshot().rules, rules);
    }
}
