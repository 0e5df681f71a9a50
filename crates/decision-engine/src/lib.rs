//! Rule-based YES/NO/HOLD decisions for binary strike contracts.

pub mod engine;
pub mod rules;
pub mod scoring;
pub mod signals;
pub mod sink;
pub mod state;
pub mod time_decay;
pub mod types;

pub use engine::{assess, Assessment, DecisionEngine, Scorecard, EVENT_CATEGORY, NO_INPUTS_REASON};
pub use rules::{RuleConfig, RuleSnapshot, RuleStore, TunableValue, TUNABLES};
pub use signals::{AlphaSignals, RawFairValue, RawVelocity, RawVolatility, SignalError, StaticSignals};
pub use sink::{DecisionRecorder, EventLog, NoopRecorder, TracingEventLog};
pub use state::EngineState;
pub use types::{Action, Decision, MarketSnapshot, Side, VolRegime, MAX_CONFIDENCE};
