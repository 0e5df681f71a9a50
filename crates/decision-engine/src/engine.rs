use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::rules::{RuleSnapshot, RuleStore};
use crate::scoring::{self, Edges, SideInputs};
use crate::signals::{AlphaSignals, SignalError};
use crate::sink::{DecisionRecorder, EventLog};
use crate::state::EngineState;
use crate::time_decay::TimeDecay;
use crate::types::{Decision, FairValue, MarketSnapshot, Side, Velocity, VolRegime, Volatility};

pub const NO_INPUTS_REASON: &str = "No strike price or alpha data available";
pub const EVENT_CATEGORY: &str = "RULES";
const LOG_REASONING_CHARS: usize = 200;

/// Intermediate numbers behind a decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scorecard {
    pub rules_version: u64,
    pub seconds_left: f64,
    pub fair_value: FairValue,
    pub volatility: Volatility,
    pub velocity: Velocity,
    pub regime: VolRegime,
    pub effective_min_edge: i64,
    pub edges: Edges,
    pub decay: TimeDecay,
    pub yes_score: f64,
    pub no_score: f64,
    /// Diagnostic only, never carried into a later evaluation.
    pub potential_yes: f64,
    pub potential_no: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub decision: Decision,
    /// `None` when a guard stopped the pipeline before scoring.
    pub scorecard: Option<Scorecard>,
}

impl Assessment {
    fn guarded(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::hold(reason, 0.0),
            scorecard: None,
        }
    }
}

struct Readings {
    fair_value: FairValue,
    volatility: Volatility,
    velocity: Velocity,
}

/// On failure, also names the signal that could not be read.
fn read_signals(
    provider: &dyn AlphaSignals,
    strike: f64,
    seconds_left: f64,
) -> Result<Readings, (&'static str, SignalError)> {
    Ok(Readings {
        fair_value: provider
            .fair_value(strike, seconds_left)
            .map_err(|e| ("fair value", e))?,
        volatility: provider.volatility().map_err(|e| ("volatility", e))?,
        velocity: provider
            .price_velocity()
            .map_err(|e| ("price velocity", e))?,
    })
}

fn pct(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn trace_lines(
    fv: &FairValue,
    vol: &Volatility,
    vel: &Velocity,
    seconds_left: f64,
    decay: &TimeDecay,
    edges: &Edges,
) -> Vec<String> {
    vec![
        format!(
            "BTC {} strike by ${:.0}",
            if fv.btc_vs_strike > 0.0 { "above" } else { "below" },
            fv.btc_vs_strike.abs()
        ),
        format!(
            "Fair: {}c YES ({})",
            fv.fair_yes_cents,
            pct(fv.fair_yes_prob)
        ),
        format!("Vol: {} (${:.1}/min)", vol.regime, vol.vol_dollar_per_min),
        format!("Trend: ${:+.0}/1m", vel.price_change_1m),
        format!(
            "Time: {:.0}s left (dist={:.1}x, Y*{:.2}/N*{:.2})",
            seconds_left, decay.distance_ratio, decay.yes_factor, decay.no_factor
        ),
        format!(
            "YES edge: {:+}c (fair {} vs ask {})",
            edges.yes_edge, fv.fair_yes_cents, edges.yes_cost
        ),
        format!(
            "NO edge: {:+}c (fair {} vs cost {})",
            edges.no_edge,
            100 - fv.fair_yes_cents,
            edges.no_cost
        ),
    ]
}

/// Pure evaluation: guards, signals, edge, time decay, scoring, gate.
pub fn assess(
    market: &MarketSnapshot,
    signals: Option<&dyn AlphaSignals>,
    rules: &RuleSnapshot,
) -> Assessment {
    let (Some(provider), Some(strike)) = (signals, market.valid_strike()) else {
        return Assessment::guarded(NO_INPUTS_REASON);
    };
    let Some((best_bid, best_ask)) = market.valid_quotes() else {
        return Assessment::guarded(format!(
            "Quotes out of range: bid={} ask={}",
            market.best_bid, market.best_ask
        ));
    };

    let seconds_left = market.seconds_left();
    let Readings {
        fair_value: fv,
        volatility: vol,
        velocity: vel,
    } = match read_signals(provider, strike, seconds_left) {
        Ok(readings) => readings,
        Err((signal, e)) => {
            return Assessment::guarded(format!("Alpha signals unavailable: {}: {}", signal, e))
        }
    };
    let cfg = &rules.rules;

    let decay = TimeDecay::compute(seconds_left, vol.vol_dollar_per_min, fv.btc_vs_strike);
    let edges = Edges::from_quotes(fv.fair_yes_cents, best_bid, best_ask);
    let min_edge = scoring::effective_min_edge(cfg.min_edge_cents, vol.regime);
    let momentum =
        vol.regime == VolRegime::High && vel.velocity_1m.abs() > cfg.trend_follow_velocity;

    let side_score = |side: Side| {
        scoring::score_side(SideInputs {
            edge: edges.for_side(side),
            min_edge,
            trend_confirms: vel.direction_1m.confirms(side),
            momentum,
            time_factor: decay.factor_for(side),
        })
    };

    let scorecard = Scorecard {
        rules_version: rules.version,
        seconds_left,
        fair_value: fv,
        volatility: vol,
        velocity: vel,
        regime: vol.regime,
        effective_min_edge: min_edge,
        edges,
        decay,
        yes_score: side_score(Side::Yes),
        no_score: side_score(Side::No),
        potential_yes: scoring::potential_confidence(edges.yes_edge, decay.yes_factor),
        potential_no: scoring::potential_confidence(edges.no_edge, decay.no_factor),
    };

    let mut reasons = trace_lines(&fv, &vol, &vel, seconds_left, &decay, &edges);

    // A quiet market makes the later stages untrustworthy; refuse before
    // any score is allowed to drive the outcome.
    if cfg.sit_out_low_vol && vol.regime == VolRegime::Low {
        return Assessment {
            decision: Decision::hold(format!("Low vol: sitting out. {}", reasons.join("; ")), 0.0),
            scorecard: Some(scorecard),
        };
    }

    let Some(side) = scoring::arbitrate(scorecard.yes_score, scorecard.no_score) else {
        reasons.push(format!(
            "Potential: YES {} / NO {}",
            pct(scorecard.potential_yes),
            pct(scorecard.potential_no)
        ));
        let best_potential = scorecard.potential_yes.max(scorecard.potential_no);
        return Assessment {
            decision: Decision::hold(format!("No edge. {}", reasons.join("; ")), best_potential),
            scorecard: Some(scorecard),
        };
    };

    let score = match side {
        Side::Yes => scorecard.yes_score,
        Side::No => scorecard.no_score,
    };
    let confidence = scoring::confidence_from_score(score);
    reasons.push(format!(
        "-> BUY {} (score {:.2}, edge {}c{})",
        side.label(),
        score,
        edges.for_side(side),
        if vel.direction_1m.confirms(side) { ", trend OK" } else { "" }
    ));

    let decision = if confidence < cfg.min_confidence {
        Decision::hold(
            format!("Low confidence {}. {}", pct(confidence), reasons.join("; ")),
            confidence,
        )
    } else {
        Decision::buy(side, confidence, reasons.join("; "))
    };

    Assessment {
        decision,
        scorecard: Some(scorecard),
    }
}

/// Per-cycle decision pipeline with its collaborators.
pub struct DecisionEngine {
    rules: Arc<RuleStore>,
    state: Arc<EngineState>,
    recorder: Arc<dyn DecisionRecorder>,
    events: Arc<dyn EventLog>,
}

impl DecisionEngine {
    pub fn new(
        rules: Arc<RuleStore>,
        state: Arc<EngineState>,
        recorder: Arc<dyn DecisionRecorder>,
        events: Arc<dyn EventLog>,
    ) -> Self {
        Self {
            rules,
            state,
            recorder,
            events,
        }
    }

    pub fn rules(&self) -> &Arc<RuleStore> {
        &self.rules
    }

    pub fn state(&self) -> &Arc<EngineState> {
        &self.state
    }

    /// Evaluate one snapshot against the current rules and notify collaborators.
    pub fn evaluate(
        &self,
        market: &MarketSnapshot,
        signals: Option<&dyn AlphaSignals>,
    ) -> Decision {
        self.evaluate_detailed(market, signals).decision
    }

    /// Same as [`DecisionEngine::evaluate`], keeping the scorecard for
    /// status surfaces.
    pub fn evaluate_detailed(
        &self,
        market: &MarketSnapshot,
        signals: Option<&dyn AlphaSignals>,
    ) -> Assessment {
        let rules = self.rules.snapshot();
        let assessment = assess(market, signals, &rules);

        if let Some(card) = &assessment.scorecard {
            debug!(
                ticker = %market.ticker,
                rules_version = card.rules_version,
                yes_edge = card.edges.yes_edge,
                no_edge = card.edges.no_edge,
                yes_score = card.yes_score,
                no_score = card.no_score,
                distance_ratio = card.decay.distance_ratio,
                "scored market"
            );
        }

        self.emit(market, &assessment.decision);
        assessment
    }

    fn emit(&self, market: &MarketSnapshot, decision: &Decision) {
        self.state.replace(Arc::new(decision.clone()));

        let summary = truncate_chars(decision.reasoning(), LOG_REASONING_CHARS);
        let message = if decision.is_hold() {
            format!("HOLD | {}", summary)
        } else {
            if let Err(e) = self.recorder.record_decision(&market.ticker, decision) {
                warn!("decision record failed for {}: {:#}", market.ticker, e);
            }
            format!(
                "{} ({}) | {}",
                decision.action(),
                pct(decision.confidence()),
                summary
            )
        };

        if let Err(e) = self.events.log_event(EVENT_CATEGORY, &message) {
            warn!("event log failed for {}: {:#}", market.ticker, e);
        }
    }
}
