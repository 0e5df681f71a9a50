//! Collaborators notified after each evaluation.
//!
//! Both are best-effort: the engine logs a failed notification and moves on.
//! Implementations should not block; hand the work to another task instead.

use tracing::info;

use crate::types::Decision;

pub trait DecisionRecorder: Send + Sync {
    fn record_decision(&self, market_id: &str, decision: &Decision) -> anyhow::Result<()>;
}

pub trait EventLog: Send + Sync {
    fn log_event(&self, category: &str, message: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl DecisionRecorder for NoopRecorder {
    fn record_decision(&self, _market_id: &str, _decision: &Decision) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventLog;

impl EventLog for TracingEventLog {
    fn log_event(&self, category: &str, message: &str) -> anyhow::Result<()> {
        info!(category, "{}", message);
        Ok(())
    }
}
