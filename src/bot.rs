use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use decision_engine::{
    Action, AlphaSignals, Assessment, Decision, DecisionEngine, EngineState, RuleStore, Scorecard,
};
use llm_client::{ChatContext, ChatRequest, ChatTurn};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::advisor::{Advisor, ChatReply, RuleStoreUpdater};
use crate::config::AppConfig;
use crate::journal::{now_iso, resolve_trades_dir, spawn_writer, JournalHandle, TradeJournal};
use crate::tape::{Tape, TapeFrame};
use crate::tunables::TunablesFile;

const MAX_CHAT_HISTORY: usize = 20;
const ROLLING_WINDOW: usize = 20;

#[derive(Debug, Clone, Default, Serialize)]
pub struct BotStatus {
    pub running: bool,
    pub cycles: u64,
    pub last_ticker: Option<String>,
    pub last_action: Option<Action>,
    pub buy_yes: u64,
    pub buy_no: u64,
    pub holds: u64,
    /// Edges, time decay, regime and potentials behind the latest decision.
    pub last_scorecard: Option<Scorecard>,
    pub rolling_avg_confidence: f64,
    /// Mean of the better side's potential confidence; 0 for guarded cycles.
    pub rolling_avg_potential: f64,
    #[serde(skip)]
    recent_confidence: VecDeque<f64>,
    #[serde(skip)]
    recent_potential: VecDeque<f64>,
}

fn push_rolling(window: &mut VecDeque<f64>, value: f64) -> f64 {
    if window.len() == ROLLING_WINDOW {
        window.pop_front();
    }
    window.push_back(value);
    window.iter().sum::<f64>() / window.len() as f64
}

impl BotStatus {
    fn observe(&mut self, ticker: &str, assessment: &Assessment) {
        let action = assessment.decision.action();
        self.cycles += 1;
        self.last_ticker = Some(ticker.to_string());
        self.last_action = Some(action);
        match action {
            Action::BuyYes => self.buy_yes += 1,
            Action::BuyNo => self.buy_no += 1,
            Action::Hold => self.holds += 1,
        }

        let potential = assessment
            .scorecard
            .as_ref()
            .map_or(0.0, |card| card.potential_yes.max(card.potential_no));
        self.rolling_avg_confidence =
            push_rolling(&mut self.recent_confidence, assessment.decision.confidence());
        self.rolling_avg_potential = push_rolling(&mut self.recent_potential, potential);
        self.last_scorecard = assessment.scorecard.clone();
    }

    fn performance(&self) -> serde_json::Value {
        let signals = self.buy_yes + self.buy_no;
        let signal_rate = if self.cycles == 0 {
            0.0
        } else {
            signals as f64 / self.cycles as f64
        };
        json!({
            "cycles": self.cycles,
            "buy_yes": self.buy_yes,
            "buy_no": self.buy_no,
            "holds": self.holds,
            "signal_rate": signal_rate,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub tape: PathBuf,
    pub fast: bool,
    pub chat: bool,
}

/// Read-only views the advisor builds its context from.
struct ChatSources {
    status: Arc<RwLock<BotStatus>>,
    state: Arc<EngineState>,
    rules: Arc<RuleStore>,
    updater: RuleStoreUpdater,
}

impl ChatSources {
    fn context(&self) -> ChatContext {
        let status = self.status.read().clone();
        let rules = self.rules.snapshot();
        let mut key_config = serde_json::to_value(rules.rules.tunables()).ok();
        if let Some(obj) = key_config.as_mut().and_then(|v| v.as_object_mut()) {
            obj.insert("rules_version".into(), json!(rules.version));
        }

        ChatContext {
            status: serde_json::to_value(&status).ok(),
            performance: Some(status.performance()),
            key_config,
            last_decision: self
                .state
                .latest()
                .and_then(|d| serde_json::to_value(d.as_ref()).ok()),
        }
    }
}

pub struct Bot {
    config: AppConfig,
    options: RunOptions,
    engine: DecisionEngine,
    journal: JournalHandle,
    writer: JoinHandle<()>,
    status: Arc<RwLock<BotStatus>>,
    advisor: Arc<Advisor>,
    tunables: TunablesFile,
}

impl Bot {
    pub async fn new(config: AppConfig, options: RunOptions) -> Result<Self> {
        config.validate()?;

        let trades_dir = config
            .journal
            .dir
            .clone()
            .unwrap_or_else(resolve_trades_dir);
        let trade_journal = TradeJournal::open(trades_dir.clone())?;
        info!("Trade journal path: {}", trade_journal.dir().display());
        let (journal, writer) = spawn_writer(trade_journal);

        let rules = Arc::new(RuleStore::default());
        rules.apply(&config.rules.as_updates());
        let tunables = TunablesFile::new(&trades_dir);
        tunables.restore(&rules);

        let state = Arc::new(EngineState::new());
        let engine = DecisionEngine::new(
            rules.clone(),
            state,
            Arc::new(journal.clone()),
            Arc::new(journal.clone()),
        );

        let api_key = std::env::var("ANTHROPIC_API_KEY").ok();
        let advisor = Arc::new(Advisor::from_config(&config.llm, api_key)?);

        let snapshot = rules.snapshot();
        journal.write(json!({
            "ts": now_iso(),
            "kind": "bot_start",
            "tape": options.tape.display().to_string(),
            "fast": options.fast,
            "rules_version": snapshot.version,
            "rules": snapshot.rules,
            "advisor": advisor.is_available(),
        }));

        Ok(Self {
            config,
            options,
            engine,
            journal,
            writer,
            status: Arc::new(RwLock::new(BotStatus::default())),
            advisor,
            tunables,
        })
    }

    fn run_cycle(&self, frame: &TapeFrame) -> Decision {
        let signals = frame.signals();
        let assessment = self.engine.evaluate_detailed(
            &frame.market,
            signals.as_ref().map(|s| s as &dyn AlphaSignals),
        );

        let cycle = {
            let mut status = self.status.write();
            status.observe(&frame.market.ticker, &assessment);
            status.cycles
        };
        let decision = assessment.decision;

        self.journal.write(json!({
            "ts": now_iso(),
            "kind": "cycle",
            "cycle": cycle,
            "ticker": frame.market.ticker,
            "decision": decision.action(),
            "confidence": decision.confidence(),
        }));
        decision
    }

    fn spawn_chat(&self) -> JoinHandle<()> {
        let sources = ChatSources {
            status: self.status.clone(),
            state: self.engine.state().clone(),
            rules: self.engine.rules().clone(),
            updater: RuleStoreUpdater::new(self.engine.rules().clone(), self.tunables.clone()),
        };
        let advisor = self.advisor.clone();
        tokio::spawn(chat_loop(advisor, sources))
    }

    async fn replay(&self) -> Result<()> {
        let mut tape = Tape::open(&self.options.tape).await?;
        let interval = Duration::from_secs(self.config.trading.poll_interval_secs);

        while let Some(frame) = tape.next_frame().await? {
            self.run_cycle(&frame);
            if !self.options.fast {
                sleep(interval).await;
            }
        }
        Ok(())
    }

    /// Drive the engine over the whole tape and return the final status.
    ///
    /// The chat task is stopped and the journal drained even when the tape
    /// fails; the error is returned afterwards.
    pub async fn run(self) -> Result<BotStatus> {
        info!("Bot running on tape {}", self.options.tape.display());
        self.status.write().running = true;

        let chat_task = self.options.chat.then(|| self.spawn_chat());
        let outcome = self.replay().await;

        if let Some(task) = chat_task {
            task.abort();
        }
        let error = outcome.as_ref().err().map(|e| format!("{:#}", e));
        if let Some(e) = &error {
            warn!("Tape replay stopped: {}", e);
        }

        let status = {
            let mut status = self.status.write();
            status.running = false;
            status.clone()
        };
        info!(
            "Run finished after {} cycles ({} YES, {} NO, {} HOLD)",
            status.cycles, status.buy_yes, status.buy_no, status.holds
        );
        self.journal.write(json!({
            "ts": now_iso(),
            "kind": "bot_stop",
            "status": status,
            "error": error,
        }));

        // The writer drains and exits once the last handle is gone.
        let Self {
            engine,
            journal,
            writer,
            ..
        } = self;
        drop(engine);
        drop(journal);
        writer.await?;

        outcome?;
        Ok(status)
    }
}

async fn chat_loop(advisor: Arc<Advisor>, sources: ChatSources) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history: Vec<ChatTurn> = Vec::new();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("chat input closed: {}", e);
                break;
            }
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }

        let request = ChatRequest::new(message, sources.context(), history.clone());
        let reply = advisor.chat(&request, Some(&sources.updater)).await;
        println!("advisor> {}", reply);

        if let ChatReply::Answer(text) = reply {
            history.push(ChatTurn::user(message));
            history.push(ChatTurn::assistant(text));
            if history.len() > MAX_CHAT_HISTORY {
                history.drain(..history.len() - MAX_CHAT_HISTORY);
            }
        }
    }
}
