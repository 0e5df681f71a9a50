use std::fs::{create_dir_all, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use chrono::{SecondsFormat, Utc};
use decision_engine::{Decision, DecisionRecorder, EventLog};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

pub const BOT_TRADE_DIR: &str = "strike-rules-bot";

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn resolve_repo_root() -> Option<PathBuf> {
    let mut cursor = std::env::current_dir().ok()?;
    loop {
        if cursor.join(".git").is_dir() {
            return Some(cursor);
        }
        if !cursor.pop() {
            return None;
        }
    }
}

pub fn resolve_trades_dir() -> PathBuf {
    if let Ok(raw) = std::env::var("TRADES_DIR") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed).join(BOT_TRADE_DIR);
        }
    }
    if let Some(root) = resolve_repo_root() {
        return root.join("TRADES").join(BOT_TRADE_DIR);
    }
    PathBuf::from("TRADES").join(BOT_TRADE_DIR)
}

/// Append-only JSONL file, one per UTC day.
pub struct TradeJournal {
    dir: PathBuf,
    day_key: String,
    file: File,
}

impl TradeJournal {
    pub fn open(dir: PathBuf) -> std::io::Result<Self> {
        create_dir_all(&dir)?;
        let day_key = Utc::now().format("%Y-%m-%d").to_string();
        let file = Self::open_day_file(&dir, &day_key)?;
        Ok(Self { dir, day_key, file })
    }

    fn open_day_file(dir: &Path, day_key: &str) -> std::io::Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(format!("trades-{}.jsonl", day_key)))
    }

    fn rotate_if_needed(&mut self) -> std::io::Result<()> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        if today != self.day_key {
            self.file = Self::open_day_file(&self.dir, &today)?;
            self.day_key = today;
        }
        Ok(())
    }

    pub fn write_event(&mut self, event: &Value) {
        let result = (|| -> std::io::Result<()> {
            self.rotate_if_needed()?;
            writeln!(self.file, "{}", event)?;
            self.file.flush()?;
            Ok(())
        })();

        if let Err(e) = result {
            tracing::warn!("journal write failed: {}", e);
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn current_path(&self) -> PathBuf {
        self.dir.join(format!("trades-{}.jsonl", self.day_key))
    }
}

/// Engine-facing side of the journal. Only enqueues; the writer task owns
/// the file.
#[derive(Debug, Clone)]
pub struct JournalHandle {
    tx: mpsc::UnboundedSender<Value>,
}

impl JournalHandle {
    pub fn write(&self, event: Value) {
        if self.tx.send(event).is_err() {
            tracing::warn!("journal writer gone, dropping event");
        }
    }

    fn enqueue(&self, event: Value) -> anyhow::Result<()> {
        self.tx
            .send(event)
            .map_err(|_| anyhow!("journal writer gone"))
    }
}

/// Start the writer task. It exits once every handle has been dropped.
pub fn spawn_writer(mut journal: TradeJournal) -> (JournalHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    let task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            journal.write_event(&event);
        }
    });
    (JournalHandle { tx }, task)
}

impl DecisionRecorder for JournalHandle {
    fn record_decision(&self, market_id: &str, decision: &Decision) -> anyhow::Result<()> {
        self.enqueue(json!({
            "ts": now_iso(),
            "kind": "decision",
            "ticker": market_id,
            "decision": serde_json::to_value(decision)?,
        }))
    }
}

impl EventLog for JournalHandle {
    fn log_event(&self, category: &str, message: &str) -> anyhow::Result<()> {
        info!(category, "{}", message);
        self.enqueue(json!({
            "ts": now_iso(),
            "kind": "event",
            "category": category,
            "message": message,
        }))
    }
}
