use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use decision_engine::RuleConfig;
use serde::Deserialize;

pub const POLL_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 3..=120;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub trading: TradingConfig,
    /// Seeds the rule store; values are clamped like any other update.
    #[serde(default)]
    pub rules: RuleConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_tape_path")]
    pub tape_path: PathBuf,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            tape_path: default_tape_path(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_tape_path() -> PathBuf {
    PathBuf::from("tape.jsonl")
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_calls_per_minute")]
    pub max_calls_per_minute: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            model: default_model(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            max_calls_per_minute: default_max_calls_per_minute(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    llm_client::DEFAULT_MODEL.to_string()
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_max_calls_per_minute() -> u32 {
    6
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JournalConfig {
    /// Overrides `TRADES_DIR` and the repo-root default.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !POLL_INTERVAL_RANGE.contains(&self.trading.poll_interval_secs) {
            bail!(
                "trading.poll_interval_secs={} must be within {}..={}",
                self.trading.poll_interval_secs,
                POLL_INTERVAL_RANGE.start(),
                POLL_INTERVAL_RANGE.end()
            );
        }
        if self.llm.timeout_ms == 0 {
            bail!("llm.timeout_ms must be positive");
        }
        if self.llm.max_calls_per_minute == 0 {
            bail!("llm.max_calls_per_minute must be positive");
        }
        Ok(())
    }
}
