//! Strike rules bot: replays a market tape through the rule-based decision
//! engine, journals every decision, and optionally answers operator questions
//! through the advisor.

mod advisor;
mod bot;
mod config;
mod journal;
mod tape;
mod tunables;

use std::path::PathBuf;

use anyhow::Result;
use bot::{Bot, RunOptions};
use clap::Parser;
use config::AppConfig;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "strike-rules-bot", about = "Rule-based YES/NO/HOLD bot for BTC strike contracts")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// JSONL market tape; overrides trading.tape_path.
    #[arg(long)]
    tape: Option<PathBuf>,

    /// Skip the poll interval between frames.
    #[arg(long)]
    fast: bool,

    /// Read advisor questions from stdin while running.
    #[arg(long)]
    chat: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "strike_rules_bot=info,decision_engine=info,llm_client=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    let config = if cli.config.exists() {
        AppConfig::load(&cli.config)?
    } else {
        warn!("{} not found, using defaults", cli.config.display());
        AppConfig::default()
    };
    info!("Loaded configuration: {:?}", config);

    let options = RunOptions {
        tape: cli.tape.unwrap_or_else(|| config.trading.tape_path.clone()),
        fast: cli.fast,
        chat: cli.chat,
    };

    let bot = Bot::new(config, options).await?;
    let status = bot.run().await?;
    info!("Final status: {:?}", status);

    Ok(())
}
