//! JSONL market tape driving the polling loop.
//!
//! Each line is one polling cycle: a market snapshot plus, optionally, the
//! raw alpha payloads computed for it.

use std::path::Path;

use anyhow::Context;
use decision_engine::{MarketSnapshot, RawFairValue, RawVelocity, RawVolatility, StaticSignals};
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct AlphaFrame {
    pub fair_value: RawFairValue,
    pub volatility: RawVolatility,
    pub velocity: RawVelocity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TapeFrame {
    pub market: MarketSnapshot,
    #[serde(default)]
    pub alpha: Option<AlphaFrame>,
}

impl TapeFrame {
    /// Validated provider for this frame; `None` if absent or invalid.
    pub fn signals(&self) -> Option<StaticSignals> {
        let alpha = self.alpha.clone()?;
        match StaticSignals::from_raw(alpha.fair_value, alpha.volatility, alpha.velocity) {
            Ok(signals) => Some(signals),
            Err(e) => {
                warn!("invalid alpha for {}: {}", self.market.ticker, e);
                None
            }
        }
    }
}

pub struct Tape {
    reader: BufReader<File>,
    buf: Vec<u8>,
    line_no: usize,
}

impl Tape {
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .await
            .with_context(|| format!("opening tape {}", path.display()))?;
        Ok(Self {
            reader: BufReader::new(file),
            buf: Vec::new(),
            line_no: 0,
        })
    }

    /// Next well-formed frame. Blank, non-UTF-8 and malformed lines are
    /// skipped; only I/O failures end the tape with an error.
    pub async fn next_frame(&mut self) -> anyhow::Result<Option<TapeFrame>> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = match std::str::from_utf8(&self.buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    warn!("skipping tape line {}: {}", self.line_no, e);
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<TapeFrame>(line) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => warn!("skipping tape line {}: {}", self.line_no, e),
            }
        }
    }
}
