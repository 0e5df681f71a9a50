use std::collections::BTreeMap;
use std::fs::{create_dir_all, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use decision_engine::{RuleStore, TunableValue};
use serde_json::Value;
use tracing::{info, warn};

pub const TUNABLES_FILE: &str = "tunables.json";

/// Operator-tuned rule values that survive restarts.
#[derive(Debug, Clone)]
pub struct TunablesFile {
    path: PathBuf,
}

impl TunablesFile {
    pub fn new(trades_dir: &Path) -> Self {
        Self {
            path: trades_dir.join(TUNABLES_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, rules: &RuleStore) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(&rules.tunables())?;
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&self.path)?;
        file.write_all(data.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Re-apply saved values through the store's clamping path. A missing
    /// file is normal; an unreadable one is logged and ignored.
    pub fn restore(&self, rules: &RuleStore) -> BTreeMap<String, TunableValue> {
        if !self.path.exists() {
            return BTreeMap::new();
        }

        let saved = std::fs::read_to_string(&self.path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| Ok(serde_json::from_str::<BTreeMap<String, Value>>(&raw)?));

        match saved {
            Ok(values) => {
                let applied = rules.apply(&values);
                info!(
                    "restored {} tunables from {}",
                    applied.len(),
                    self.path.display()
                );
                applied
            }
            Err(e) => {
                warn!("ignoring unreadable {}: {:#}", self.path.display(), e);
                BTreeMap::new()
            }
        }
    }
}
