use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;

use decision_engine::RuleStore;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use llm_client::{AdvisorClient, ChatRequest, ConfigUpdater};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::LlmConfig;
use crate::tunables::TunablesFile;

pub const UNAVAILABLE_REPLY: &str = "Chat requires ANTHROPIC_API_KEY to be set.";
pub const RATE_LIMITED_REPLY: &str = "Advisor is busy, try again in a minute.";

#[derive(Debug, Clone, PartialEq)]
pub enum ChatReply {
    Answer(String),
    Unavailable,
    RateLimited,
}

impl fmt::Display for ChatReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatReply::Answer(text) => write!(f, "{}", text),
            ChatReply::Unavailable => write!(f, "{}", UNAVAILABLE_REPLY),
            ChatReply::RateLimited => write!(f, "{}", RATE_LIMITED_REPLY),
        }
    }
}

pub enum Advisor {
    Available {
        client: AdvisorClient,
        limiter: DefaultDirectRateLimiter,
    },
    Unavailable,
}

impl Advisor {
    pub fn from_config(config: &LlmConfig, api_key: Option<String>) -> anyhow::Result<Self> {
        let Some(api_key) = api_key.filter(|k| !k.trim().is_empty()) else {
            info!("advisor disabled: ANTHROPIC_API_KEY not set");
            return Ok(Advisor::Unavailable);
        };
        if !config.enabled {
            info!("advisor disabled by config");
            return Ok(Advisor::Unavailable);
        }

        let client = AdvisorClient::new(
            api_key,
            config.model.clone(),
            config.timeout_ms,
            config.max_retries,
        )?;
        Ok(Self::with_client(client, config.max_calls_per_minute))
    }

    pub fn with_client(client: AdvisorClient, max_calls_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(max_calls_per_minute).unwrap_or(NonZeroU32::MIN);
        Advisor::Available {
            client,
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Advisor::Available { .. })
    }

    pub async fn chat(
        &self,
        request: &ChatRequest,
        updater: Option<&dyn ConfigUpdater>,
    ) -> ChatReply {
        let Advisor::Available { client, limiter } = self else {
            return ChatReply::Unavailable;
        };
        if limiter.check().is_err() {
            return ChatReply::RateLimited;
        }

        match client.chat(request, updater).await {
            Ok(text) => ChatReply::Answer(text),
            Err(e) => {
                warn!("advisor call failed: {}", e);
                ChatReply::Answer(format!("Error: {}", e))
            }
        }
    }
}

/// Routes `update_config` tool calls into the rule store and persists them.
pub struct RuleStoreUpdater {
    rules: Arc<RuleStore>,
    tunables: TunablesFile,
}

impl RuleStoreUpdater {
    pub fn new(rules: Arc<RuleStore>, tunables: TunablesFile) -> Self {
        Self { rules, tunables }
    }
}

impl ConfigUpdater for RuleStoreUpdater {
    fn update_config(&self, setting: &str, value: &Value) -> anyhow::Result<bool> {
        let applied = self
            .rules
            .apply(&BTreeMap::from([(setting.to_string(), value.clone())]));
        if applied.is_empty() {
            return Ok(false);
        }
        self.tunables.save(&self.rules)?;
        Ok(true)
    }
}
