use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Live data prepended to the conversation. Missing sections are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatContext {
    pub status: Option<Value>,
    pub performance: Option<Value>,
    pub key_config: Option<Value>,
    pub last_decision: Option<Value>,
}

impl ChatContext {
    /// Sections separated by blank lines, with a trailing blank line when
    /// anything was rendered.
    pub fn render(&self) -> String {
        let sections = [
            ("LIVE STATUS", &self.status),
            ("TRADING PERFORMANCE", &self.performance),
            ("KEY CONFIG", &self.key_config),
            ("LAST DECISION", &self.last_decision),
        ];

        let parts: Vec<String> = sections
            .iter()
            .filter_map(|(title, value)| value.as_ref().map(|v| format!("{}:\n{:#}", title, v)))
            .collect();

        if parts.is_empty() {
            String::new()
        } else {
            format!("{}\n\n", parts.join("\n\n"))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub request_id: Uuid,
    pub message: String,
    pub history: Vec<ChatTurn>,
    pub context: ChatContext,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, context: ChatContext, history: Vec<ChatTurn>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            message: message.into(),
            history,
            context,
        }
    }
}

/// Input of the `update_config` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdateConfigInput {
    /// The config key to update (e.g., RULE_MIN_CONFIDENCE, MIN_EDGE_CENTS)
    pub setting: String,
    /// The new value for the setting
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    pub message: String,
}

impl ToolOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Applies a single setting change requested by the model.
///
/// `Ok(false)` means the key or value was rejected without an error.
pub trait ConfigUpdater: Send + Sync {
    fn update_config(&self, setting: &str, value: &Value) -> anyhow::Result<bool>;
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("API request failed: {0}")]
    ApiError(String),
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Timeout")]
    Timeout,
    #[error("Schema validation failed: {0}")]
    SchemaValidationFailed(String),
}
