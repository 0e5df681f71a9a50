use crate::types::{
    ChatError, ChatRequest, ChatRole, ChatTurn, ConfigUpdater, ToolOutcome, UpdateConfigInput,
};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
pub const UPDATE_CONFIG_TOOL: &str = "update_config";
const FIRST_MAX_TOKENS: u32 = 800;
const FOLLOW_UP_MAX_TOKENS: u32 = 400;
const EMPTY_REPLY: &str = "I couldn't generate a response.";

const SYSTEM_PROMPT: &str = r#"You are the AI advisor for a rule-based trading bot on 15-minute binary BTC strike contracts. You have access to live data about the bot's performance, current market conditions, and configuration.

Your role is to:
1. Answer questions about current market conditions and the bot's decisions
2. Analyze trading performance and suggest improvements
3. Recommend config adjustments based on observed patterns
4. Explain why the bot is making certain decisions
5. USE THE update_config TOOL when the user asks you to change settings

Key concepts:
- YES/NO are binary outcomes based on whether BTC is above/below the strike at settlement
- Edge = fair value - market price (positive edge means opportunity)
- Near expiry the side BTC currently favors is weighted up and the other side down
- Confidence threshold determines whether to trade

Available config parameters you can change:
- MIN_EDGE_CENTS: Minimum edge in cents to trade (1-30, default 3)
- RULE_MIN_CONFIDENCE: Minimum confidence to trade (0.3-0.95, default 0.6)
- RULE_SIT_OUT_LOW_VOL: Hold in low volatility (1 = on, 0 = off, default 1)
- TREND_FOLLOW_VELOCITY: Velocity in $/s that counts as momentum (0.5-20, default 2.0)

When asked to change settings, USE THE TOOL - don't just suggest changes. After changing, confirm what you changed."#;

pub struct AdvisorClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl AdvisorClient {
    pub fn new(
        api_key: String,
        model: String,
        timeout_ms: u64,
        max_retries: u32,
    ) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ChatError::ApiError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: ANTHROPIC_BASE_URL.to_string(),
            api_key,
            model,
            max_retries,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn update_config_tool() -> Result<Value, ChatError> {
        let mut schema = serde_json::to_value(schemars::schema_for!(UpdateConfigInput))?;
        if let Some(obj) = schema.as_object_mut() {
            obj.remove("$schema");
            obj.remove("title");
        }

        Ok(json!({
            "name": UPDATE_CONFIG_TOOL,
            "description": "Update a bot configuration setting. Use this when the user asks to change a setting.",
            "input_schema": schema
        }))
    }

    /// Live context rides on the first user turn; the new question goes last.
    pub fn build_messages(request: &ChatRequest) -> Vec<Value> {
        let context = request.context.render();

        if request.history.is_empty() {
            return vec![json!({
                "role": "user",
                "content": format!("{}USER QUESTION: {}", context, request.message)
            })];
        }

        let mut messages = Vec::with_capacity(request.history.len() + 1);
        let mut turns = request.history.iter();
        if let Some(first) = request.history.first() {
            if first.role == ChatRole::User {
                messages.push(json!({
                    "role": "user",
                    "content": format!("{}{}", context, first.content)
                }));
                turns.next();
            }
        }
        messages.extend(turns.map(|turn: &ChatTurn| json!(turn)));
        messages.push(json!({"role": "user", "content": request.message}));
        messages
    }

    fn content_blocks(response_body: &Value) -> Result<&Vec<Value>, ChatError> {
        response_body
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                ChatError::SchemaValidationFailed("Missing or invalid 'content' field".into())
            })
    }

    fn run_tool(block: &Value, updater: Option<&dyn ConfigUpdater>) -> ToolOutcome {
        let input = &block["input"];
        let setting = input["setting"].as_str().filter(|s| !s.is_empty());
        let value = input.get("value").filter(|v| !v.is_null());

        let (Some(updater), Some(setting), Some(value)) = (updater, setting, value) else {
            return ToolOutcome::failed("No config updater available");
        };

        match updater.update_config(setting, value) {
            Ok(true) => ToolOutcome {
                success: true,
                message: format!("Updated {} to {}", setting, value),
            },
            Ok(false) => ToolOutcome::failed(format!("Failed to update {}", setting)),
            Err(e) => ToolOutcome::failed(e.to_string()),
        }
    }

    #[instrument(skip(self, request, updater), fields(request_id = %request.request_id))]
    pub async fn chat(
        &self,
        request: &ChatRequest,
        updater: Option<&dyn ConfigUpdater>,
    ) -> Result<String, ChatError> {
        let mut messages = Self::build_messages(request);

        let payload = json!({
            "model": self.model,
            "max_tokens": FIRST_MAX_TOKENS,
            "system": SYSTEM_PROMPT,
            "tools": [Self::update_config_tool()?],
            "messages": messages
        });
        let response_body = self.post(&payload).await?;
        let content = Self::content_blocks(&response_body)?;

        let mut text = String::new();
        let mut tool_results = Vec::new();
        for block in content {
            match block["type"].as_str() {
                Some("text") => text.push_str(block["text"].as_str().unwrap_or_default()),
                Some("tool_use") if block["name"] == UPDATE_CONFIG_TOOL => {
                    let outcome = Self::run_tool(block, updater);
                    debug!(success = outcome.success, "{}", outcome.message);
                    tool_results.push(json!({
                        "type": "tool_result",
                        "tool_use_id": block["id"],
                        "content": serde_json::to_string(&outcome)?
                    }));
                }
                _ => {}
            }
        }

        if tool_results.is_empty() {
            let text = text.trim();
            return Ok(if text.is_empty() {
                EMPTY_REPLY.to_string()
            } else {
                text.to_string()
            });
        }

        messages.push(json!({"role": "assistant", "content": content}));
        messages.push(json!({"role": "user", "content": tool_results}));

        let follow_up = json!({
            "model": self.model,
            "max_tokens": FOLLOW_UP_MAX_TOKENS,
            "system": SYSTEM_PROMPT,
            "messages": messages
        });
        let response_body = self.post(&follow_up).await?;

        Self::content_blocks(&response_body)?
            .iter()
            .find(|item| item["type"] == "text")
            .and_then(|item| item["text"].as_str())
            .map(|text| text.trim().to_string())
            .ok_or_else(|| ChatError::SchemaValidationFailed("Missing 'text' content".into()))
    }

    async fn post(&self, payload: &Value) -> Result<Value, ChatError> {
        let url = format!("{}/v1/messages", self.base_url);
        let mut attempt = 0u32;
        loop {
            let send_result = self
                .client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .json(payload)
                .send()
                .await;

            match send_result {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        if status.as_u16() == 429 && attempt < self.max_retries {
                            attempt += 1;
                            warn!("advisor rate limited, retry {}/{}", attempt, self.max_retries);
                            sleep(Duration::from_millis(150 * u64::from(attempt))).await;
                            continue;
                        }
                        return Err(ChatError::HttpStatus {
                            status: status.as_u16(),
                            body,
                        });
                    }

                    return response
                        .json()
                        .await
                        .map_err(|e| ChatError::ApiError(e.to_string()));
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        attempt += 1;
                        sleep(Duration::from_millis(150 * u64::from(attempt))).await;
                        continue;
                    }
                    if e.is_timeout() {
                        return Err(ChatError::Timeout);
                    }
                    return Err(ChatError::ApiError(e.to_string()));
                }
            }
        }
    }
}
