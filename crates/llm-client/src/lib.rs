pub mod client;
pub mod types;

pub use client::{AdvisorClient, DEFAULT_MODEL, UPDATE_CONFIG_TOOL};
pub use types::{
    ChatContext, ChatError, ChatRequest, ChatRole, ChatTurn, ConfigUpdater, ToolOutcome,
    UpdateConfigInput,
};
