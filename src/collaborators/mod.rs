//! External Collaborator Interfaces (C1)
//!
//! Abstract contracts for the non-deterministic effects activities perform:
//! LLM completion, tool execution, event publishing, agent/tool catalogue
//! lookup, and secret resolution. Activities depend on these traits, never on
//! concrete clients directly, so tests can supply fakes.

pub mod catalogue;
pub mod events;
pub mod llm;
pub mod secrets;
pub mod tasks;
pub mod tools;

pub use catalogue::{AgentConfigRecord, CatalogueClient, ToolDescriptor};
pub use events::EventPublisher;
pub use llm::{LlmCompletionClient, LlmCompletionRequest, LlmCompletionResponse};
pub use secrets::SecretResolver;
pub use tasks::{CreateTaskParams, TaskCreationClient};
pub use tools::{ToolExecutionClient, ToolExecutionRequest, ToolExecutionResponse};

use crate::messages::{Message, ToolCall, UsageInfo};

/// Sampling parameters forwarded to the LLM collaborator, all optional.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SamplingParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Normalized assistant-turn result returned by `LlmCompletionClient::complete`,
/// independent of the wire representation any given provider uses.
#[derive(Debug, Clone)]
pub struct AssistantTurn {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: UsageInfo,
    pub cost: f64,
}

/// Conveniently bundles the message history a collaborator call needs.
pub type MessageHistory = Vec<Message>;
