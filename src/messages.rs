//! Message & Tool-Call Helpers (C5)
//!
//! System prompt construction, tool-call extraction, message/config validation,
//! and usage/cost extraction from raw LLM responses.

use serde::{Deserialize, Serialize};

use crate::budget::FALLBACK_COST_PER_TOKEN;
use crate::error::{Error, Result};

/// Reserved tool name that signals the goal has been achieved. Never
/// dispatched to a real tool server.
pub const COMPLETION_SENTINEL: &str = "completion";

/// Accepted alias for the completion sentinel; canonicalized to
/// `COMPLETION_SENTINEL` before any state mutation or event is recorded.
pub const COMPLETION_SENTINEL_ALIAS: &str = "task_complete";

/// Canonicalize a tool name so downstream dispatch only ever sees `completion`.
pub fn canonicalize_tool_name(name: &str) -> String {
    if name == COMPLETION_SENTINEL_ALIAS {
        COMPLETION_SENTINEL.to_string()
    } else {
        name.to_string()
    }
}

pub fn is_completion_sentinel(name: &str) -> bool {
    canonicalize_tool_name(name) == COMPLETION_SENTINEL
}

/// Conversation role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One message in the conversation. Insertion order is conversation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Free-form metadata, e.g. `{"type": "human_feedback"}`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<serde_json::Value>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_call_id: None,
            name: None,
            tool_calls: None,
            metadata: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call_id: None,
            name: None,
            tool_calls: None,
            metadata: None,
        }
    }

    pub fn user_with_metadata(content: impl Into<String>, metadata: serde_json::Value) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call_id: None,
            name: None,
            tool_calls: None,
            metadata: Some(metadata),
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            name: None,
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            metadata: None,
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            tool_calls: None,
            metadata: None,
        }
    }

    /// Whether this message should be appended to `state.messages`. Empty
    /// assistant messages with no tool calls are not appended (§8 boundary
    /// behavior) but every other role always is.
    pub fn is_appendable(&self) -> bool {
        match self.role {
            Role::Assistant => !self.content.is_empty() || self.tool_calls.is_some(),
            _ => true,
        }
    }
}

/// A structured tool-call request emitted by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "default_tool_call_type")]
    pub call_type: String,
    pub function: ToolCallFunction,
}

fn default_tool_call_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    /// JSON-encoded argument string, as returned by the LLM.
    #[serde(default = "default_arguments")]
    pub arguments: String,
}

fn default_arguments() -> String {
    "{}".to_string()
}

/// Extracts tool calls from a raw LLM response payload.
pub struct ToolCallExtractor;

impl ToolCallExtractor {
    /// Given the assistant message's raw `tool_calls` JSON array (or absent),
    /// produce an ordered list of `ToolCall` records. Missing `id` defaults to
    /// `call_<index>`; missing `arguments` defaults to `"{}"`.
    pub fn extract_tool_calls(raw: Option<&serde_json::Value>) -> Vec<ToolCall> {
        let Some(raw) = raw else {
            return Vec::new();
        };
        let Some(items) = raw.as_array() else {
            return Vec::new();
        };

        items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                let function = item.get("function")?;
                let name = function.get("name")?.as_str()?.to_string();
                let arguments = function
                    .get("arguments")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(default_arguments);
                let id = item
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("call_{i}"));
                let call_type = item
                    .get("type")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(default_tool_call_type);

                Some(ToolCall {
                    id,
                    call_type,
                    function: ToolCallFunction { name, arguments },
                })
            })
            .collect()
    }
}

/// Token usage extracted from an LLM response.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageInfo {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Given a raw usage payload and an optional provider-reported cost, extract
/// token counts and compute cost, falling back to `total_tokens * rate` when
/// the provider doesn't report cost directly.
pub fn extract_usage_info(raw: &serde_json::Value, reported_cost: Option<f64>) -> (UsageInfo, f64) {
    let prompt_tokens = raw.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
    let completion_tokens = raw
        .get("completion_tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let total_tokens = raw
        .get("total_tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or(prompt_tokens + completion_tokens);

    let usage = UsageInfo {
        prompt_tokens,
        completion_tokens,
        total_tokens,
    };

    let cost = reported_cost.unwrap_or_else(|| total_tokens as f64 * FALLBACK_COST_PER_TOKEN);
    (usage, cost)
}

/// Builds the system/user message scaffolding for each iteration.
pub struct MessageBuilder;

impl MessageBuilder {
    /// Compose the system message: agent name, instruction, goal description,
    /// bulleted success criteria, and a tool inventory (name + description).
    pub fn build_system_message(
        agent_name: &str,
        agent_instruction: &str,
        goal_description: &str,
        success_criteria: &[String],
        tools: &[(String, String)],
    ) -> Message {
        let mut text = format!("You are {agent_name}.\n\n{agent_instruction}\n\nGoal: {goal_description}\n");

        if !success_criteria.is_empty() {
            text.push_str("\nSuccess criteria:\n");
            for criterion in success_criteria {
                text.push_str(&format!("- {criterion}\n"));
            }
        }

        if !tools.is_empty() {
            text.push_str("\nAvailable tools:\n");
            for (name, description) in tools {
                text.push_str(&format!("- {name}: {description}\n"));
            }
        }

        Message::system(text)
    }

    /// The initial user message on iteration 1 carries the goal verbatim.
    pub fn build_initial_user_message(goal_description: &str) -> Message {
        Message::user(goal_description)
    }

    /// Later iterations insert a short status message instead of repeating the goal.
    pub fn build_status_message(iteration: u32, max_iterations: u32, budget_remaining: f64) -> Message {
        Message::user(format!(
            "Status: iteration {iteration}/{max_iterations} | Budget remaining: ${budget_remaining:.2}"
        ))
    }

    /// Strip null/absent fields before sending a message to the LLM collaborator,
    /// keeping only the keys a chat-completions provider accepts.
    pub fn normalize_for_provider(message: &Message) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("role".to_string(), serde_json::json!(message.role));
        obj.insert("content".to_string(), serde_json::json!(message.content));
        if let Some(id) = &message.tool_call_id {
            obj.insert("tool_call_id".to_string(), serde_json::json!(id));
        }
        if let Some(name) = &message.name {
            obj.insert("name".to_string(), serde_json::json!(name));
        }
        if let Some(tool_calls) = &message.tool_calls {
            obj.insert("tool_calls".to_string(), serde_json::json!(tool_calls));
        }
        serde_json::Value::Object(obj)
    }
}

/// Validates agent config, tool, and goal records before the workflow proceeds.
pub struct StateValidator;

impl StateValidator {
    /// Requires `id`, `name`, `model_id`.
    pub fn validate_agent_config(config: &serde_json::Value) -> Result<()> {
        for field in ["id", "name", "model_id"] {
            match config.get(field) {
                Some(v) if !v.is_null() && v.as_str().map(|s| !s.is_empty()).unwrap_or(true) => {}
                _ => {
                    return Err(Error::AgentConfigInvalid(format!(
                        "agent config missing required field `{field}`"
                    )))
                }
            }
        }
        Ok(())
    }

    /// Accepts either the OpenAI function-tool schema
    /// (`{type: "function", function: {name, description}}`) or a flat
    /// `{name, description}` record. An empty list is valid.
    pub fn validate_tools(tools: &[serde_json::Value]) -> Result<()> {
        for tool in tools {
            let has_flat = tool.get("name").and_then(|v| v.as_str()).is_some()
                && tool.get("description").is_some();
            let has_function_schema = tool
                .get("function")
                .and_then(|f| f.get("name"))
                .and_then(|v| v.as_str())
                .is_some();

            if !has_flat && !has_function_schema {
                return Err(Error::ToolsInvalid(format!(
                    "tool record missing name/description: {tool}"
                )));
            }
        }
        Ok(())
    }

    /// Requires non-empty `description`, non-empty `success_criteria`, and a
    /// positive `max_iterations`.
    pub fn validate_goal(
        description: &str,
        success_criteria: &[String],
        max_iterations: u32,
    ) -> Result<()> {
        if description.is_empty() {
            return Err(Error::AgentConfigInvalid("goal description is empty".into()));
        }
        if success_criteria.is_empty() {
            return Err(Error::AgentConfigInvalid(
                "goal has no success criteria".into(),
            ));
        }
        if max_iterations == 0 {
            return Err(Error::AgentConfigInvalid(
                "goal max_iterations must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_task_complete_alias() {
        assert_eq!(canonicalize_tool_name("task_complete"), "completion");
        assert_eq!(canonicalize_tool_name("search"), "search");
        assert!(is_completion_sentinel("task_complete"));
        assert!(is_completion_sentinel("completion"));
        assert!(!is_completion_sentinel("search"));
    }

    #[test]
    fn empty_assistant_message_not_appendable() {
        let msg = Message::assistant("", vec![]);
        assert!(!msg.is_appendable());
    }

    #[test]
    fn assistant_message_with_tool_calls_is_appendable() {
        let call = ToolCall {
            id: "call_0".into(),
            call_type: "function".into(),
            function: ToolCallFunction {
                name: "search".into(),
                arguments: "{}".into(),
            },
        };
        let msg = Message::assistant("", vec![call]);
        assert!(msg.is_appendable());
    }

    #[test]
    fn extract_tool_calls_defaults_id_and_arguments() {
        let raw = serde_json::json!([
            {"function": {"name": "search"}},
            {"id": "explicit", "function": {"name": "search", "arguments": "{\"q\":1}"}}
        ]);
        let calls = ToolCallExtractor::extract_tool_calls(Some(&raw));
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "call_0");
        assert_eq!(calls[0].function.arguments, "{}");
        assert_eq!(calls[1].id, "explicit");
    }

    #[test]
    fn extract_tool_calls_empty_when_absent() {
        assert!(ToolCallExtractor::extract_tool_calls(None).is_empty());
    }

    #[test]
    fn usage_cost_falls_back_to_token_rate() {
        let raw = serde_json::json!({"prompt_tokens": 100, "completion_tokens": 50, "total_tokens": 150});
        let (usage, cost) = extract_usage_info(&raw, None);
        assert_eq!(usage.total_tokens, 150);
        assert!((cost - 150.0 * FALLBACK_COST_PER_TOKEN).abs() < 1e-12);
    }

    #[test]
    fn usage_cost_prefers_reported_value() {
        let raw = serde_json::json!({"total_tokens": 150});
        let (_, cost) = extract_usage_info(&raw, Some(0.5));
        assert_eq!(cost, 0.5);
    }

    #[test]
    fn validate_agent_config_requires_fields() {
        assert!(StateValidator::validate_agent_config(&serde_json::json!({
            "id": "a", "name": "Agent", "model_id": "m"
        }))
        .is_ok());
        assert!(StateValidator::validate_agent_config(&serde_json::json!({"id": "a"})).is_err());
    }

    #[test]
    fn validate_tools_accepts_both_schemas_and_empty() {
        assert!(StateValidator::validate_tools(&[]).is_ok());
        assert!(StateValidator::validate_tools(&[serde_json::json!({
            "name": "search", "description": "..."
        })])
        .is_ok());
        assert!(StateValidator::validate_tools(&[serde_json::json!({
            "type": "function",
            "function": {"name": "search", "description": "..."}
        })])
        .is_ok());
        assert!(StateValidator::validate_tools(&[serde_json::json!({"foo": "bar"})]).is_err());
    }

    #[test]
    fn validate_goal_requires_non_empty_fields_and_positive_iterations() {
        assert!(StateValidator::validate_goal("do it", &["done".to_string()], 1).is_ok());
        assert!(StateValidator::validate_goal("", &["done".to_string()], 1).is_err());
        assert!(StateValidator::validate_goal("do it", &[], 1).is_err());
        assert!(StateValidator::validate_goal("do it", &["done".to_string()], 0).is_err());
    }
}
