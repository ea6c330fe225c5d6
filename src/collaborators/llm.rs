//! LLM completion collaborator
//!
//! `GatewayLlmClient` speaks an OpenAI-compatible `/v1/chat/completions`
//! endpoint over `reqwest`, generalizing the teacher's `TollboothClient` from
//! plain single-message completion to the structured tool-calling response
//! this engine's reasoning loop requires (assistant message + tool_calls +
//! usage + cost).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{Error, Result};
use crate::http_client;
use crate::messages::{Message, ToolCallExtractor, UsageInfo};
use crate::tollbooth;

use super::{AssistantTurn, SamplingParams};

/// A completion request sent on behalf of one `call_llm` activity invocation.
#[derive(Debug, Clone)]
pub struct LlmCompletionRequest {
    pub model_id: String,
    pub messages: Vec<Message>,
    /// Tool schemas in OpenAI function-tool format, or empty if none are offered.
    pub tools: Vec<serde_json::Value>,
    pub sampling: SamplingParams,
}

pub type LlmCompletionResponse = AssistantTurn;

/// LLM completion collaborator trait. Implementations must distinguish
/// retryable (transport/quota) from non-retryable (auth/validation) failures;
/// see `ActivityError`.
#[async_trait]
pub trait LlmCompletionClient: Send + Sync {
    async fn complete(&self, request: LlmCompletionRequest) -> Result<LlmCompletionResponse>;
}

/// OpenAI-compatible gateway client (Tollbooth-style proxy with budget
/// enforcement, routing to Anthropic/OpenAI/Google/etc. via the configured
/// `model_id` provider prefix).
#[derive(Clone)]
pub struct GatewayLlmClient {
    secret: String,
    user_id: String,
    client: reqwest::Client,
    base_url: String,
}

impl GatewayLlmClient {
    /// Create a client from `LLM_GATEWAY_URL`/`LLM_GATEWAY_SECRET`, using the
    /// system user id for background/worker-driven calls.
    pub fn from_env() -> Result<Self> {
        let secret = env::var("LLM_GATEWAY_SECRET")
            .map_err(|_| Error::Configuration("LLM_GATEWAY_SECRET not set in environment".into()))?;
        let base_url = env::var("LLM_GATEWAY_URL").unwrap_or_else(|_| {
            tracing::warn!("LLM_GATEWAY_URL not set, using default localhost:9002");
            "http://localhost:9002".to_string()
        });

        if secret.len() < crate::config::MIN_SECRET_LENGTH {
            return Err(Error::Configuration(format!(
                "LLM_GATEWAY_SECRET must be at least {} characters",
                crate::config::MIN_SECRET_LENGTH
            )));
        }

        Ok(Self {
            secret,
            user_id: tollbooth::SYSTEM_USER_ID.to_string(),
            client: http_client::tollbooth_client(),
            base_url,
        })
    }

    pub fn with_base_url(secret: String, user_id: String, base_url: String) -> Self {
        Self {
            secret,
            user_id,
            client: http_client::tollbooth_client(),
            base_url,
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<Choice>,
    usage: serde_json::Value,
    #[serde(default)]
    cost: Option<f64>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<serde_json::Value>,
}

#[async_trait]
impl LlmCompletionClient for GatewayLlmClient {
    async fn complete(&self, request: LlmCompletionRequest) -> Result<LlmCompletionResponse> {
        use crate::messages::MessageBuilder;

        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(MessageBuilder::normalize_for_provider)
            .collect();

        let chat_request = ChatCompletionRequest {
            model: request.model_id.clone(),
            messages,
            tools: request.tools,
            temperature: request.sampling.temperature,
            max_tokens: request.sampling.max_tokens,
            stream: false,
        };

        let response = tollbooth::with_tollbooth_auth(
            self.client
                .post(format!("{}/v1/chat/completions", self.base_url)),
            &self.user_id,
            &self.secret,
        )
        .header("Content-Type", "application/json")
        .json(&chat_request)
        .send()
        .await
        .map_err(|e| Error::LlmCallFailed(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error response".to_string());
            if status.as_u16() == 401 || status.as_u16() == 403 || status.as_u16() == 422 {
                return Err(Error::LlmCallFailed(format!(
                    "non-retryable gateway error ({status}): {error_text}"
                )));
            }
            return Err(Error::LlmCallFailed(format!(
                "gateway error ({status}): {error_text}"
            )));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::LlmCallFailed(format!("failed to parse response: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::LlmCallFailed("no choices in gateway response".into()))?;

        let tool_calls = ToolCallExtractor::extract_tool_calls(choice.message.tool_calls.as_ref());
        let (usage, cost) = crate::messages::extract_usage_info(&parsed.usage, parsed.cost);

        tracing::debug!(model = %parsed.model, cost, "LLM completion received");

        Ok(AssistantTurn {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage,
            cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "this-is-a-test-secret-32-chars!!";

    #[test]
    fn from_env_rejects_missing_secret() {
        std::env::remove_var("LLM_GATEWAY_SECRET");
        assert!(GatewayLlmClient::from_env().is_err());
    }

    #[test]
    fn with_base_url_sets_fields() {
        let client = GatewayLlmClient::with_base_url(
            TEST_SECRET.to_string(),
            "test-user".to_string(),
            "https://gateway.example.com".to_string(),
        );
        assert_eq!(client.base_url, "https://gateway.example.com");
    }
}
