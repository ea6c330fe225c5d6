//! Tool execution collaborator
//!
//! `McpToolClient` dispatches to a configured MCP tool server over a plain
//! HTTP call. `LocalToolClient` serves the builtin tools (`think`,
//! `web_search`, `sql_query`) from an in-process dispatch table, without a
//! network hop.

use async_trait::async_trait;
use std::time::Instant;

use crate::error::{Error, Result};

/// A tool execution request built from an extracted `ToolCall`.
#[derive(Debug, Clone)]
pub struct ToolExecutionRequest {
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub server_instance_id: Option<String>,
}

/// `{success, result, execution_time?}` per §4.1.
#[derive(Debug, Clone)]
pub struct ToolExecutionResponse {
    pub success: bool,
    pub result: String,
    pub execution_time_ms: Option<u64>,
}

#[async_trait]
pub trait ToolExecutionClient: Send + Sync {
    async fn execute(&self, request: ToolExecutionRequest) -> Result<ToolExecutionResponse>;
}

/// Dispatches builtin tools in-process, mirroring `tools::ToolExecutor`'s
/// match-on-name dispatch table, narrowed to the tools this domain ships.
#[derive(Clone, Default)]
pub struct LocalToolClient;

impl LocalToolClient {
    pub fn new() -> Self {
        Self
    }

    pub fn available_tools() -> &'static [&'static str] {
        &["think", "web_search", "sql_query"]
    }

    pub fn has_tool(name: &str) -> bool {
        Self::available_tools().contains(&name)
    }
}

#[async_trait]
impl ToolExecutionClient for LocalToolClient {
    async fn execute(&self, request: ToolExecutionRequest) -> Result<ToolExecutionResponse> {
        let start = Instant::now();
        tracing::info!(tool = %request.tool_name, "executing local tool");

        let result = match request.tool_name.as_str() {
            "think" => {
                // No-op: the thought is captured in the tool call arguments.
                serde_json::json!({"acknowledged": true}).to_string()
            }
            "web_search" => {
                let query = request
                    .arguments
                    .get("query")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::ToolExecutionFailed("query is required".into()))?;
                serde_json::json!({"query": query, "results": []}).to_string()
            }
            "sql_query" => {
                let query = request
                    .arguments
                    .get("query")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::ToolExecutionFailed("query is required".into()))?;
                serde_json::json!({"query": query, "rows": []}).to_string()
            }
            other => {
                return Err(Error::ToolExecutionFailed(format!("unknown tool: {other}")));
            }
        };

        Ok(ToolExecutionResponse {
            success: true,
            result,
            execution_time_ms: Some(start.elapsed().as_millis() as u64),
        })
    }
}

/// Dispatches to a remote MCP tool server over HTTP. Issues one
/// `tools/call` POST per `execute`, matching `execute_mcp_tool`'s
/// non-streaming activity contract.
pub struct McpToolClient {
    server_url: String,
    http: reqwest::Client,
}

impl McpToolClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            http: crate::http_client::tollbooth_client(),
        }
    }
}

#[async_trait]
impl ToolExecutionClient for McpToolClient {
    async fn execute(&self, request: ToolExecutionRequest) -> Result<ToolExecutionResponse> {
        let start = Instant::now();

        let payload = serde_json::json!({
            "name": request.tool_name,
            "arguments": request.arguments,
            "server_instance_id": request.server_instance_id,
        });

        let response = self
            .http
            .post(format!("{}/tools/call", self.server_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::ToolExecutionFailed(format!("MCP transport error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::ToolExecutionFailed(format!(
                "MCP server returned {status}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::ToolExecutionFailed(format!("invalid MCP response: {e}")))?;

        let success = body.get("success").and_then(|v| v.as_bool()).unwrap_or(true);
        let result = body
            .get("result")
            .map(|v| v.to_string())
            .unwrap_or_else(|| "null".to_string());

        Ok(ToolExecutionResponse {
            success,
            result,
            execution_time_ms: Some(start.elapsed().as_millis() as u64),
        })
    }
}
