//! Built-in tool registry
//!
//! This module defines BUILT-IN tools that ship with the agent executor.
//! These are executed as native Rust functions via `LocalToolClient`.
//!
//! MCP tools (user-connected) are executed via the MCP protocol by
//! `McpToolClient` instead and have no entry here.
//!
//! # Tool Types
//!
//! - `builtin` - Native Rust implementation (think, web_search, sql_query)
//! - `mcp` - MCP protocol (user-connected servers, resolved at runtime)

use serde::{Deserialize, Serialize};

/// Tool type - distinguishes built-in vs MCP tools
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    /// Built-in tool - native Rust implementation
    Builtin,
    /// MCP tool - executed via MCP protocol
    Mcp,
}

/// Tool category for UI grouping
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Search,
    Data,
}

/// Built-in tool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolConfig {
    /// Unique tool identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Short description for UI
    pub description: String,
    /// Detailed description for LLM (helps model decide when to use)
    pub llm_description: String,
    /// JSON Schema for parameters
    pub parameters: serde_json::Value,
    /// Tool type (builtin for registry tools)
    pub tool_type: ToolType,
    /// Category for grouping in UI
    pub category: ToolCategory,
    /// Iconify icon name
    pub icon: String,
    /// Display order in UI
    pub display_order: i32,
}

/// Get default built-in tool configurations
///
/// These are the core tools that ship with the agent executor:
/// - think: structured reasoning scratchpad
/// - web_search: search the web for current information
/// - sql_query: read-only SQL queries against a data source
pub fn default_tools() -> Vec<ToolConfig> {
    vec![think_tool(), web_search_tool(), sql_query_tool()]
}

/// Think tool - structured reasoning scratchpad
fn think_tool() -> ToolConfig {
    ToolConfig {
        id: "think".to_string(),
        name: "Think".to_string(),
        description: "Plan your approach before acting".to_string(),
        llm_description: r#"Use this tool to think through complex problems step-by-step before taking action.

When to use:
- Before multi-step tasks: plan which tools to call and in what order
- When the question is ambiguous: break down what the goal is really asking
- When combining sources: plan how to merge results from different tools

This tool has no side effects - it just helps you organize your reasoning.
The caller can see your thoughts, so be clear and concise."#.to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "required": ["thought"],
            "properties": {
                "thought": {
                    "type": "string",
                    "description": "Your step-by-step reasoning or plan"
                }
            }
        }),
        tool_type: ToolType::Builtin,
        category: ToolCategory::Data,
        icon: "ri:lightbulb-line".to_string(),
        display_order: 0,
    }
}

/// Web Search tool
fn web_search_tool() -> ToolConfig {
    ToolConfig {
        id: "web_search".to_string(),
        name: "Web Search".to_string(),
        description: "Search the web for current information".to_string(),
        llm_description: r#"Search the web for current information.

Use this tool when:
- The goal asks about recent events, news, or current information
- You need factual information you're uncertain about
- Information might have changed since your training cutoff

Do NOT use when:
- The question is purely conversational or opinion-based
- A sql_query against the available data source would answer it directly

Returns: relevant web pages with titles, URLs, and summaries."#.to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query - be specific and include relevant context"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Number of results (1-10)",
                    "default": 5,
                    "minimum": 1,
                    "maximum": 10
                }
            }
        }),
        tool_type: ToolType::Builtin,
        category: ToolCategory::Search,
        icon: "ri:search-line".to_string(),
        display_order: 1,
    }
}

/// SQL Query tool (read-only data access)
fn sql_query_tool() -> ToolConfig {
    ToolConfig {
        id: "sql_query".to_string(),
        name: "Query Data".to_string(),
        description: "Query the configured data source with SQL".to_string(),
        llm_description: r#"Execute read-only SQL queries against the configured data source.

Operations:
- 'list_tables': get all tables with row counts
- 'get_schema': get detailed columns for specific table(s)
- 'query': execute a SELECT query (read-only, max 200 rows)

Use 'get_schema' to see columns before writing a query. Always LIMIT results."#.to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "required": ["operation"],
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["query", "list_tables", "get_schema"],
                    "description": "Operation to perform"
                },
                "sql": {
                    "type": "string",
                    "description": "SQL query (required for 'query' operation). SELECT only, read-only."
                },
                "tables": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Table name(s) to get schema for (required for 'get_schema' operation)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Max rows to return (default 50, max 200)",
                    "default": 50,
                    "maximum": 200
                }
            }
        }),
        tool_type: ToolType::Builtin,
        category: ToolCategory::Data,
        icon: "ri:database-2-line".to_string(),
        display_order: 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tools() {
        let tools = default_tools();
        assert_eq!(tools.len(), 3, "Should have 3 tools");

        for tool in &tools {
            assert!(!tool.id.is_empty());
            assert!(!tool.name.is_empty());
            assert!(!tool.llm_description.is_empty(), "LLM description is required");
            assert!(tool.parameters.is_object(), "Parameters must be JSON object");
            assert_eq!(tool.tool_type, ToolType::Builtin, "Registry tools should be builtin type");
        }

        let ids: Vec<&str> = tools.iter().map(|t| t.id.as_str()).collect();
        assert!(ids.contains(&"think"));
        assert!(ids.contains(&"web_search"));
        assert!(ids.contains(&"sql_query"));
    }

    #[test]
    fn test_tool_parameters_have_type() {
        for tool in default_tools() {
            assert_eq!(
                tool.parameters.get("type"),
                Some(&serde_json::json!("object")),
                "Tool {} parameters should have type: object",
                tool.id
            );
        }
    }
}
