//! Agent registry - default agent configurations
//!
//! Agents are static configuration used as the fallback source for the
//! `build_agent_config` activity when an agent has no user-defined override
//! persisted in Postgres. The shape here mirrors the agent-config record
//! required by the core spec: `{id, name, description, instruction, model_id,
//! tools_config, events_config}`.

use serde::{Deserialize, Serialize};

/// Default configuration for one agent persona.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Unique agent identifier
    pub agent_id: String,
    /// Human-readable name
    pub name: String,
    /// Description of what this agent does
    pub description: String,
    /// System instruction injected into the system prompt
    pub instruction: String,
    /// Default model id for this agent (e.g. "anthropic/claude-sonnet-4-20250514")
    pub model_id: String,
    /// Tool ids this agent is configured to use
    pub tools_config: Vec<String>,
    /// Whether immediate event publication is enabled for this agent
    pub events_config: bool,
    /// Maximum reasoning iterations before forcing completion
    pub max_steps: i32,
    /// Whether this agent is enabled
    pub enabled: bool,
    /// Sort order for UI display
    pub sort_order: i32,
}

/// Get default agent configurations.
pub fn default_agents() -> Vec<AgentConfig> {
    vec![AgentConfig {
        agent_id: "agent".to_string(),
        name: "Agent".to_string(),
        description: "Intelligent assistant with access to all available tools. Can query data, search the web, and help complete tasks.".to_string(),
        instruction: "You are a capable, careful assistant. Use the available tools to gather \
            information before answering, and call the `completion` tool with your final \
            answer once the goal is satisfied.".to_string(),
        model_id: "anthropic/claude-sonnet-4-20250514".to_string(),
        tools_config: vec![
            "think".to_string(),
            "web_search".to_string(),
            "sql_query".to_string(),
        ],
        events_config: true,
        max_steps: 10,
        enabled: true,
        sort_order: 1,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_agents() {
        let agents = default_agents();
        assert!(!agents.is_empty(), "Agents should not be empty");

        for agent in &agents {
            assert!(!agent.agent_id.is_empty());
            assert!(!agent.name.is_empty());
            assert!(!agent.model_id.is_empty());
        }
    }
}
