//! Catalogue lookup collaborator
//!
//! Resolves an `agent_id` to an agent config record and enumerates tools for
//! configured tool servers. User-defined agents live in Postgres; everything
//! else falls back to the static defaults in the `catalogue-registry` crate
//! (adapted from the teacher's `virtues-registry` package).

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::Result;

/// `{id, name, description, instruction, model_id, tools_config, events_config, planning?}`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentConfigRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub instruction: String,
    pub model_id: String,
    pub tools_config: Vec<String>,
    pub events_config: bool,
    pub max_steps: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planning: Option<serde_json::Value>,
}

impl From<catalogue_registry::AgentConfig> for AgentConfigRecord {
    fn from(agent: catalogue_registry::AgentConfig) -> Self {
        Self {
            id: agent.agent_id,
            name: agent.name,
            description: agent.description,
            instruction: agent.instruction,
            model_id: agent.model_id,
            tools_config: agent.tools_config,
            events_config: agent.events_config,
            max_steps: agent.max_steps,
            planning: None,
        }
    }
}

/// `{name, description, parameters, server_instance_id}`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_instance_id: Option<String>,
}

#[async_trait]
pub trait CatalogueClient: Send + Sync {
    async fn get_agent_config(&self, agent_id: &str) -> Result<Option<AgentConfigRecord>>;
    async fn discover_tools(&self, tool_ids: &[String]) -> Result<Vec<ToolDescriptor>>;
}

/// Resolves against Postgres first (user-defined agents/tool overrides), then
/// the static `catalogue-registry` defaults.
pub struct PostgresCatalogueClient {
    pool: Option<PgPool>,
}

impl PostgresCatalogueClient {
    pub fn new(pool: Option<PgPool>) -> Self {
        Self { pool }
    }

    fn default_agent(agent_id: &str) -> Option<AgentConfigRecord> {
        catalogue_registry::default_agents()
            .into_iter()
            .find(|a| a.agent_id == agent_id)
            .map(AgentConfigRecord::from)
    }

    fn default_tool(tool_id: &str) -> ToolDescriptor {
        catalogue_registry::default_tools()
            .into_iter()
            .find(|t| t.id == tool_id)
            .map(|t| ToolDescriptor {
                name: t.id,
                description: t.description,
                parameters: t.parameters,
                server_instance_id: None,
            })
            .unwrap_or(ToolDescriptor {
                name: tool_id.to_string(),
                description: String::new(),
                parameters: serde_json::json!({}),
                server_instance_id: None,
            })
    }
}

#[async_trait]
impl CatalogueClient for PostgresCatalogueClient {
    async fn get_agent_config(&self, agent_id: &str) -> Result<Option<AgentConfigRecord>> {
        if let Some(pool) = &self.pool {
            let row = sqlx::query_as::<_, (String, String, String, String, String, serde_json::Value, bool, i32)>(
                r#"
                SELECT id, name, description, instruction, model_id, tools_config, events_config, max_steps
                FROM agent_configs WHERE id = $1
                "#,
            )
            .bind(agent_id)
            .fetch_optional(pool)
            .await?;

            if let Some((id, name, description, instruction, model_id, tools_config, events_config, max_steps)) = row {
                let tools_config: Vec<String> = serde_json::from_value(tools_config).unwrap_or_default();
                return Ok(Some(AgentConfigRecord {
                    id,
                    name,
                    description,
                    instruction,
                    model_id,
                    tools_config,
                    events_config,
                    max_steps,
                    planning: None,
                }));
            }
        }

        Ok(Self::default_agent(agent_id))
    }

    async fn discover_tools(&self, tool_ids: &[String]) -> Result<Vec<ToolDescriptor>> {
        Ok(tool_ids.iter().map(|id| Self::default_tool(id)).collect())
    }
}
