//! Catalogue Registry - shared static configuration data
//!
//! This crate is the single source of truth for the agent and tool catalogue
//! defaults that the `build_agent_config` and `discover_available_tools`
//! activities fall back to when no user-defined override exists in Postgres:
//! - Agents (default agent personas and their model/tool bindings)
//! - Tools (built-in capabilities: think, web_search, sql_query)
//!
//! # Design Principles
//!
//! 1. **Registry = Static Data**: all data is compile-time constants.
//! 2. **No database**: these are not stored anywhere, read directly from functions.
//! 3. **Shared**: used by the worker process and by tests as fixtures.

pub mod agents;
pub mod tools;

pub use agents::{default_agents, AgentConfig};
pub use tools::{default_tools, ToolConfig};
