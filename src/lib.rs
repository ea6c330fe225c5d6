//! agentflow - durable agent-task execution engine
//!
//! An event-sourced reason-act agent loop that calls an LLM, dispatches tool
//! calls, enforces budget/iteration limits, and supports pause/resume/cancel
//! over a signal/query interface, plus a companion scheduled/webhook Trigger
//! Execution subsystem that turns fired triggers into new tasks.

pub mod activities;
pub mod budget;
pub mod client;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod events;
pub mod http_client;
pub mod messages;
pub mod observability;
pub mod runtime;
pub mod tollbooth;
pub mod trigger;
pub mod workflow;

pub use client::Engine;
pub use config::Config;
pub use error::{ActivityError, Error, Result};
pub use workflow::{
    run_agent_execution_workflow, AgentExecutionRequest, AgentExecutionResult, WorkflowHandle, WorkflowSignal,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
