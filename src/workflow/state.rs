//! Agent Execution Workflow data model (§3)
//!
//! `AgentExecutionRequest`/`AgentExecutionResult` are the workflow's wire
//! contract; `AgentGoal`/`AgentExecutionState` are workflow-local and mutated
//! only by the workflow coroutine in `super::run`, never by an activity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::budget::DEFAULT_BUDGET_USD;
use crate::collaborators::catalogue::{AgentConfigRecord, ToolDescriptor};
use crate::messages::Message;

/// Input to one `AgentExecutionWorkflow` run (§3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecutionRequest {
    pub task_id: Uuid,
    pub agent_id: Uuid,
    pub user_id: String,
    pub task_query: String,
    #[serde(default)]
    pub task_parameters: serde_json::Map<String, serde_json::Value>,
    pub timeout_seconds: u64,
    #[serde(default = "default_max_iterations")]
    pub max_reasoning_iterations: u32,
    #[serde(default)]
    pub budget_usd: Option<f64>,
    #[serde(default)]
    pub requires_human_approval: bool,
    #[serde(default)]
    pub workflow_metadata: serde_json::Map<String, serde_json::Value>,
}

fn default_max_iterations() -> u32 {
    10
}

impl AgentExecutionRequest {
    pub fn effective_budget(&self) -> f64 {
        self.budget_usd.filter(|b| *b > 0.0).unwrap_or(DEFAULT_BUDGET_USD)
    }
}

/// Derived from the request at workflow start (§3).
#[derive(Debug, Clone)]
pub struct AgentGoal {
    pub id: Uuid,
    pub description: String,
    pub success_criteria: Vec<String>,
    pub max_iterations: u32,
    pub requires_human_approval: bool,
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl AgentGoal {
    /// A goal derived straight from the request: description is the task
    /// query, success criteria a single implicit "answer the query" entry
    /// when the request doesn't carry explicit ones via `task_parameters`.
    pub fn from_request(request: &AgentExecutionRequest) -> Self {
        let success_criteria = request
            .task_parameters
            .get("success_criteria")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect::<Vec<_>>())
            .filter(|v: &Vec<String>| !v.is_empty())
            .unwrap_or_else(|| vec![format!("Answer: {}", request.task_query)]);

        Self {
            id: Uuid::new_v4(),
            description: request.task_query.clone(),
            success_criteria,
            max_iterations: request.max_reasoning_iterations.max(1),
            requires_human_approval: request.requires_human_approval,
            context: request.task_parameters.clone(),
        }
    }
}

/// Workflow status (§3). Mirrors the lifecycle states a running execution
/// can be observed in via `get_execution_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Initializing,
    Planning,
    Executing,
    WaitingForApproval,
    ToolExecution,
    Evaluating,
    Completed,
    Failed,
    Cancelled,
}

/// A pending human-approval gate, set when a projected LLM call would exceed
/// budget and the workflow enters `WaitingForApproval` (§4.3, §4.6).
#[derive(Debug, Clone)]
pub struct PendingApproval {
    pub reason: String,
    pub requested_at: chrono::DateTime<chrono::Utc>,
}

/// Workflow-local state (§3). Invariant: mutated only by the workflow
/// coroutine in `workflow::run`, never by an activity.
#[derive(Debug, Clone)]
pub struct AgentExecutionState {
    pub execution_id: String,
    pub agent_id: Uuid,
    pub task_id: Uuid,
    pub user_id: String,
    pub goal: AgentGoal,
    pub status: ExecutionStatus,
    pub current_iteration: u32,
    pub messages: Vec<Message>,
    pub agent_config: Option<AgentConfigRecord>,
    pub available_tools: Vec<ToolDescriptor>,
    pub final_response: Option<String>,
    pub success: bool,
    pub budget_usd: f64,
    pub user_context_data: serde_json::Map<String, serde_json::Value>,
    pub pending_approval: Option<PendingApproval>,
}

impl AgentExecutionState {
    pub fn new(execution_id: String, request: &AgentExecutionRequest, goal: AgentGoal) -> Self {
        Self {
            execution_id,
            agent_id: request.agent_id,
            task_id: request.task_id,
            user_id: request.user_id.clone(),
            goal,
            status: ExecutionStatus::Initializing,
            current_iteration: 0,
            messages: Vec::new(),
            agent_config: None,
            available_tools: Vec::new(),
            final_response: None,
            success: false,
            budget_usd: request.effective_budget(),
            user_context_data: serde_json::Map::new(),
            pending_approval: None,
        }
    }

    /// Last non-empty assistant message content, used as the
    /// `final_response` fallback per §4.6 step 4.
    pub fn last_assistant_content(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, crate::messages::Role::Assistant) && !m.content.is_empty())
            .map(|m| m.content.clone())
    }
}

/// Returned by `AgentExecutionWorkflow.run` (§4.6 step 4, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecutionResult {
    pub task_id: Uuid,
    pub agent_id: Uuid,
    pub success: bool,
    pub final_response: String,
    pub total_cost: f64,
    pub reasoning_iterations_used: u32,
    pub conversation_history: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Default final response when there's nothing better to report (§4.6 step 4).
pub const DEFAULT_FINAL_RESPONSE: &str = "No response generated";

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AgentExecutionRequest {
        AgentExecutionRequest {
            task_id: Uuid::new_v4(),
            agent_id: Uuid::new_v4(),
            user_id: "user-1".into(),
            task_query: "2+2".into(),
            task_parameters: serde_json::Map::new(),
            timeout_seconds: 60,
            max_reasoning_iterations: 3,
            budget_usd: None,
            requires_human_approval: false,
            workflow_metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn effective_budget_falls_back_to_default() {
        let req = request();
        assert_eq!(req.effective_budget(), DEFAULT_BUDGET_USD);
    }

    #[test]
    fn effective_budget_rejects_non_positive_override() {
        let mut req = request();
        req.budget_usd = Some(0.0);
        assert_eq!(req.effective_budget(), DEFAULT_BUDGET_USD);
        req.budget_usd = Some(-5.0);
        assert_eq!(req.effective_budget(), DEFAULT_BUDGET_USD);
    }

    #[test]
    fn goal_derives_implicit_success_criterion() {
        let req = request();
        let goal = AgentGoal::from_request(&req);
        assert_eq!(goal.success_criteria.len(), 1);
        assert_eq!(goal.max_iterations, 3);
    }

    #[test]
    fn goal_respects_explicit_success_criteria() {
        let mut req = request();
        req.task_parameters.insert(
            "success_criteria".into(),
            serde_json::json!(["criterion a", "criterion b"]),
        );
        let goal = AgentGoal::from_request(&req);
        assert_eq!(goal.success_criteria, vec!["criterion a", "criterion b"]);
    }

    #[test]
    fn zero_max_iterations_clamped_to_one() {
        let mut req = request();
        req.max_reasoning_iterations = 0;
        let goal = AgentGoal::from_request(&req);
        assert_eq!(goal.max_iterations, 1);
    }
}
