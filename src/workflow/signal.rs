//! Signals accepted by a running Agent Execution Workflow (§4.6).
//!
//! Signals never mutate `AgentExecutionState` directly - they're queued on an
//! mpsc channel and drained by the workflow's own task at a defined gate
//! point, preserving the single-threaded-cooperative model of §5 (no
//! `Arc<Mutex<AgentExecutionState>>` shared across tasks).

#[derive(Debug, Clone)]
pub enum WorkflowSignal {
    Pause { reason: Option<String> },
    Resume { reason: Option<String> },
    CancelExecution { reason: String },
    ApproveAction { approved: bool, feedback: Option<String> },
    ProvideFeedback { text: String },
    UpdateBudget { new_budget_usd: f64, reason: Option<String> },
}
