//! Workflow handle: the signal/query surface of §4.6, backed by the
//! crate-local substrate described in §4.9.
//!
//! A `WorkflowHandle` is what a caller holds to interact with a running
//! execution; a `WorkflowDriver` is the matching half held by the workflow's
//! own task. Signals flow handle -> driver over an unbounded mpsc channel;
//! snapshots flow driver -> handle over a `watch` channel, so queries never
//! contend with the task that owns `AgentExecutionState`.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::budget::BudgetTracker;
use crate::events::WorkflowEvent;
use crate::messages::Message;

use super::signal::WorkflowSignal;
use super::state::{AgentExecutionState, AgentGoal, ExecutionStatus};

/// A read-only copy of everything a query might want, published by the
/// workflow task after every state transition worth observing.
#[derive(Debug, Clone)]
pub struct WorkflowSnapshot {
    pub status: ExecutionStatus,
    pub current_iteration: u32,
    pub max_iterations: u32,
    pub goal: AgentGoal,
    pub messages: Vec<Message>,
    pub cost: f64,
    pub budget_limit: f64,
    pub paused: bool,
    pub pending_approval_reason: Option<String>,
    pub final_response: Option<String>,
    pub success: bool,
    pub event_history: Vec<WorkflowEvent>,
}

impl WorkflowSnapshot {
    fn initial(state: &AgentExecutionState, budget: &BudgetTracker) -> Self {
        Self {
            status: state.status,
            current_iteration: state.current_iteration,
            max_iterations: state.goal.max_iterations,
            goal: state.goal.clone(),
            messages: state.messages.clone(),
            cost: budget.cost(),
            budget_limit: budget.budget_limit(),
            paused: false,
            pending_approval_reason: state.pending_approval.as_ref().map(|p| p.reason.clone()),
            final_response: state.final_response.clone(),
            success: state.success,
            event_history: Vec::new(),
        }
    }
}

/// Handed to whoever started the workflow; cheap to clone.
#[derive(Clone)]
pub struct WorkflowHandle {
    signal_tx: mpsc::UnboundedSender<WorkflowSignal>,
    snapshot_rx: watch::Receiver<WorkflowSnapshot>,
}

impl WorkflowHandle {
    pub fn send(&self, signal: WorkflowSignal) {
        // Receiver is dropped once the workflow task finishes; a late signal
        // is simply discarded, matching "signals on a completed workflow are
        // no-ops" in practice.
        let _ = self.signal_tx.send(signal);
    }

    pub fn pause(&self, reason: Option<String>) {
        self.send(WorkflowSignal::Pause { reason });
    }

    pub fn resume(&self, reason: Option<String>) {
        self.send(WorkflowSignal::Resume { reason });
    }

    pub fn cancel_execution(&self, reason: String) {
        self.send(WorkflowSignal::CancelExecution { reason });
    }

    pub fn approve_action(&self, approved: bool, feedback: Option<String>) {
        self.send(WorkflowSignal::ApproveAction { approved, feedback });
    }

    pub fn provide_feedback(&self, text: String) {
        self.send(WorkflowSignal::ProvideFeedback { text });
    }

    pub fn update_budget(&self, new_budget_usd: f64, reason: Option<String>) {
        self.send(WorkflowSignal::UpdateBudget { new_budget_usd, reason });
    }

    fn snapshot(&self) -> WorkflowSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// `get_execution_status` (§4.6).
    pub fn get_execution_status(&self) -> ExecutionStatusView {
        let s = self.snapshot();
        ExecutionStatusView {
            status: s.status,
            current_iteration: s.current_iteration,
            max_iterations: s.max_iterations,
            cost: s.cost,
            budget_remaining: (s.budget_limit - s.cost).max(0.0),
            paused: s.paused,
            pending_approval: s.pending_approval_reason.is_some(),
        }
    }

    /// `get_conversation_history` (§4.6).
    pub fn get_conversation_history(&self) -> Vec<Message> {
        self.snapshot().messages
    }

    /// `get_goal_progress` (§4.6).
    pub fn get_goal_progress(&self) -> GoalProgressView {
        let s = self.snapshot();
        let progress_percentage = if s.max_iterations == 0 {
            0.0
        } else {
            (s.current_iteration as f64 / s.max_iterations as f64 * 100.0).min(100.0)
        };
        GoalProgressView {
            goal: s.goal,
            success: s.success,
            final_response: s.final_response,
            progress_percentage,
        }
    }

    /// `get_workflow_events` (§4.6): the full history accumulated so far.
    pub fn get_workflow_events(&self) -> Vec<WorkflowEvent> {
        self.snapshot().event_history
    }

    /// `get_latest_events(limit)` (§4.6).
    pub fn get_latest_events(&self, limit: usize) -> Vec<WorkflowEvent> {
        let history = self.snapshot().event_history;
        let start = history.len().saturating_sub(limit);
        history[start..].to_vec()
    }

    /// `get_budget_status` (§4.6).
    pub fn get_budget_status(&self) -> BudgetStatusView {
        let s = self.snapshot();
        let utilization = if s.budget_limit > 0.0 { (s.cost / s.budget_limit * 100.0).min(100.0) } else { 0.0 };
        BudgetStatusView {
            cost: s.cost,
            budget_limit: s.budget_limit,
            remaining: (s.budget_limit - s.cost).max(0.0),
            utilization_percentage: utilization,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionStatusView {
    pub status: ExecutionStatus,
    pub current_iteration: u32,
    pub max_iterations: u32,
    pub cost: f64,
    pub budget_remaining: f64,
    pub paused: bool,
    pub pending_approval: bool,
}

#[derive(Debug, Clone)]
pub struct GoalProgressView {
    pub goal: AgentGoal,
    pub success: bool,
    pub final_response: Option<String>,
    pub progress_percentage: f64,
}

#[derive(Debug, Clone)]
pub struct BudgetStatusView {
    pub cost: f64,
    pub budget_limit: f64,
    pub remaining: f64,
    pub utilization_percentage: f64,
}

/// Held by the workflow's own task: the consumer half of the signal channel
/// and the producer half of the snapshot channel.
pub struct WorkflowDriver {
    signal_rx: mpsc::UnboundedReceiver<WorkflowSignal>,
    snapshot_tx: watch::Sender<WorkflowSnapshot>,
}

impl WorkflowDriver {
    /// Drains every signal queued since the last call without blocking -
    /// the gate points in `workflow::run` call this once per check.
    pub fn drain_signals(&mut self) -> Vec<WorkflowSignal> {
        let mut out = Vec::new();
        while let Ok(signal) = self.signal_rx.try_recv() {
            out.push(signal);
        }
        out
    }

    /// Blocks until either a signal arrives or the duration elapses. Used
    /// while `waiting_for_approval`/paused, so the task isn't a busy loop.
    pub async fn next_signal_within(&mut self, duration: std::time::Duration) -> Option<WorkflowSignal> {
        tokio::time::timeout(duration, self.signal_rx.recv()).await.ok().flatten()
    }

    pub fn publish(&self, state: &AgentExecutionState, budget: &BudgetTracker, paused: bool, event_history: &[WorkflowEvent]) {
        let snapshot = WorkflowSnapshot {
            status: state.status,
            current_iteration: state.current_iteration,
            max_iterations: state.goal.max_iterations,
            goal: state.goal.clone(),
            messages: state.messages.clone(),
            cost: budget.cost(),
            budget_limit: budget.budget_limit(),
            paused,
            pending_approval_reason: state.pending_approval.as_ref().map(|p| p.reason.clone()),
            final_response: state.final_response.clone(),
            success: state.success,
            event_history: event_history.to_vec(),
        };
        // No receivers left is fine - the caller may have dropped the handle.
        let _ = self.snapshot_tx.send(snapshot);
    }
}

/// Builds a connected `(WorkflowHandle, WorkflowDriver)` pair for one
/// execution, seeded from its initial state.
pub fn channel(state: &AgentExecutionState, budget: &BudgetTracker) -> (Arc<WorkflowHandle>, WorkflowDriver) {
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(WorkflowSnapshot::initial(state, budget));

    let handle = Arc::new(WorkflowHandle { signal_tx, snapshot_rx });
    let driver = WorkflowDriver { signal_rx, snapshot_tx };
    (handle, driver)
}
