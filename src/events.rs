//! Event Manager (C4)
//!
//! In-workflow buffer of structured progress events. Two publication modes:
//! immediate (fire-and-forget, single-attempt publish per event) and batched
//! (accumulate, flush at explicit points). Failure to publish must never fail
//! the workflow - this module only builds and buffers events; the actual
//! publish happens through the `publish_workflow_events` activity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event types emitted by the core, mirroring the wire format in §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    WorkflowStarted,
    WorkflowCompleted,
    WorkflowFailed,
    WorkflowCancelled,
    IterationStarted,
    IterationCompleted,
    LlmCallStarted,
    LlmCallCompleted,
    LlmCallFailed,
    ToolCallStarted,
    ToolCallCompleted,
    ToolCallFailed,
    BudgetWarning,
    BudgetExceeded,
    HumanApprovalRequested,
    HumanApprovalReceived,
}

/// One structured progress event, matching the published wire format:
/// `{event_id, event_type, timestamp, data}` with `data` always carrying
/// `task_id`/`agent_id`/`execution_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub data: serde_json::Value,
}

impl WorkflowEvent {
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"event_type":"workflow_failed","data":{"error":"failed to serialize event"}}"#
                .to_string()
        })
    }
}

/// Publication mode for an `EventManager`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventMode {
    /// Enqueue a single fire-and-forget publish per `add_event` call.
    Immediate,
    /// Accumulate events; caller flushes explicitly.
    Batched,
}

/// Buffers workflow progress events and tracks which have been handed off for
/// publication, so the workflow can replay its own event stream deterministically.
pub struct EventManager {
    mode: EventMode,
    task_id: Uuid,
    agent_id: Uuid,
    execution_id: String,
    /// Events accumulated in batched mode, or not-yet-drained immediate events.
    pending: Vec<WorkflowEvent>,
    /// Full history for `get_workflow_events`/`get_latest_events` queries.
    history: Vec<WorkflowEvent>,
}

impl EventManager {
    pub fn new(mode: EventMode, task_id: Uuid, agent_id: Uuid, execution_id: impl Into<String>) -> Self {
        Self {
            mode,
            task_id,
            agent_id,
            execution_id: execution_id.into(),
            pending: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Build and record one event, merging the caller's `extra` fields on top
    /// of the mandatory `{task_id, agent_id, execution_id}` envelope.
    pub fn add_event(&mut self, event_type: EventType, extra: serde_json::Value) -> WorkflowEvent {
        let mut data = serde_json::json!({
            "task_id": self.task_id,
            "agent_id": self.agent_id,
            "execution_id": self.execution_id,
        });
        if let (Some(obj), Some(extra_obj)) = (data.as_object_mut(), extra.as_object()) {
            for (k, v) in extra_obj {
                obj.insert(k.clone(), v.clone());
            }
        }

        let event = WorkflowEvent {
            event_id: Uuid::new_v4(),
            event_type,
            timestamp: chrono::Utc::now(),
            data,
        };

        self.pending.push(event.clone());
        self.history.push(event.clone());
        event
    }

    pub fn mode(&self) -> EventMode {
        self.mode
    }

    /// Drain the events pending publication. In immediate mode this is called
    /// right after `add_event` to hand a single-element batch to the publish
    /// activity; in batched mode it's called at explicit flush points.
    /// Mirrors the source's "clear pending events before actually publishing"
    /// fire-and-forget semantics so a publish failure never re-enqueues.
    pub fn drain_pending(&mut self) -> Vec<WorkflowEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Full historical event buffer (`get_workflow_events`).
    pub fn history(&self) -> &[WorkflowEvent] {
        &self.history
    }

    /// Most recent `limit` events (`get_latest_events`).
    pub fn latest(&self, limit: usize) -> Vec<WorkflowEvent> {
        let start = self.history.len().saturating_sub(limit);
        self.history[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> EventManager {
        EventManager::new(
            EventMode::Immediate,
            Uuid::new_v4(),
            Uuid::new_v4(),
            "exec-1",
        )
    }

    #[test]
    fn add_event_includes_mandatory_fields() {
        let mut mgr = manager();
        let event = mgr.add_event(EventType::WorkflowStarted, serde_json::json!({}));
        assert!(event.data.get("task_id").is_some());
        assert!(event.data.get("agent_id").is_some());
        assert!(event.data.get("execution_id").is_some());
    }

    #[test]
    fn extra_fields_are_merged() {
        let mut mgr = manager();
        let event = mgr.add_event(
            EventType::ToolCallStarted,
            serde_json::json!({"tool_name": "search"}),
        );
        assert_eq!(event.data["tool_name"], "search");
    }

    #[test]
    fn drain_clears_pending_but_keeps_history() {
        let mut mgr = manager();
        mgr.add_event(EventType::WorkflowStarted, serde_json::json!({}));
        assert!(mgr.has_pending());
        let drained = mgr.drain_pending();
        assert_eq!(drained.len(), 1);
        assert!(!mgr.has_pending());
        assert_eq!(mgr.history().len(), 1);
    }

    #[test]
    fn latest_respects_limit() {
        let mut mgr = manager();
        for _ in 0..5 {
            mgr.add_event(EventType::IterationStarted, serde_json::json!({}));
        }
        assert_eq!(mgr.latest(2).len(), 2);
        assert_eq!(mgr.latest(100).len(), 5);
    }
}
