//! Trigger and TriggerExecution data model
//!
//! Grounded on `agentarea_triggers.domain.models`/`.enums` (via the usages in
//! `trigger_service.py`, since the domain module itself wasn't included in the
//! retrieved source): a tagged `Trigger` enum over cron/webhook variants
//! sharing a common field set, and an append-only `TriggerExecution` record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Cron,
    Webhook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Skipped,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookType {
    Generic,
    Telegram,
    Slack,
    Github,
}

/// Common fields shared by both trigger variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerCommon {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub agent_id: Uuid,
    pub created_by: String,
    pub is_active: bool,
    /// Rule-based (`field_matches`/`time_conditions`) or LLM-evaluated condition config.
    pub conditions: Option<serde_json::Value>,
    pub task_parameters: Option<serde_json::Value>,
    pub max_executions_per_hour: u32,
    pub failure_threshold: u32,
    pub consecutive_failures: u32,
    pub last_execution_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronTrigger {
    #[serde(flatten)]
    pub common: TriggerCommon,
    pub cron_expression: String,
    pub timezone: String,
    pub next_run_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookTrigger {
    #[serde(flatten)]
    pub common: TriggerCommon,
    pub webhook_id: String,
    pub allowed_methods: Vec<String>,
    pub webhook_type: WebhookType,
    pub validation_rules: Option<serde_json::Value>,
    pub webhook_config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "trigger_type", rename_all = "snake_case")]
pub enum Trigger {
    Cron(CronTrigger),
    Webhook(WebhookTrigger),
}

impl Trigger {
    pub fn common(&self) -> &TriggerCommon {
        match self {
            Trigger::Cron(t) => &t.common,
            Trigger::Webhook(t) => &t.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut TriggerCommon {
        match self {
            Trigger::Cron(t) => &mut t.common,
            Trigger::Webhook(t) => &mut t.common,
        }
    }

    pub fn id(&self) -> Uuid {
        self.common().id
    }

    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Trigger::Cron(_) => TriggerType::Cron,
            Trigger::Webhook(_) => TriggerType::Webhook,
        }
    }

    pub fn is_active(&self) -> bool {
        self.common().is_active
    }
}

/// Append-only execution record; one row per fire attempt regardless of outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerExecution {
    pub id: Uuid,
    pub trigger_id: Uuid,
    pub status: ExecutionStatus,
    pub execution_time_ms: i64,
    pub task_id: Option<Uuid>,
    pub error_message: Option<String>,
    pub trigger_data: serde_json::Value,
    pub workflow_id: Option<String>,
    pub run_id: Option<String>,
    pub executed_at: DateTime<Utc>,
}

impl TriggerExecution {
    pub fn new(
        trigger_id: Uuid,
        status: ExecutionStatus,
        execution_time_ms: i64,
        task_id: Option<Uuid>,
        error_message: Option<String>,
        trigger_data: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger_id,
            status,
            execution_time_ms,
            task_id,
            error_message,
            trigger_data,
            workflow_id: None,
            run_id: None,
            executed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn webhook(max_per_hour: u32, last: Option<DateTime<Utc>>) -> Trigger {
        Trigger::Webhook(WebhookTrigger {
            common: TriggerCommon {
                id: Uuid::new_v4(),
                name: "wh".into(),
                description: None,
                agent_id: Uuid::new_v4(),
                created_by: "user".into(),
                is_active: true,
                conditions: None,
                task_parameters: None,
                max_executions_per_hour: max_per_hour,
                failure_threshold: 3,
                consecutive_failures: 0,
                last_execution_at: last,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            webhook_id: "hook-1".into(),
            allowed_methods: vec!["POST".into()],
            webhook_type: WebhookType::Generic,
            validation_rules: None,
            webhook_config: None,
        })
    }

    #[test]
    fn common_exposes_max_executions_per_hour_for_the_service_layer_to_count_against() {
        let trigger = webhook(4, Some(Utc::now()));
        assert_eq!(trigger.common().max_executions_per_hour, 4);
    }

    #[test]
    fn is_active_reads_through_to_common() {
        let mut trigger = webhook(60, None);
        assert!(trigger.is_active());
        trigger.common_mut().is_active = false;
        assert!(!trigger.is_active());
    }
}
