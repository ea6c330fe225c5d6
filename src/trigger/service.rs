//! Trigger Service (C8)
//!
//! CRUD over triggers plus the end-to-end `execute_trigger` path, grounded on
//! `agentarea_triggers.trigger_service.TriggerService`. Keeps the Trigger row
//! and its schedule entry in lockstep, delegating the actual schedule
//! bookkeeping to `ScheduleManager`.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::collaborators::tasks::{CreateTaskParams, TaskCreationClient};
use crate::error::{Error, Result};

use super::condition::{evaluate_with_policy, ConditionEvaluationPolicy, ConditionEvaluator};
use super::model::{ExecutionStatus, Trigger, TriggerExecution, TriggerType};
use super::repository::{TriggerExecutionRepository, TriggerRepository};
use super::schedule::ScheduleManager;

/// Outcome of one `execute_trigger` call, returned to the Trigger Execution
/// Workflow as plain data.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TriggerExecutionOutcome {
    pub trigger_id: Uuid,
    pub status: ExecutionStatusLabel,
    pub reason: Option<String>,
    pub task_id: Option<Uuid>,
    pub execution_id: Option<Uuid>,
    pub execution_time_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatusLabel {
    Success,
    Skipped,
    Failed,
}

pub struct TriggerService {
    triggers: Arc<dyn TriggerRepository>,
    executions: Arc<dyn TriggerExecutionRepository>,
    condition_evaluator: Arc<dyn ConditionEvaluator>,
    condition_policy: ConditionEvaluationPolicy,
    tasks: Arc<dyn TaskCreationClient>,
    schedule: Option<Arc<ScheduleManager>>,
}

impl TriggerService {
    pub fn new(
        triggers: Arc<dyn TriggerRepository>,
        executions: Arc<dyn TriggerExecutionRepository>,
        condition_evaluator: Arc<dyn ConditionEvaluator>,
        tasks: Arc<dyn TaskCreationClient>,
        schedule: Option<Arc<ScheduleManager>>,
    ) -> Self {
        Self {
            triggers,
            executions,
            condition_evaluator,
            condition_policy: ConditionEvaluationPolicy::default(),
            tasks,
            schedule,
        }
    }

    pub fn with_condition_policy(mut self, policy: ConditionEvaluationPolicy) -> Self {
        self.condition_policy = policy;
        self
    }

    pub async fn get_trigger(&self, id: Uuid) -> Result<Option<Trigger>> {
        self.triggers.get(id).await
    }

    pub async fn get_trigger_by_webhook_id(&self, webhook_id: &str) -> Result<Option<Trigger>> {
        self.triggers.get_by_webhook_id(webhook_id).await
    }

    pub async fn list_triggers(&self, trigger_type: Option<TriggerType>, limit: i64) -> Result<Vec<Trigger>> {
        match trigger_type {
            Some(t) => self.triggers.list_by_type(t, limit).await,
            None => {
                let mut all = self.triggers.list_by_type(TriggerType::Cron, limit).await?;
                all.extend(self.triggers.list_by_type(TriggerType::Webhook, limit).await?);
                Ok(all)
            }
        }
    }

    /// Validate, persist, and (for cron triggers) schedule. Schedule-creation
    /// failure is logged but does not roll back the persisted row - the
    /// trigger can be rescheduled by a later update or enable.
    pub async fn create_trigger(&self, trigger: Trigger) -> Result<Trigger> {
        self.validate(&trigger)?;
        let created = self.triggers.create(trigger).await?;

        if let Trigger::Cron(cron) = &created {
            if let Some(schedule) = &self.schedule {
                if let Err(e) = schedule.create_schedule(cron.common.id, &cron.cron_expression, &cron.timezone).await {
                    tracing::error!(trigger_id = %cron.common.id, error = %e, "failed to schedule cron trigger");
                }
            }
        }

        Ok(created)
    }

    pub async fn update_trigger(&self, trigger: Trigger) -> Result<Trigger> {
        self.validate(&trigger)?;
        let updated = self.triggers.update(trigger).await?;

        if let Trigger::Cron(cron) = &updated {
            if let Some(schedule) = &self.schedule {
                if cron.common.is_active {
                    let _ = schedule.update_schedule(cron.common.id, &cron.cron_expression, &cron.timezone).await;
                } else {
                    let _ = schedule.pause_schedule(cron.common.id).await;
                }
            }
        }

        Ok(updated)
    }

    pub async fn enable_trigger(&self, id: Uuid) -> Result<()> {
        self.triggers.set_active(id, true).await?;
        if let Some(schedule) = &self.schedule {
            let _ = schedule.resume_schedule(id).await;
        }
        Ok(())
    }

    pub async fn disable_trigger(&self, id: Uuid) -> Result<()> {
        self.triggers.set_active(id, false).await?;
        if let Some(schedule) = &self.schedule {
            let _ = schedule.pause_schedule(id).await;
        }
        Ok(())
    }

    pub async fn delete_trigger(&self, id: Uuid) -> Result<()> {
        if let Some(schedule) = &self.schedule {
            let _ = schedule.remove_schedule(id).await;
        }
        self.triggers.delete(id).await
    }

    fn validate(&self, trigger: &Trigger) -> Result<()> {
        let common = trigger.common();
        if common.name.trim().is_empty() {
            return Err(Error::TriggerValidationError("name must not be empty".into()));
        }
        if common.created_by.trim().is_empty() {
            return Err(Error::TriggerValidationError("created_by must not be empty".into()));
        }

        match trigger {
            Trigger::Cron(cron) => {
                let field_count = cron.cron_expression.split_whitespace().count();
                if !(5..=6).contains(&field_count) {
                    return Err(Error::TriggerValidationError(format!(
                        "cron_expression must have 5 or 6 fields, got {field_count}"
                    )));
                }
                if cron.timezone.trim().is_empty() {
                    return Err(Error::TriggerValidationError("timezone must not be empty".into()));
                }
            }
            Trigger::Webhook(webhook) => {
                if webhook.webhook_id.trim().is_empty() {
                    return Err(Error::TriggerValidationError("webhook_id must not be empty".into()));
                }
                if webhook.allowed_methods.is_empty() {
                    return Err(Error::TriggerValidationError("allowed_methods must not be empty".into()));
                }
                const STANDARD_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];
                for method in &webhook.allowed_methods {
                    if !STANDARD_METHODS.contains(&method.as_str()) {
                        return Err(Error::TriggerValidationError(format!(
                            "unsupported HTTP method in allowed_methods: {method}"
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Per-hour rate limit, enforced by counting `TriggerExecutions` in the
    /// trailing hour rather than throttling on a min-interval since the last
    /// fire - a burst of 3 fires in one minute and then nothing for 59
    /// minutes is allowed exactly the same as 3 fires spread evenly, as long
    /// as the rolling count stays under `max_executions_per_hour`. A zero
    /// limit disables the check (unbounded).
    pub async fn is_rate_limited(&self, trigger: &Trigger) -> Result<bool> {
        let max_per_hour = trigger.common().max_executions_per_hour;
        if max_per_hour == 0 {
            return Ok(false);
        }
        let since = Utc::now() - chrono::Duration::hours(1);
        let count = self.executions.count_executions_since(trigger.id(), since).await?;
        Ok(count >= max_per_hour as i64)
    }

    /// End-to-end execution: condition check, rate-limit check, task
    /// creation, execution recording. Errors other than `TriggerNotFound`
    /// are recorded as a `failed` execution and then surfaced.
    pub async fn execute_trigger(&self, trigger_id: Uuid, event_data: serde_json::Value) -> Result<TriggerExecutionOutcome> {
        let start = std::time::Instant::now();

        let trigger = self
            .triggers
            .get(trigger_id)
            .await?
            .ok_or_else(|| Error::TriggerNotFound(trigger_id.to_string()))?;

        if !trigger.is_active() {
            return Ok(TriggerExecutionOutcome {
                trigger_id,
                status: ExecutionStatusLabel::Skipped,
                reason: Some("trigger_inactive".into()),
                task_id: None,
                execution_id: None,
                execution_time_ms: 0,
            });
        }

        if self.is_rate_limited(&trigger).await? {
            return Ok(TriggerExecutionOutcome {
                trigger_id,
                status: ExecutionStatusLabel::Skipped,
                reason: Some("rate_limited".into()),
                task_id: None,
                execution_id: None,
                execution_time_ms: 0,
            });
        }

        let conditions_met = self.evaluate_trigger_conditions(&trigger, &event_data).await;
        if !conditions_met {
            return Ok(TriggerExecutionOutcome {
                trigger_id,
                status: ExecutionStatusLabel::Skipped,
                reason: Some("conditions_not_met".into()),
                task_id: None,
                execution_id: None,
                execution_time_ms: start.elapsed().as_millis() as i64,
            });
        }

        let task_params = self.build_task_parameters(&trigger, &event_data);
        let common = trigger.common();

        let task_result = self
            .tasks
            .create_task_from_params(CreateTaskParams {
                title: format!("Trigger: {}", common.name),
                description: common
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("Execution of trigger {}", common.name)),
                query: common
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("Execute trigger {}", common.name)),
                user_id: common.created_by.clone(),
                agent_id: common.agent_id,
                task_parameters: task_params.clone(),
            })
            .await;

        let execution_time_ms = start.elapsed().as_millis() as i64;

        match task_result {
            Ok(task_id) => {
                let execution = self
                    .record_execution(trigger_id, ExecutionStatus::Success, execution_time_ms, Some(task_id), None, event_data)
                    .await?;

                Ok(TriggerExecutionOutcome {
                    trigger_id,
                    status: ExecutionStatusLabel::Success,
                    reason: None,
                    task_id: Some(task_id),
                    execution_id: Some(execution.id),
                    execution_time_ms,
                })
            }
            Err(e) => {
                // Task creation failure doesn't fail the whole trigger
                // execution; record and surface the partial result, matching
                // the original's "don't fail execution if task creation fails".
                tracing::error!(%trigger_id, error = %e, "failed to create task for trigger");
                let execution = self
                    .record_execution(
                        trigger_id,
                        ExecutionStatus::Success,
                        execution_time_ms,
                        None,
                        Some(format!("task creation failed: {e}")),
                        task_params,
                    )
                    .await?;

                Ok(TriggerExecutionOutcome {
                    trigger_id,
                    status: ExecutionStatusLabel::Success,
                    reason: Some("task_creation_failed".into()),
                    task_id: None,
                    execution_id: Some(execution.id),
                    execution_time_ms,
                })
            }
        }
    }

    pub async fn evaluate_trigger_conditions(&self, trigger: &Trigger, event_data: &serde_json::Value) -> bool {
        evaluate_with_policy(
            self.condition_evaluator.as_ref(),
            trigger.common().conditions.as_ref(),
            event_data,
            self.condition_policy,
        )
        .await
    }

    /// Merge the trigger's stored `task_parameters` with basic metadata and
    /// the firing event's data.
    fn build_task_parameters(&self, trigger: &Trigger, event_data: &serde_json::Value) -> serde_json::Value {
        let mut params = trigger
            .common()
            .task_parameters
            .clone()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();

        params.insert("trigger_id".into(), serde_json::json!(trigger.id()));
        params.insert("trigger_type".into(), serde_json::json!(trigger.trigger_type()));
        params.insert("event_data".into(), event_data.clone());

        serde_json::Value::Object(params)
    }

    pub async fn record_execution(
        &self,
        trigger_id: Uuid,
        status: ExecutionStatus,
        execution_time_ms: i64,
        task_id: Option<Uuid>,
        error_message: Option<String>,
        trigger_data: serde_json::Value,
    ) -> Result<TriggerExecution> {
        let execution = TriggerExecution::new(trigger_id, status, execution_time_ms, task_id, error_message, trigger_data);
        let recorded = self.executions.create(execution).await?;

        if status == ExecutionStatus::Success {
            self.triggers.update_execution_tracking(trigger_id, Utc::now(), 0).await?;
        } else if let Some(trigger) = self.triggers.get(trigger_id).await? {
            let new_failure_count = trigger.common().consecutive_failures + 1;
            self.triggers.update_execution_tracking(trigger_id, Utc::now(), new_failure_count).await?;

            if new_failure_count >= trigger.common().failure_threshold {
                self.disable_trigger(trigger_id).await?;
                tracing::warn!(%trigger_id, new_failure_count, "auto-disabled trigger after consecutive failures");
            }
        }

        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::condition::RuleBasedConditionEvaluator;
    use crate::trigger::model::{TriggerCommon, WebhookTrigger, WebhookType};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryTriggers {
        rows: Mutex<Vec<Trigger>>,
    }

    #[async_trait]
    impl TriggerRepository for InMemoryTriggers {
        async fn create(&self, trigger: Trigger) -> Result<Trigger> {
            self.rows.lock().unwrap().push(trigger.clone());
            Ok(trigger)
        }
        async fn get(&self, id: Uuid) -> Result<Option<Trigger>> {
            Ok(self.rows.lock().unwrap().iter().find(|t| t.id() == id).cloned())
        }
        async fn get_by_webhook_id(&self, webhook_id: &str) -> Result<Option<Trigger>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|t| matches!(t, Trigger::Webhook(w) if w.webhook_id == webhook_id))
                .cloned())
        }
        async fn list_by_type(&self, trigger_type: TriggerType, _limit: i64) -> Result<Vec<Trigger>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.trigger_type() == trigger_type)
                .cloned()
                .collect())
        }
        async fn list_active(&self) -> Result<Vec<Trigger>> {
            Ok(self.rows.lock().unwrap().iter().filter(|t| t.is_active()).cloned().collect())
        }
        async fn update(&self, trigger: Trigger) -> Result<Trigger> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(slot) = rows.iter_mut().find(|t| t.id() == trigger.id()) {
                *slot = trigger.clone();
            }
            Ok(trigger)
        }
        async fn update_execution_tracking(&self, id: Uuid, last: chrono::DateTime<Utc>, failures: u32) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(slot) = rows.iter_mut().find(|t| t.id() == id) {
                let common = slot.common_mut();
                common.last_execution_at = Some(last);
                common.consecutive_failures = failures;
            }
            Ok(())
        }
        async fn set_active(&self, id: Uuid, is_active: bool) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(slot) = rows.iter_mut().find(|t| t.id() == id) {
                slot.common_mut().is_active = is_active;
            }
            Ok(())
        }
        async fn delete(&self, id: Uuid) -> Result<()> {
            self.rows.lock().unwrap().retain(|t| t.id() != id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryExecutions {
        rows: Mutex<Vec<TriggerExecution>>,
    }

    #[async_trait]
    impl TriggerExecutionRepository for InMemoryExecutions {
        async fn create(&self, execution: TriggerExecution) -> Result<TriggerExecution> {
            self.rows.lock().unwrap().push(execution.clone());
            Ok(execution)
        }
        async fn list_for_trigger(&self, trigger_id: Uuid, _limit: i64) -> Result<Vec<TriggerExecution>> {
            Ok(self.rows.lock().unwrap().iter().filter(|e| e.trigger_id == trigger_id).cloned().collect())
        }
        async fn count_executions_since(&self, trigger_id: Uuid, since: chrono::DateTime<Utc>) -> Result<i64> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.trigger_id == trigger_id && e.executed_at >= since)
                .count() as i64)
        }
    }

    struct NoopTasks;
    #[async_trait]
    impl TaskCreationClient for NoopTasks {
        async fn create_task_from_params(&self, _params: CreateTaskParams) -> Result<Uuid> {
            Ok(Uuid::new_v4())
        }
    }

    fn service() -> TriggerService {
        TriggerService::new(
            Arc::new(InMemoryTriggers::default()),
            Arc::new(InMemoryExecutions::default()),
            Arc::new(RuleBasedConditionEvaluator),
            Arc::new(NoopTasks),
            None,
        )
    }

    fn webhook_trigger() -> Trigger {
        Trigger::Webhook(WebhookTrigger {
            common: TriggerCommon {
                id: Uuid::new_v4(),
                name: "on-push".into(),
                description: None,
                agent_id: Uuid::new_v4(),
                created_by: "user-1".into(),
                is_active: true,
                conditions: None,
                task_parameters: None,
                max_executions_per_hour: 0,
                failure_threshold: 3,
                consecutive_failures: 0,
                last_execution_at: None,
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

    #[tokio::test]
    async fn create_trigger_validates_webhook_methods() {
        let service = service();
        let mut trigger = webhook_trigger();
        if let Trigger::Webhook(w) = &mut trigger {
            w.allowed_methods = vec!["TRACE".into()];
        }
        assert!(service.create_trigger(trigger).await.is_err());
    }

    #[tokio::test]
    async fn execute_trigger_creates_task_and_records_success() {
        let service = service();
        let trigger = service.create_trigger(webhook_trigger()).await.unwrap();

        let outcome = service.execute_trigger(trigger.id(), serde_json::json!({})).await.unwrap();
        assert_eq!(outcome.status, ExecutionStatusLabel::Success);
        assert!(outcome.task_id.is_some());
    }

    #[tokio::test]
    async fn execute_trigger_missing_returns_not_found() {
        let service = service();
        let result = service.execute_trigger(Uuid::new_v4(), serde_json::json!({})).await;
        assert!(matches!(result, Err(Error::TriggerNotFound(_))));
    }

    #[tokio::test]
    async fn inactive_trigger_is_skipped() {
        let service = service();
        let mut trigger = webhook_trigger();
        trigger.common_mut().is_active = false;
        let trigger = service.create_trigger(trigger).await.unwrap();

        let outcome = service.execute_trigger(trigger.id(), serde_json::json!({})).await.unwrap();
        assert_eq!(outcome.status, ExecutionStatusLabel::Skipped);
        assert_eq!(outcome.reason.as_deref(), Some("trigger_inactive"));
    }

    #[tokio::test]
    async fn failure_threshold_auto_disables_trigger() {
        let service = service();
        let trigger = service.create_trigger(webhook_trigger()).await.unwrap();

        for _ in 0..3 {
            service
                .record_execution(trigger.id(), ExecutionStatus::Failed, 1, None, Some("boom".into()), serde_json::json!({}))
                .await
                .unwrap();
        }

        let reloaded = service.get_trigger(trigger.id()).await.unwrap().unwrap();
        assert!(!reloaded.is_active());
    }

    #[tokio::test]
    async fn one_recent_execution_under_the_cap_is_not_rate_limited() {
        // max_executions_per_hour = 4, one execution 10 minutes ago: 1 < 4, allowed.
        let service = service();
        let mut trigger = webhook_trigger();
        trigger.common_mut().max_executions_per_hour = 4;
        let trigger = service.create_trigger(trigger).await.unwrap();
        service
            .record_execution(trigger.id(), ExecutionStatus::Success, 1, None, None, serde_json::json!({}))
            .await
            .unwrap();

        assert!(!service.is_rate_limited(&trigger).await.unwrap());
    }

    #[tokio::test]
    async fn rolling_hour_count_at_the_cap_is_rate_limited() {
        let service = service();
        let mut trigger = webhook_trigger();
        trigger.common_mut().max_executions_per_hour = 2;
        let trigger = service.create_trigger(trigger).await.unwrap();

        for _ in 0..2 {
            service
                .record_execution(trigger.id(), ExecutionStatus::Success, 1, None, None, serde_json::json!({}))
                .await
                .unwrap();
        }

        assert!(service.is_rate_limited(&trigger).await.unwrap());
    }

    #[tokio::test]
    async fn zero_limit_disables_rate_limiting() {
        let service = service();
        let mut trigger = webhook_trigger();
        trigger.common_mut().max_executions_per_hour = 0;
        let trigger = service.create_trigger(trigger).await.unwrap();
        for _ in 0..10 {
            service
                .record_execution(trigger.id(), ExecutionStatus::Success, 1, None, None, serde_json::json!({}))
                .await
                .unwrap();
        }

        assert!(!service.is_rate_limited(&trigger).await.unwrap());
    }
}
