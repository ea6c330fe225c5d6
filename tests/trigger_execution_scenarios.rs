//! End-to-end acceptance scenarios for the Trigger Execution Workflow (§8 S6-S8).
//!
//! Drives `run_trigger_execution_workflow`/`TriggerService::execute_trigger`
//! through a real `TriggerService` wired to in-memory repositories, the same
//! way `service.rs`/`workflow.rs`'s own unit tests do, but end-to-end through
//! the workflow entry point a worker process actually calls.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use agentflow::activities::ActivityContext;
use agentflow::collaborators::tasks::{CreateTaskParams, TaskCreationClient};
use agentflow::error::Result;
use agentflow::runtime::ActivityWorkerPool;
use agentflow::trigger::condition::RuleBasedConditionEvaluator;
use agentflow::trigger::model::{CronTrigger, ExecutionStatus, Trigger, TriggerCommon, TriggerType};
use agentflow::trigger::repository::{TriggerExecutionRepository, TriggerRepository};
use agentflow::trigger::service::{ExecutionStatusLabel, TriggerService};
use agentflow::trigger::workflow::{run_trigger_execution_workflow, TriggerExecutionInput};

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
    async fn get_by_webhook_id(&self, _webhook_id: &str) -> Result<Option<Trigger>> {
        Ok(None)
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
    rows: Mutex<Vec<agentflow::trigger::model::TriggerExecution>>,
}

#[async_trait]
impl TriggerExecutionRepository for InMemoryExecutions {
    async fn create(&self, execution: agentflow::trigger::model::TriggerExecution) -> Result<agentflow::trigger::model::TriggerExecution> {
        self.rows.lock().unwrap().push(execution.clone());
        Ok(execution)
    }
    async fn list_for_trigger(&self, trigger_id: Uuid, _limit: i64) -> Result<Vec<agentflow::trigger::model::TriggerExecution>> {
        Ok(self.rows.lock().unwrap().iter().filter(|e| e.trigger_id == trigger_id).cloned().collect())
    }
    async fn count_executions_since(&self, trigger_id: Uuid, since: chrono::DateTime<chrono::Utc>) -> Result<i64> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.trigger_id == trigger_id && e.executed_at >= since)
            .count() as i64)
    }
}

/// Records every `CreateTaskParams` it receives, so tests can assert on the
/// merged task parameters a trigger fire produced.
#[derive(Default)]
struct RecordingTasks {
    created: Mutex<Vec<CreateTaskParams>>,
}

#[async_trait]
impl TaskCreationClient for RecordingTasks {
    async fn create_task_from_params(&self, params: CreateTaskParams) -> Result<Uuid> {
        self.created.lock().unwrap().push(params);
        Ok(Uuid::new_v4())
    }
}

fn test_activity_ctx() -> ActivityContext {
    ActivityContext {
        llm: Arc::new(agentflow::collaborators::llm::GatewayLlmClient::with_base_url(
            "x".repeat(40),
            "system".into(),
            "http://localhost".into(),
        )),
        tools: Arc::new(agentflow::collaborators::tools::LocalToolClient::new()),
        events: Arc::new(agentflow::collaborators::events::LoggingEventPublisher::new(None)),
        catalogue: Arc::new(agentflow::collaborators::catalogue::PostgresCatalogueClient::new(None)),
        secrets: Arc::new(agentflow::collaborators::secrets::EnvSecretResolver),
        db: None,
        activity_pool: Arc::new(ActivityWorkerPool::new(4)),
        event_log: None,
    }
}

fn cron_trigger(conditions: Option<serde_json::Value>) -> Trigger {
    Trigger::Cron(CronTrigger {
        common: TriggerCommon {
            id: Uuid::new_v4(),
            name: "nightly-digest".into(),
            description: Some("summarize the day's activity".into()),
            agent_id: Uuid::new_v4(),
            created_by: "user-1".into(),
            is_active: true,
            conditions,
            task_parameters: None,
            max_executions_per_hour: 0,
            failure_threshold: 3,
            consecutive_failures: 0,
            last_execution_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        },
        cron_expression: "0 9 * * *".into(),
        timezone: "UTC".into(),
        next_run_time: None,
    })
}

/// S6: a cron trigger with no conditions fires on schedule, creates a task,
/// and records a `success` execution.
#[tokio::test]
async fn s6_cron_trigger_fires_and_creates_task() {
    let ctx = test_activity_ctx();
    let tasks = Arc::new(RecordingTasks::default());
    let service = Arc::new(TriggerService::new(
        Arc::new(InMemoryTriggers::default()),
        Arc::new(InMemoryExecutions::default()),
        Arc::new(RuleBasedConditionEvaluator),
        tasks.clone(),
        None,
    ));

    let trigger = service.create_trigger(cron_trigger(None)).await.unwrap();

    let outcome = run_trigger_execution_workflow(
        &ctx,
        service.clone(),
        TriggerExecutionInput {
            trigger_id: trigger.id(),
            event_data: serde_json::json!({"source": "scheduler"}),
        },
    )
    .await
    .unwrap();

    assert_eq!(outcome.status, ExecutionStatusLabel::Success);
    assert!(outcome.task_id.is_some());

    let created = tasks.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].agent_id, trigger.common().agent_id);
    assert_eq!(created[0].task_parameters["trigger_id"], serde_json::json!(trigger.id()));

    let reloaded = service.get_trigger(trigger.id()).await.unwrap().unwrap();
    assert_eq!(reloaded.common().consecutive_failures, 0);
    assert!(reloaded.common().last_execution_at.is_some());
}

/// S7: a cron trigger with a `field_matches` condition the firing event fails
/// to satisfy is skipped - no task is created, and a `skipped` execution is
/// recorded without counting against the failure threshold.
#[tokio::test]
async fn s7_condition_not_met_skips_without_creating_a_task() {
    let ctx = test_activity_ctx();
    let tasks = Arc::new(RecordingTasks::default());
    let executions = Arc::new(InMemoryExecutions::default());
    let service = Arc::new(TriggerService::new(
        Arc::new(InMemoryTriggers::default()),
        executions.clone(),
        Arc::new(RuleBasedConditionEvaluator),
        tasks.clone(),
        None,
    ));

    let conditions = serde_json::json!({"field_matches": {"status": "ready"}});
    let trigger = service.create_trigger(cron_trigger(Some(conditions))).await.unwrap();

    let outcome = run_trigger_execution_workflow(
        &ctx,
        service.clone(),
        TriggerExecutionInput {
            trigger_id: trigger.id(),
            event_data: serde_json::json!({"status": "pending"}),
        },
    )
    .await
    .unwrap();

    assert_eq!(outcome.status, ExecutionStatusLabel::Skipped);
    assert_eq!(outcome.reason.as_deref(), Some("conditions_not_met"));
    assert!(tasks.created.lock().unwrap().is_empty());

    let recorded = executions.list_for_trigger(trigger.id(), 10).await.unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].status, ExecutionStatus::Skipped);

    let reloaded = service.get_trigger(trigger.id()).await.unwrap().unwrap();
    assert_eq!(reloaded.common().consecutive_failures, 0);
}

/// S8: three consecutive failed executions push `consecutive_failures` to the
/// trigger's `failure_threshold`, auto-disabling it so no further schedule
/// fire can execute it.
#[tokio::test]
async fn s8_three_consecutive_failures_auto_disable_the_trigger() {
    let service = TriggerService::new(
        Arc::new(InMemoryTriggers::default()),
        Arc::new(InMemoryExecutions::default()),
        Arc::new(RuleBasedConditionEvaluator),
        Arc::new(RecordingTasks::default()),
        None,
    );

    let trigger = service.create_trigger(cron_trigger(None)).await.unwrap();
    assert_eq!(trigger.common().failure_threshold, 3);

    for n in 1..=3 {
        service
            .record_execution(
                trigger.id(),
                ExecutionStatus::Failed,
                4,
                None,
                Some("downstream agent unreachable".into()),
                serde_json::json!({}),
            )
            .await
            .unwrap();

        let reloaded = service.get_trigger(trigger.id()).await.unwrap().unwrap();
        assert_eq!(reloaded.common().consecutive_failures, n);
        assert_eq!(reloaded.is_active(), n < 3);
    }

    let disabled = service.get_trigger(trigger.id()).await.unwrap().unwrap();
    assert!(!disabled.is_active());

    // A schedule firing against a now-disabled trigger is skipped, not failed.
    let outcome = service.execute_trigger(trigger.id(), serde_json::json!({})).await.unwrap();
    assert_eq!(outcome.status, ExecutionStatusLabel::Skipped);
    assert_eq!(outcome.reason.as_deref(), Some("trigger_inactive"));
}

/// A success in between failures resets the counter back to zero, so the
/// threshold only trips on an unbroken run of failures.
#[tokio::test]
async fn a_success_resets_the_consecutive_failure_counter() {
    let service = TriggerService::new(
        Arc::new(InMemoryTriggers::default()),
        Arc::new(InMemoryExecutions::default()),
        Arc::new(RuleBasedConditionEvaluator),
        Arc::new(RecordingTasks::default()),
        None,
    );

    let trigger = service.create_trigger(cron_trigger(None)).await.unwrap();

    for _ in 0..2 {
        service
            .record_execution(trigger.id(), ExecutionStatus::Failed, 1, None, Some("boom".into()), serde_json::json!({}))
            .await
            .unwrap();
    }
    service
        .record_execution(trigger.id(), ExecutionStatus::Success, 1, Some(Uuid::new_v4()), None, serde_json::json!({}))
        .await
        .unwrap();

    let reloaded = service.get_trigger(trigger.id()).await.unwrap().unwrap();
    assert_eq!(reloaded.common().consecutive_failures, 0);
    assert!(reloaded.is_active());
}
