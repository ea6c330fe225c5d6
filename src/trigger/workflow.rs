//! Trigger Execution Workflow (C7)
//!
//! A short, single-shot workflow started by a fired schedule or a webhook
//! handler. Grounded on `agentarea_execution.workflows.trigger_execution_workflow`.

use std::sync::Arc;

use uuid::Uuid;

use crate::activities::trigger as trigger_activities;
use crate::activities::ActivityContext;
use crate::error::Result;
use crate::trigger::service::{ExecutionStatusLabel, TriggerExecutionOutcome, TriggerService};

/// Input to one Trigger Execution Workflow run.
#[derive(Debug, Clone)]
pub struct TriggerExecutionInput {
    pub trigger_id: Uuid,
    pub event_data: serde_json::Value,
}

/// Runs one trigger to completion: evaluate conditions, then execute, then
/// record. Unlike the Agent Execution Workflow this has no iteration loop or
/// signals - it either completes or fails in one pass.
pub async fn run_trigger_execution_workflow(
    ctx: &ActivityContext,
    service: Arc<TriggerService>,
    input: TriggerExecutionInput,
) -> Result<TriggerExecutionOutcome> {
    let trigger = service
        .get_trigger(input.trigger_id)
        .await?
        .ok_or_else(|| crate::error::Error::TriggerNotFound(input.trigger_id.to_string()))?;

    let conditions_met = trigger_activities::evaluate_trigger_conditions(ctx, &service, &trigger, &input.event_data).await;

    if !conditions_met {
        let execution = service
            .record_execution(
                input.trigger_id,
                crate::trigger::model::ExecutionStatus::Skipped,
                0,
                None,
                Some("conditions_not_met".into()),
                input.event_data,
            )
            .await?;

        return Ok(TriggerExecutionOutcome {
            trigger_id: input.trigger_id,
            status: ExecutionStatusLabel::Skipped,
            reason: Some("conditions_not_met".into()),
            task_id: None,
            execution_id: Some(execution.id),
            execution_time_ms: 0,
        });
    }

    trigger_activities::execute_trigger(ctx, &service, input.trigger_id, input.event_data).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::tasks::{CreateTaskParams, TaskCreationClient};
    use crate::trigger::condition::RuleBasedConditionEvaluator;
    use crate::trigger::model::{Trigger, TriggerCommon, WebhookTrigger, WebhookType};
    use crate::trigger::repository::{TriggerExecutionRepository, TriggerRepository};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct InMemoryTriggers {
        rows: StdMutex<Vec<Trigger>>,
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
        async fn list_by_type(&self, _trigger_type: crate::trigger::model::TriggerType, _limit: i64) -> Result<Vec<Trigger>> {
            Ok(self.rows.lock().unwrap().clone())
        }
        async fn list_active(&self) -> Result<Vec<Trigger>> {
            Ok(self.rows.lock().unwrap().clone())
        }
        async fn update(&self, trigger: Trigger) -> Result<Trigger> {
            Ok(trigger)
        }
        async fn update_execution_tracking(&self, _id: Uuid, _last: chrono::DateTime<Utc>, _failures: u32) -> Result<()> {
            Ok(())
        }
        async fn set_active(&self, id: Uuid, is_active: bool) -> Result<()> {
            if let Some(slot) = self.rows.lock().unwrap().iter_mut().find(|t| t.id() == id) {
                slot.common_mut().is_active = is_active;
            }
            Ok(())
        }
        async fn delete(&self, _id: Uuid) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryExecutions;

    #[async_trait]
    impl TriggerExecutionRepository for InMemoryExecutions {
        async fn create(&self, execution: crate::trigger::model::TriggerExecution) -> Result<crate::trigger::model::TriggerExecution> {
            Ok(execution)
        }
        async fn list_for_trigger(&self, _trigger_id: Uuid, _limit: i64) -> Result<Vec<crate::trigger::model::TriggerExecution>> {
            Ok(vec![])
        }
        async fn count_executions_since(&self, _trigger_id: Uuid, _since: chrono::DateTime<chrono::Utc>) -> Result<i64> {
            Ok(0)
        }
    }

    struct NoopTasks;
    #[async_trait]
    impl TaskCreationClient for NoopTasks {
        async fn create_task_from_params(&self, _params: CreateTaskParams) -> Result<Uuid> {
            Ok(Uuid::new_v4())
        }
    }

    fn test_ctx() -> ActivityContext {
        ActivityContext {
            llm: Arc::new(crate::collaborators::llm::GatewayLlmClient::with_base_url(
                "x".repeat(40),
                "system".into(),
                "http://localhost".into(),
            )),
            tools: Arc::new(crate::collaborators::tools::LocalToolClient::new()),
            events: Arc::new(crate::collaborators::events::LoggingEventPublisher::new(None)),
            catalogue: Arc::new(crate::collaborators::catalogue::PostgresCatalogueClient::new(None)),
            secrets: Arc::new(crate::collaborators::secrets::EnvSecretResolver),
            db: None,
            activity_pool: Arc::new(crate::runtime::ActivityWorkerPool::new(4)),
            event_log: None,
        }
    }

    #[tokio::test]
    async fn runs_to_success_for_unconditional_active_trigger() {
        let ctx = test_ctx();
        let service = Arc::new(TriggerService::new(
            Arc::new(InMemoryTriggers::default()),
            Arc::new(InMemoryExecutions::default()),
            Arc::new(RuleBasedConditionEvaluator),
            Arc::new(NoopTasks),
            None,
        ));

        let trigger = Trigger::Webhook(WebhookTrigger {
            common: TriggerCommon {
                id: Uuid::new_v4(),
                name: "wh".into(),
                description: None,
                agent_id: Uuid::new_v4(),
                created_by: "user".into(),
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
            webhook_id: "hook".into(),
            allowed_methods: vec!["POST".into()],
            webhook_type: WebhookType::Generic,
            validation_rules: None,
            webhook_config: None,
        });
        let trigger = service.create_trigger(trigger).await.unwrap();

        let outcome = run_trigger_execution_workflow(
            &ctx,
            service,
            TriggerExecutionInput {
                trigger_id: trigger.id(),
                event_data: serde_json::json!({}),
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.status, ExecutionStatusLabel::Success);
    }
}
