//! Engine: the wired-together collaborator stack a worker process drives.
//!
//! Generalizes the teacher's `Ariata`/`AriataBuilder` (a `Database`/`Storage`
//! pair built from a connection-string builder) into the C1 collaborator
//! stack behind `ActivityContext` plus the Trigger Execution subsystem built
//! on top of it, assembled the same way: a builder that falls back to
//! environment configuration when a field isn't set explicitly.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::activities::ActivityContext;
use crate::collaborators::catalogue::PostgresCatalogueClient;
use crate::collaborators::events::LoggingEventPublisher;
use crate::collaborators::llm::GatewayLlmClient;
use crate::collaborators::secrets::EnvSecretResolver;
use crate::collaborators::tasks::PostgresTaskClient;
use crate::collaborators::tools::{LocalToolClient, McpToolClient, ToolExecutionClient};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::runtime::{ActivityWorkerPool, WorkflowEventLog};
use crate::trigger::condition::RuleBasedConditionEvaluator;
use crate::trigger::repository::{PgTriggerExecutionRepository, PgTriggerRepository};
use crate::trigger::schedule::ScheduleManager;
use crate::trigger::service::{TriggerExecutionOutcome, TriggerService};
use crate::trigger::workflow::{run_trigger_execution_workflow, TriggerExecutionInput};
use crate::workflow::{run_agent_execution_workflow, AgentExecutionRequest, AgentExecutionResult, WorkflowHandle};

/// The dependency graph a worker process holds: the collaborator stack
/// behind `ActivityContext`, and the Trigger Execution subsystem (service +
/// optional cron Schedule Manager) built on top of the same Postgres pool.
#[derive(Clone)]
pub struct Engine {
    ctx: ActivityContext,
    trigger_service: Arc<TriggerService>,
    schedule: Option<Arc<ScheduleManager>>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn activity_context(&self) -> &ActivityContext {
        &self.ctx
    }

    pub fn trigger_service(&self) -> &Arc<TriggerService> {
        &self.trigger_service
    }

    /// Start one Agent Execution Workflow instance. Returns immediately with
    /// a handle for signals/queries (§4.6) and a join handle for the final
    /// `AgentExecutionResult`.
    pub fn run_agent(&self, request: AgentExecutionRequest) -> (Arc<WorkflowHandle>, JoinHandle<AgentExecutionResult>) {
        run_agent_execution_workflow(self.ctx.clone(), request)
    }

    /// Run one Trigger Execution Workflow pass to completion - the entry
    /// point a webhook handler calls once the request is validated.
    pub async fn run_trigger(&self, trigger_id: Uuid, event_data: serde_json::Value) -> Result<TriggerExecutionOutcome> {
        run_trigger_execution_workflow(
            &self.ctx,
            self.trigger_service.clone(),
            TriggerExecutionInput { trigger_id, event_data },
        )
        .await
    }

    /// Start the cron scheduler, if one was configured via
    /// `EngineBuilder::with_schedule(true)`.
    pub async fn start_schedules(&self) -> Result<()> {
        if let Some(schedule) = &self.schedule {
            schedule.start().await?;
        }
        Ok(())
    }
}

/// Builds an [`Engine`] from a [`Config`] (or the environment, if none is
/// supplied), assembling the C1 collaborator stack and the Trigger Execution
/// subsystem behind it.
#[derive(Default)]
pub struct EngineBuilder {
    config: Option<Config>,
    with_schedule: bool,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Enable the cron Schedule Manager. Off by default so a short-lived CLI
    /// invocation (e.g. `run-agent`) doesn't pay for a scheduler it never uses.
    pub fn with_schedule(mut self, enabled: bool) -> Self {
        self.with_schedule = enabled;
        self
    }

    pub async fn build(self) -> Result<Engine> {
        let config = match self.config {
            Some(c) => c,
            None => Config::from_env()?,
        };

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_lazy(&config.database_url)
            .map_err(Error::Sql)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| Error::Configuration(format!("failed to run migrations: {e}")))?;

        let llm = Arc::new(GatewayLlmClient::with_base_url(
            config.llm_gateway_secret.clone(),
            crate::tollbooth::SYSTEM_USER_ID.to_string(),
            config.llm_gateway_url.clone(),
        ));
        let tools: Arc<dyn ToolExecutionClient> = match &config.mcp_server_url {
            Some(url) => Arc::new(McpToolClient::new(url.clone())),
            None => Arc::new(LocalToolClient::new()),
        };
        let events = Arc::new(LoggingEventPublisher::new(None));
        let catalogue = Arc::new(PostgresCatalogueClient::new(Some(pool.clone())));
        let secrets = Arc::new(EnvSecretResolver);
        let activity_pool = Arc::new(ActivityWorkerPool::new(config.activity_worker_concurrency));
        let event_log = Some(WorkflowEventLog::new(pool.clone()));

        let ctx = ActivityContext {
            llm,
            tools,
            events,
            catalogue,
            secrets,
            db: Some(pool.clone()),
            activity_pool,
            event_log,
        };

        let triggers = Arc::new(PgTriggerRepository::new(pool.clone()));
        let executions = Arc::new(PgTriggerExecutionRepository::new(pool.clone()));
        let tasks = Arc::new(PostgresTaskClient::new(Some(pool.clone())));
        let condition_evaluator = Arc::new(RuleBasedConditionEvaluator);

        // The fire callback needs the `TriggerService` it's about to be
        // handed to, and the service needs the schedule manager - broken
        // with a cell the callback reads lazily, since no trigger can fire
        // before `start_schedules` runs, which happens well after `build`.
        let service_cell: Arc<OnceCell<Arc<TriggerService>>> = Arc::new(OnceCell::new());

        let schedule = if self.with_schedule {
            let service_cell = service_cell.clone();
            let manager = ScheduleManager::new(Arc::new(move |trigger_id| {
                let service_cell = service_cell.clone();
                tokio::spawn(async move {
                    let Some(service) = service_cell.get() else {
                        tracing::warn!(%trigger_id, "schedule fired before trigger service was ready");
                        return;
                    };
                    if let Err(e) = service.execute_trigger(trigger_id, serde_json::json!({})).await {
                        tracing::error!(%trigger_id, error = %e, "scheduled trigger execution failed");
                    }
                });
            }))
            .await?;
            Some(Arc::new(manager))
        } else {
            None
        };

        let trigger_service = Arc::new(TriggerService::new(
            triggers,
            executions,
            condition_evaluator,
            tasks,
            schedule.clone(),
        ));
        let _ = service_cell.set(trigger_service.clone());

        Ok(Engine {
            ctx,
            trigger_service,
            schedule,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_no_schedule() {
        let builder = EngineBuilder::new();
        assert!(!builder.with_schedule);
    }

    #[test]
    fn builder_with_schedule_toggles_flag() {
        let builder = EngineBuilder::new().with_schedule(true);
        assert!(builder.with_schedule);
    }
}
