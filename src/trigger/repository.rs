//! Postgres persistence for triggers and trigger executions
//!
//! Grounded on `agentarea_triggers.infrastructure.repository.{TriggerRepository,
//! TriggerExecutionRepository}` usage patterns visible in `trigger_service.py`
//! (`get_by_webhook_id`, `list_by_type`, `update_execution_tracking`), adapted
//! to `sqlx::PgPool` per §3.1's schema.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;

use super::model::{
    CronTrigger, ExecutionStatus, Trigger, TriggerCommon, TriggerExecution, TriggerType, WebhookTrigger, WebhookType,
};

#[async_trait]
pub trait TriggerRepository: Send + Sync {
    async fn create(&self, trigger: Trigger) -> Result<Trigger>;
    async fn get(&self, id: Uuid) -> Result<Option<Trigger>>;
    async fn get_by_webhook_id(&self, webhook_id: &str) -> Result<Option<Trigger>>;
    async fn list_by_type(&self, trigger_type: TriggerType, limit: i64) -> Result<Vec<Trigger>>;
    async fn list_active(&self) -> Result<Vec<Trigger>>;
    async fn update(&self, trigger: Trigger) -> Result<Trigger>;
    async fn update_execution_tracking(
        &self,
        id: Uuid,
        last_execution_at: chrono::DateTime<chrono::Utc>,
        consecutive_failures: u32,
    ) -> Result<()>;
    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait TriggerExecutionRepository: Send + Sync {
    async fn create(&self, execution: TriggerExecution) -> Result<TriggerExecution>;
    async fn list_for_trigger(&self, trigger_id: Uuid, limit: i64) -> Result<Vec<TriggerExecution>>;
    /// Count of executions for `trigger_id` with `executed_at >= since`, used
    /// by `TriggerService::is_rate_limited` to enforce `max_executions_per_hour`.
    async fn count_executions_since(&self, trigger_id: Uuid, since: chrono::DateTime<chrono::Utc>) -> Result<i64>;
}

pub struct PgTriggerRepository {
    pool: PgPool,
}

impl PgTriggerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TriggerRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    agent_id: Uuid,
    trigger_type: String,
    is_active: bool,
    task_parameters: Option<serde_json::Value>,
    conditions: Option<serde_json::Value>,
    created_by: String,
    max_executions_per_hour: i32,
    failure_threshold: i32,
    consecutive_failures: i32,
    last_execution_at: Option<chrono::DateTime<chrono::Utc>>,
    cron_expression: Option<String>,
    timezone: Option<String>,
    next_run_time: Option<chrono::DateTime<chrono::Utc>>,
    webhook_id: Option<String>,
    allowed_methods: Option<serde_json::Value>,
    webhook_type: Option<String>,
    validation_rules: Option<serde_json::Value>,
    webhook_config: Option<serde_json::Value>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<TriggerRow> for Trigger {
    type Error = crate::error::Error;

    fn try_from(row: TriggerRow) -> std::result::Result<Self, Self::Error> {
        let common = TriggerCommon {
            id: row.id,
            name: row.name,
            description: row.description,
            agent_id: row.agent_id,
            created_by: row.created_by,
            is_active: row.is_active,
            conditions: row.conditions,
            task_parameters: row.task_parameters,
            max_executions_per_hour: row.max_executions_per_hour.max(0) as u32,
            failure_threshold: row.failure_threshold.max(0) as u32,
            consecutive_failures: row.consecutive_failures.max(0) as u32,
            last_execution_at: row.last_execution_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };

        match row.trigger_type.as_str() {
            "cron" => Ok(Trigger::Cron(CronTrigger {
                common,
                cron_expression: row.cron_expression.ok_or_else(|| {
                    crate::error::Error::TriggerValidationError("cron trigger missing cron_expression".into())
                })?,
                timezone: row.timezone.unwrap_or_else(|| "UTC".to_string()),
                next_run_time: row.next_run_time,
            })),
            "webhook" => {
                let webhook_type = match row.webhook_type.as_deref() {
                    Some("telegram") => WebhookType::Telegram,
                    Some("slack") => WebhookType::Slack,
                    Some("github") => WebhookType::Github,
                    _ => WebhookType::Generic,
                };
                Ok(Trigger::Webhook(WebhookTrigger {
                    common,
                    webhook_id: row.webhook_id.ok_or_else(|| {
                        crate::error::Error::TriggerValidationError("webhook trigger missing webhook_id".into())
                    })?,
                    allowed_methods: row
                        .allowed_methods
                        .map(|v| serde_json::from_value(v).unwrap_or_default())
                        .unwrap_or_default(),
                    webhook_type,
                    validation_rules: row.validation_rules,
                    webhook_config: row.webhook_config,
                }))
            }
            other => Err(crate::error::Error::TriggerValidationError(format!(
                "unknown trigger_type `{other}`"
            ))),
        }
    }
}

#[async_trait]
impl TriggerRepository for PgTriggerRepository {
    async fn create(&self, trigger: Trigger) -> Result<Trigger> {
        let common = trigger.common().clone();
        let (trigger_type, cron_expression, timezone, next_run_time, webhook_id, allowed_methods, webhook_type, validation_rules, webhook_config) =
            match &trigger {
                Trigger::Cron(t) => (
                    "cron",
                    Some(t.cron_expression.clone()),
                    Some(t.timezone.clone()),
                    t.next_run_time,
                    None,
                    None,
                    None,
                    None,
                    None,
                ),
                Trigger::Webhook(t) => (
                    "webhook",
                    None,
                    None,
                    None,
                    Some(t.webhook_id.clone()),
                    Some(serde_json::to_value(&t.allowed_methods)?),
                    Some(format!("{:?}", t.webhook_type).to_lowercase()),
                    t.validation_rules.clone(),
                    t.webhook_config.clone(),
                ),
            };

        sqlx::query(
            r#"
            INSERT INTO triggers (
                id, name, description, agent_id, trigger_type, is_active, task_parameters, conditions,
                created_by, max_executions_per_hour, failure_threshold, consecutive_failures, last_execution_at,
                cron_expression, timezone, next_run_time, webhook_id, allowed_methods, webhook_type,
                validation_rules, webhook_config, created_at, updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23)
            "#,
        )
        .bind(common.id)
        .bind(&common.name)
        .bind(&common.description)
        .bind(common.agent_id)
        .bind(trigger_type)
        .bind(common.is_active)
        .bind(&common.task_parameters)
        .bind(&common.conditions)
        .bind(&common.created_by)
        .bind(common.max_executions_per_hour as i32)
        .bind(common.failure_threshold as i32)
        .bind(common.consecutive_failures as i32)
        .bind(common.last_execution_at)
        .bind(cron_expression)
        .bind(timezone)
        .bind(next_run_time)
        .bind(webhook_id)
        .bind(allowed_methods)
        .bind(webhook_type)
        .bind(validation_rules)
        .bind(webhook_config)
        .bind(common.created_at)
        .bind(common.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(trigger)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Trigger>> {
        let row = sqlx::query_as::<_, TriggerRow>("SELECT * FROM triggers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Trigger::try_from).transpose()
    }

    async fn get_by_webhook_id(&self, webhook_id: &str) -> Result<Option<Trigger>> {
        let row = sqlx::query_as::<_, TriggerRow>("SELECT * FROM triggers WHERE webhook_id = $1")
            .bind(webhook_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Trigger::try_from).transpose()
    }

    async fn list_by_type(&self, trigger_type: TriggerType, limit: i64) -> Result<Vec<Trigger>> {
        let type_str = match trigger_type {
            TriggerType::Cron => "cron",
            TriggerType::Webhook => "webhook",
        };
        let rows = sqlx::query_as::<_, TriggerRow>(
            "SELECT * FROM triggers WHERE trigger_type = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(type_str)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Trigger::try_from).collect()
    }

    async fn list_active(&self) -> Result<Vec<Trigger>> {
        let rows = sqlx::query_as::<_, TriggerRow>("SELECT * FROM triggers WHERE is_active = true")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Trigger::try_from).collect()
    }

    async fn update(&self, trigger: Trigger) -> Result<Trigger> {
        // Simplest correct update: delete + recreate within the row's id,
        // mirroring the upsert the teacher's stream-config writer performs.
        let common = trigger.common();
        sqlx::query("DELETE FROM triggers WHERE id = $1")
            .bind(common.id)
            .execute(&self.pool)
            .await?;
        self.create(trigger).await
    }

    async fn update_execution_tracking(
        &self,
        id: Uuid,
        last_execution_at: chrono::DateTime<chrono::Utc>,
        consecutive_failures: u32,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE triggers SET last_execution_at = $2, consecutive_failures = $3, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(last_execution_at)
        .bind(consecutive_failures as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<()> {
        sqlx::query("UPDATE triggers SET is_active = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(is_active)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM trigger_executions WHERE trigger_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM triggers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct PgTriggerExecutionRepository {
    pool: PgPool,
}

impl PgTriggerExecutionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ExecutionRow {
    id: Uuid,
    trigger_id: Uuid,
    status: String,
    execution_time_ms: i64,
    task_id: Option<Uuid>,
    error_message: Option<String>,
    trigger_data: serde_json::Value,
    executed_at: chrono::DateTime<chrono::Utc>,
}

impl From<ExecutionRow> for TriggerExecution {
    fn from(row: ExecutionRow) -> Self {
        let status = match row.status.as_str() {
            "success" => ExecutionStatus::Success,
            "failed" => ExecutionStatus::Failed,
            _ => ExecutionStatus::Skipped,
        };
        TriggerExecution {
            id: row.id,
            trigger_id: row.trigger_id,
            status,
            execution_time_ms: row.execution_time_ms,
            task_id: row.task_id,
            error_message: row.error_message,
            trigger_data: row.trigger_data,
            workflow_id: None,
            run_id: None,
            executed_at: row.executed_at,
        }
    }
}

#[async_trait]
impl TriggerExecutionRepository for PgTriggerExecutionRepository {
    async fn create(&self, execution: TriggerExecution) -> Result<TriggerExecution> {
        sqlx::query(
            r#"
            INSERT INTO trigger_executions (id, trigger_id, executed_at, status, task_id, execution_time_ms, error_message, trigger_data)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            "#,
        )
        .bind(execution.id)
        .bind(execution.trigger_id)
        .bind(execution.executed_at)
        .bind(execution.status.to_string())
        .bind(execution.task_id)
        .bind(execution.execution_time_ms)
        .bind(&execution.error_message)
        .bind(&execution.trigger_data)
        .execute(&self.pool)
        .await?;

        Ok(execution)
    }

    async fn list_for_trigger(&self, trigger_id: Uuid, limit: i64) -> Result<Vec<TriggerExecution>> {
        let rows = sqlx::query_as::<_, ExecutionRow>(
            "SELECT * FROM trigger_executions WHERE trigger_id = $1 ORDER BY executed_at DESC LIMIT $2",
        )
        .bind(trigger_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TriggerExecution::from).collect())
    }

    async fn count_executions_since(&self, trigger_id: Uuid, since: chrono::DateTime<chrono::Utc>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM trigger_executions WHERE trigger_id = $1 AND executed_at >= $2",
        )
        .bind(trigger_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
