//! Task creation collaborator
//!
//! Required by the Trigger Execution Workflow's `execute_trigger` step
//! (§4.7) to turn a fired trigger into a runnable task. Grounded on
//! `TaskService.create_task_from_params` in `trigger_execution_activities.py`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct CreateTaskParams {
    pub title: String,
    pub description: String,
    pub query: String,
    pub user_id: String,
    pub agent_id: Uuid,
    pub task_parameters: serde_json::Value,
}

#[async_trait]
pub trait TaskCreationClient: Send + Sync {
    async fn create_task_from_params(&self, params: CreateTaskParams) -> Result<Uuid>;
}

/// Persists a row to `tasks` and returns its id. Falls back to a freshly
/// minted id (no-op) when no database pool is configured, so trigger
/// execution remains exercisable without Postgres in tests.
pub struct PostgresTaskClient {
    pool: Option<sqlx::PgPool>,
}

impl PostgresTaskClient {
    pub fn new(pool: Option<sqlx::PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskCreationClient for PostgresTaskClient {
    async fn create_task_from_params(&self, params: CreateTaskParams) -> Result<Uuid> {
        let task_id = Uuid::new_v4();

        if let Some(pool) = &self.pool {
            sqlx::query(
                r#"
                INSERT INTO tasks (id, title, description, query, user_id, agent_id, task_parameters, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, now())
                "#,
            )
            .bind(task_id)
            .bind(&params.title)
            .bind(&params.description)
            .bind(&params.query)
            .bind(&params.user_id)
            .bind(params.agent_id)
            .bind(&params.task_parameters)
            .execute(pool)
            .await?;
        } else {
            tracing::debug!(%task_id, "no database configured, task creation is a no-op");
        }

        Ok(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn without_pool_still_mints_a_task_id() {
        let client = PostgresTaskClient::new(None);
        let task_id = client
            .create_task_from_params(CreateTaskParams {
                title: "t".into(),
                description: "d".into(),
                query: "q".into(),
                user_id: "u".into(),
                agent_id: Uuid::new_v4(),
                task_parameters: serde_json::json!({}),
            })
            .await
            .unwrap();
        assert_ne!(task_id, Uuid::nil());
    }
}
