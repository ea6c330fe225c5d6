//! Write-ahead workflow event log (§4.9, §3.1)
//!
//! One row is appended per state transition before its activity is awaited,
//! so a crashed worker can replay `workflow_event_log` from Postgres and
//! resume at the last uncompleted activity. Distinct from the externally
//! published event broker feed (`collaborators::events::EventPublisher`):
//! this table exists purely for crash recovery, never for observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::{Error, Result};

/// One write-ahead row, as replayed back from Postgres.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEventRecord {
    pub execution_id: String,
    pub sequence: i32,
    pub activity_name: String,
    pub payload: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct EventRow {
    execution_id: String,
    sequence: i32,
    activity_name: String,
    payload: serde_json::Value,
    recorded_at: DateTime<Utc>,
}

impl From<EventRow> for WorkflowEventRecord {
    fn from(row: EventRow) -> Self {
        Self {
            execution_id: row.execution_id,
            sequence: row.sequence,
            activity_name: row.activity_name,
            payload: row.payload,
            recorded_at: row.recorded_at,
        }
    }
}

#[derive(Clone)]
pub struct WorkflowEventLog {
    pool: PgPool,
}

impl WorkflowEventLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one write-ahead row before `activity_name` is awaited.
    /// `(execution_id, sequence)` is a natural idempotency key: a worker
    /// that crashes between this append and the activity's completion
    /// replays the same sequence number on resume, so a duplicate insert is
    /// silently ignored rather than erroring.
    pub async fn append(
        &self,
        execution_id: &str,
        sequence: i32,
        activity_name: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO workflow_event_log (execution_id, sequence, activity_name, payload) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (execution_id, sequence) DO NOTHING",
        )
        .bind(execution_id)
        .bind(sequence)
        .bind(activity_name)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(Error::Sql)?;
        Ok(())
    }

    /// Replay the full write-ahead history for one execution, in sequence
    /// order - what a crash-recovered worker reads before resuming.
    pub async fn replay(&self, execution_id: &str) -> Result<Vec<WorkflowEventRecord>> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT execution_id, sequence, activity_name, payload, recorded_at \
             FROM workflow_event_log WHERE execution_id = $1 ORDER BY sequence ASC",
        )
        .bind(execution_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sql)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Sequence number the next `append` for this execution should use -
    /// one past the highest recorded so far, or zero for a fresh execution.
    pub async fn next_sequence(&self, execution_id: &str) -> Result<i32> {
        let row: (Option<i32>,) =
            sqlx::query_as("SELECT MAX(sequence) FROM workflow_event_log WHERE execution_id = $1")
                .bind(execution_id)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Sql)?;
        Ok(row.0.map_or(0, |s| s + 1))
    }
}
