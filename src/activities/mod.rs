//! Activity Layer (C2)
//!
//! Activities are the only place non-deterministic I/O occurs. Each activity
//! is `async fn(&ActivityContext, Input) -> Result<Output, ActivityError>`,
//! registered by name in an `ActivityRegistry` built at worker startup -
//! mirroring the teacher's factory-registration pattern in
//! `jobs::transform_factory`. The C9 workflow driver invokes activities
//! through `run_with_retry`, which wraps `tokio::time::timeout` and applies
//! the retry policy, distinguishing `ActivityError::Retryable` from
//! `ActivityError::NonRetryable`.

pub mod agent;
pub mod trigger;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::collaborators::{CatalogueClient, EventPublisher, LlmCompletionClient, SecretResolver, ToolExecutionClient};
use crate::error::ActivityError;
use crate::runtime::ActivityWorkerPool;

/// Default number of attempts for most activities.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// `publish_workflow_events` is fire-and-forget: a single attempt only.
pub const EVENT_PUBLISH_RETRY_ATTEMPTS: u32 = 1;
/// `evaluate_trigger_conditions` gets at most two attempts.
pub const CONDITION_EVAL_RETRY_ATTEMPTS: u32 = 2;

pub const ACTIVITY_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const LLM_CALL_TIMEOUT: Duration = Duration::from_secs(2 * 60);
pub const TOOL_EXECUTION_TIMEOUT: Duration = Duration::from_secs(3 * 60);
pub const EVENT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

const BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Dependency record every activity closes over. Built once at worker startup
/// and shared across all activity invocations; activities never hold
/// process-wide singletons of their own (per §9's "no global mutable state").
#[derive(Clone)]
pub struct ActivityContext {
    pub llm: Arc<dyn LlmCompletionClient>,
    pub tools: Arc<dyn ToolExecutionClient>,
    pub events: Arc<dyn EventPublisher>,
    pub catalogue: Arc<dyn CatalogueClient>,
    pub secrets: Arc<dyn SecretResolver>,
    pub db: Option<sqlx::PgPool>,
    /// Bounds how many activities this worker process runs concurrently (C9).
    pub activity_pool: Arc<ActivityWorkerPool>,
    /// Write-ahead log for crash replay (C9, invariant 8); absent in test
    /// contexts that never touch Postgres.
    pub event_log: Option<crate::runtime::WorkflowEventLog>,
}

/// Drive one activity attempt through a start-to-close timeout, then retry
/// according to `max_attempts` with exponential backoff (capped at
/// `BACKOFF_MAX`), short-circuiting immediately on a `NonRetryable` error.
/// Each attempt holds one `pool` permit for its duration, bounding how many
/// activities run concurrently across the worker process.
pub async fn run_with_retry<T, F, Fut>(
    pool: &ActivityWorkerPool,
    timeout: Duration,
    max_attempts: u32,
    mut make_attempt: F,
) -> Result<T, ActivityError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ActivityError>>,
{
    let mut backoff = BACKOFF_INITIAL;
    let mut last_err = None;

    for attempt in 1..=max_attempts.max(1) {
        let _permit = pool.acquire().await;
        match tokio::time::timeout(timeout, make_attempt()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => {
                if !err.is_retryable() {
                    return Err(err);
                }
                tracing::warn!(attempt, max_attempts, "activity attempt failed, retrying");
                last_err = Some(err);
            }
            Err(_) => {
                tracing::warn!(attempt, max_attempts, "activity attempt timed out");
                last_err = Some(ActivityError::Retryable(crate::error::Error::Other(
                    "activity timed out".into(),
                )));
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(BACKOFF_MAX);
        }
    }

    Err(last_err.unwrap_or_else(|| {
        ActivityError::Retryable(crate::error::Error::Other("activity exhausted retries".into()))
    }))
}

/// A boxed, name-dispatched activity: takes JSON input, returns JSON output.
/// Used by the registry for operational tooling (listing/introspecting
/// registered activities); the workflow code itself calls the typed
/// functions in `activities::agent`/`activities::trigger` directly.
pub type BoxedActivity = Arc<
    dyn Fn(ActivityContext, serde_json::Value) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ActivityError>> + Send>>
        + Send
        + Sync,
>;

/// Name-keyed table of activity implementations, built once at worker
/// startup. Names are contractual (§6): `build_agent_config_activity`,
/// `discover_available_tools_activity`, `call_llm_activity`,
/// `execute_mcp_tool_activity`, `check_task_completion_activity`,
/// `evaluate_goal_progress_activity`, `publish_workflow_events_activity`,
/// `execute_trigger_activity`, `record_trigger_execution_activity`,
/// `evaluate_trigger_conditions_activity`, `create_task_from_trigger_activity`.
#[derive(Clone, Default)]
pub struct ActivityRegistry {
    activities: HashMap<&'static str, BoxedActivity>,
}

impl ActivityRegistry {
    pub fn new() -> Self {
        Self {
            activities: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, activity: BoxedActivity) {
        self.activities.insert(name, activity);
    }

    pub fn get(&self, name: &str) -> Option<&BoxedActivity> {
        self.activities.get(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.activities.keys().copied().collect()
    }
}
