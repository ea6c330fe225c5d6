//! Error types for agentflow

use thiserror::Error;

/// Main error type for the agent execution engine
#[derive(Debug, Error)]
pub enum Error {
    /// Agent config failed validation (missing id/name/model_id)
    #[error("Agent config invalid: {0}")]
    AgentConfigInvalid(String),

    /// Discovered tool list failed validation
    #[error("Tools invalid: {0}")]
    ToolsInvalid(String),

    /// LLM call failed - transport/quota errors are retryable, auth/validation are not
    #[error("LLM call failed: {0}")]
    LlmCallFailed(String),

    /// Tool execution failed (recovered locally, surfaced as a tool message)
    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    /// Goal progress evaluator failed (swallowed by the workflow)
    #[error("Goal evaluation failed: {0}")]
    GoalEvaluationFailed(String),

    /// Event publish failed (swallowed, single attempt only)
    #[error("Event publish failed: {0}")]
    EventPublishFailed(String),

    /// Trigger row not found
    #[error("Trigger not found: {0}")]
    TriggerNotFound(String),

    /// Trigger data failed validation
    #[error("Trigger validation error: {0}")]
    TriggerValidationError(String),

    /// Budget tracker reports the limit has been exceeded
    #[error("Budget exceeded: cost {cost} >= limit {limit}")]
    BudgetExceeded { cost: f64, limit: f64 },

    /// Workflow was cancelled via signal
    #[error("Execution cancelled: {0}")]
    Cancelled(String),

    /// Configuration errors raised at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Catch-all for collaborator/transport failures that don't fit elsewhere
    #[error("{0}")]
    Other(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database errors
    #[error("Database error: {0}")]
    Sql(#[from] sqlx::Error),

    /// HTTP client errors (LLM gateway, event broker, webhooks)
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Result type alias for agentflow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Whether a failure should be retried by the activity driver, carried alongside
/// the underlying `Error` so retry policy doesn't need to be re-derived from the
/// error message text. Mirrors the retryable/non-retryable split the activity
/// contracts in §4.2 require.
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error(transparent)]
    Retryable(Error),

    #[error(transparent)]
    NonRetryable(Error),
}

impl ActivityError {
    pub fn into_inner(self) -> Error {
        match self {
            ActivityError::Retryable(e) => e,
            ActivityError::NonRetryable(e) => e,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ActivityError::Retryable(_))
    }
}

impl From<Error> for ActivityError {
    /// Default conservative mapping used when a call site hasn't classified the
    /// failure explicitly: config/validation/trigger errors are non-retryable,
    /// everything else (transport, db, serialization) is retried.
    fn from(err: Error) -> Self {
        match &err {
            Error::AgentConfigInvalid(_)
            | Error::ToolsInvalid(_)
            | Error::TriggerNotFound(_)
            | Error::TriggerValidationError(_)
            | Error::Configuration(_)
            | Error::Cancelled(_) => ActivityError::NonRetryable(err),
            _ => ActivityError::Retryable(err),
        }
    }
}
