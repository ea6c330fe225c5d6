//! Environment-driven configuration
//!
//! Mirrors the fail-fast `from_env()` pattern used by `llm::TollboothClient::from_env`
//! and `tollbooth::validate_secret`: required variables are validated once at startup
//! so a misconfigured deployment fails immediately instead of surfacing as an
//! activity error deep inside a workflow.

use crate::error::{Error, Result};

/// Worker process configuration, loaded once at startup via [`Config::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string backing `triggers`, `trigger_executions`, and
    /// `workflow_event_log`.
    pub database_url: String,
    /// Base URL of the LLM gateway (Tollbooth-style OpenAI-compatible proxy).
    pub llm_gateway_url: String,
    /// Shared secret for authenticating to the LLM gateway.
    pub llm_gateway_secret: String,
    /// Default per-workflow budget in USD when a request omits `budget_usd`.
    pub default_budget_usd: f64,
    /// Fraction of budget consumed before a `BudgetWarning` event is due.
    pub budget_warning_threshold: f64,
    /// OTLP collector endpoint; metrics/traces are logged-only when absent.
    pub otlp_endpoint: Option<String>,
    /// Number of concurrent activity executions the worker pool drives.
    pub activity_worker_concurrency: usize,
    /// Base URL of the MCP tool server used by `McpToolClient`.
    pub mcp_server_url: Option<String>,
}

/// Minimum secret length for the LLM gateway shared secret (256 bits = 32 bytes),
/// matching the convention in `tollbooth::MIN_SECRET_LENGTH`.
pub const MIN_SECRET_LENGTH: usize = 32;

impl Config {
    /// Load configuration from the process environment, loading a `.env` file
    /// first if present. Fails fast with a `Configuration` error naming the
    /// first missing or invalid variable.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let database_url = require_var("DATABASE_URL")?;

        let llm_gateway_url = std::env::var("LLM_GATEWAY_URL").unwrap_or_else(|_| {
            tracing::warn!("LLM_GATEWAY_URL not set, using default localhost:9002");
            "http://localhost:9002".to_string()
        });
        let llm_gateway_secret = require_var("LLM_GATEWAY_SECRET")?;
        if llm_gateway_secret.len() < MIN_SECRET_LENGTH {
            return Err(Error::Configuration(format!(
                "LLM_GATEWAY_SECRET must be at least {MIN_SECRET_LENGTH} characters (got {})",
                llm_gateway_secret.len()
            )));
        }

        let default_budget_usd = optional_f64("DEFAULT_BUDGET_USD", 10.0)?;
        let budget_warning_threshold = optional_f64("BUDGET_WARNING_THRESHOLD", 0.8)?;
        let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();
        let activity_worker_concurrency = std::env::var("ACTIVITY_WORKER_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8);
        let mcp_server_url = std::env::var("MCP_SERVER_URL").ok();

        Ok(Self {
            database_url,
            llm_gateway_url,
            llm_gateway_secret,
            default_budget_usd,
            budget_warning_threshold,
            otlp_endpoint,
            activity_worker_concurrency,
            mcp_server_url,
        })
    }
}

fn require_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Configuration(format!("{name} not set in environment")))
}

fn optional_f64(name: &str, default: f64) -> Result<f64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<f64>()
            .map_err(|_| Error::Configuration(format!("{name} must be a number, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}
