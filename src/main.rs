//! agentflow worker/CLI entrypoint
//!
//! Mirrors the teacher's entrypoint shape (load `.env`, init tracing, build a
//! client from `DATABASE_URL`, dispatch a `clap` command) generalized from a
//! single-purpose ingestion CLI to the operational surface this engine
//! needs: run one agent to completion, manage triggers, or serve the cron
//! Schedule Manager as a long-lived worker.

use clap::{Parser, Subcommand};
use uuid::Uuid;

use agentflow::client::Engine;
use agentflow::config::Config;
use agentflow::observability::{self, ObservabilityConfig};
use agentflow::trigger::{CronTrigger, Trigger, TriggerCommon, TriggerType, WebhookTrigger, WebhookType};
use agentflow::workflow::AgentExecutionRequest;

#[derive(Parser)]
#[command(name = "agentflow", about = "Durable agent-task execution engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one Agent Execution Workflow to completion and print the result.
    RunAgent {
        agent_id: Uuid,
        /// The task query / goal description.
        query: String,
        #[arg(long, default_value_t = 10)]
        max_iterations: u32,
        #[arg(long)]
        budget_usd: Option<f64>,
    },
    /// Register a new cron-scheduled trigger.
    CreateCronTrigger {
        name: String,
        agent_id: Uuid,
        created_by: String,
        cron_expression: String,
        #[arg(long, default_value = "UTC")]
        timezone: String,
    },
    /// Register a new webhook trigger.
    CreateWebhookTrigger {
        name: String,
        agent_id: Uuid,
        created_by: String,
        webhook_id: String,
    },
    /// List configured triggers.
    ListTriggers {
        #[arg(long)]
        trigger_type: Option<String>,
    },
    EnableTrigger { id: Uuid },
    DisableTrigger { id: Uuid },
    DeleteTrigger { id: Uuid },
    /// Run as a long-lived worker: start the cron Schedule Manager and block.
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = Config::from_env()?;
    let observability_config = ObservabilityConfig {
        otlp_endpoint: config.otlp_endpoint.clone(),
        service_name: "agentflow".to_string(),
    };
    if let Err(e) = observability::init(observability_config) {
        tracing::warn!(error = %e, "observability init failed, continuing without metrics export");
    }

    let cli = Cli::parse();
    let needs_schedule = matches!(cli.command, Commands::Serve);
    let engine = Engine::builder()
        .config(config)
        .with_schedule(needs_schedule)
        .build()
        .await?;

    match cli.command {
        Commands::RunAgent {
            agent_id,
            query,
            max_iterations,
            budget_usd,
        } => {
            let request = AgentExecutionRequest {
                task_id: Uuid::new_v4(),
                agent_id,
                user_id: "cli".to_string(),
                task_query: query,
                task_parameters: serde_json::Map::new(),
                timeout_seconds: 600,
                max_reasoning_iterations: max_iterations,
                budget_usd,
                requires_human_approval: false,
                workflow_metadata: serde_json::Map::new(),
            };
            let (_handle, join) = engine.run_agent(request);
            let result = join.await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::CreateCronTrigger {
            name,
            agent_id,
            created_by,
            cron_expression,
            timezone,
        } => {
            let now = chrono::Utc::now();
            let trigger = Trigger::Cron(CronTrigger {
                common: TriggerCommon {
                    id: Uuid::new_v4(),
                    name,
                    description: None,
                    agent_id,
                    created_by,
                    is_active: true,
                    conditions: None,
                    task_parameters: None,
                    max_executions_per_hour: 0,
                    failure_threshold: 3,
                    consecutive_failures: 0,
                    last_execution_at: None,
                    created_at: now,
                    updated_at: now,
                },
                cron_expression,
                timezone,
                next_run_time: None,
            });
            let created = engine.trigger_service().create_trigger(trigger).await?;
            println!("{}", serde_json::to_string_pretty(&created)?);
        }
        Commands::CreateWebhookTrigger {
            name,
            agent_id,
            created_by,
            webhook_id,
        } => {
            let now = chrono::Utc::now();
            let trigger = Trigger::Webhook(WebhookTrigger {
                common: TriggerCommon {
                    id: Uuid::new_v4(),
                    name,
                    description: None,
                    agent_id,
                    created_by,
                    is_active: true,
                    conditions: None,
                    task_parameters: None,
                    max_executions_per_hour: 0,
                    failure_threshold: 3,
                    consecutive_failures: 0,
                    last_execution_at: None,
                    created_at: now,
                    updated_at: now,
                },
                webhook_id,
                allowed_methods: vec!["POST".to_string()],
                webhook_type: WebhookType::Generic,
                validation_rules: None,
                webhook_config: None,
            });
            let created = engine.trigger_service().create_trigger(trigger).await?;
            println!("{}", serde_json::to_string_pretty(&created)?);
        }
        Commands::ListTriggers { trigger_type } => {
            let filter = match trigger_type.as_deref() {
                Some("cron") => Some(TriggerType::Cron),
                Some("webhook") => Some(TriggerType::Webhook),
                _ => None,
            };
            let triggers = engine.trigger_service().list_triggers(filter, 100).await?;
            println!("{}", serde_json::to_string_pretty(&triggers)?);
        }
        Commands::EnableTrigger { id } => {
            engine.trigger_service().enable_trigger(id).await?;
            println!("enabled {id}");
        }
        Commands::DisableTrigger { id } => {
            engine.trigger_service().disable_trigger(id).await?;
            println!("disabled {id}");
        }
        Commands::DeleteTrigger { id } => {
            engine.trigger_service().delete_trigger(id).await?;
            println!("deleted {id}");
        }
        Commands::Serve => {
            engine.start_schedules().await?;
            tracing::info!("agentflow worker started, schedule manager running");
            tokio::signal::ctrl_c().await?;
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
