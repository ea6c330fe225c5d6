//! Trigger Execution subsystem (§4.7, §4.8)
//!
//! Scheduled (cron) and webhook-fired triggers that create tasks for the
//! Agent Execution Workflow to pick up. `service` owns CRUD plus the
//! end-to-end `execute_trigger` path; `schedule` wraps the cron job
//! scheduler; `workflow` is the short single-pass workflow a fired trigger
//! runs through; `condition`/`repository`/`model` are its supporting layers.

pub mod condition;
pub mod model;
pub mod repository;
pub mod schedule;
pub mod service;
pub mod workflow;

pub use model::{
    CronTrigger, ExecutionStatus, Trigger, TriggerCommon, TriggerExecution, TriggerType, WebhookTrigger, WebhookType,
};
pub use repository::{PgTriggerExecutionRepository, PgTriggerRepository, TriggerExecutionRepository, TriggerRepository};
pub use schedule::ScheduleManager;
pub use service::{ExecutionStatusLabel, TriggerExecutionOutcome, TriggerService};
pub use workflow::{run_trigger_execution_workflow, TriggerExecutionInput};
