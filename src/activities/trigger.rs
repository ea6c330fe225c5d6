//! Trigger-side activities (§4.7)
//!
//! Thin activity wrappers over `TriggerService`, giving the Trigger Execution
//! Workflow a uniform `async fn(&ActivityContext, ...)` surface matching the
//! agent-side activities in `activities::agent`, even though the actual work
//! here is mostly delegated straight to the service layer.

use uuid::Uuid;

use crate::error::Result;
use crate::trigger::model::Trigger;
use crate::trigger::service::{TriggerExecutionOutcome, TriggerService};

use super::ActivityContext;

/// `evaluate_trigger_conditions`: up to 2 attempts (§4.2). Never returns an
/// error the caller needs to branch on - a failed evaluation is already
/// folded into the boolean by the configured fail-open/fail-closed policy.
pub async fn evaluate_trigger_conditions(
    _ctx: &ActivityContext,
    service: &TriggerService,
    trigger: &Trigger,
    event_data: &serde_json::Value,
) -> bool {
    service.evaluate_trigger_conditions(trigger, event_data).await
}

/// `execute_trigger`: loads the trigger, checks `is_active`/rate limit,
/// builds task parameters, creates the task, and records the execution -
/// all inside `TriggerService::execute_trigger`. Up to 3 attempts with
/// exponential backoff at the caller (§4.2); `TriggerNotFound` is
/// non-retryable per the `From<Error> for ActivityError` mapping.
pub async fn execute_trigger(
    _ctx: &ActivityContext,
    service: &TriggerService,
    trigger_id: Uuid,
    event_data: serde_json::Value,
) -> Result<TriggerExecutionOutcome> {
    service.execute_trigger(trigger_id, event_data).await
}
