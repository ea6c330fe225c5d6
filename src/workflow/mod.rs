//! Agent Execution Workflow (C6) - §4.6
//!
//! The core state machine: initialize (resolve agent config + tools) ->
//! iterate (build messages, call the LLM, dispatch tool calls, check goal
//! progress) until a termination condition fires -> finalize. Single-threaded
//! cooperative per execution (§5): one `tokio::task` owns `&mut
//! AgentExecutionState` for the whole run; external signals are queued
//! through `WorkflowHandle` and drained by that same task at defined gate
//! points, never mutating state from another task.

pub mod handle;
pub mod signal;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::activities::agent as agent_activities;
use crate::activities::{run_with_retry, ActivityContext, DEFAULT_RETRY_ATTEMPTS, LLM_CALL_TIMEOUT, TOOL_EXECUTION_TIMEOUT};
use crate::budget::{BudgetTracker, FALLBACK_COST_PER_TOKEN};
use crate::collaborators::catalogue::ToolDescriptor;
use crate::collaborators::llm::LlmCompletionRequest;
use crate::collaborators::tools::ToolExecutionRequest;
use crate::collaborators::SamplingParams;
use crate::events::{EventManager, EventMode, EventType};
use crate::messages::{canonicalize_tool_name, is_completion_sentinel, Message, MessageBuilder, StateValidator};

pub use handle::{BudgetStatusView, ExecutionStatusView, GoalProgressView, WorkflowHandle};
pub use signal::WorkflowSignal;
pub use state::{
    AgentExecutionRequest, AgentExecutionResult, AgentExecutionState, AgentGoal, ExecutionStatus, PendingApproval,
    DEFAULT_FINAL_RESPONSE,
};

/// Maximum time an execution will wait in `waiting_for_approval` before it
/// gives up and fails the workflow (§5: "timeout: 24 hours").
const APPROVAL_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);
/// Poll granularity while paused or awaiting approval - the task blocks on
/// the signal channel for this long before re-checking elapsed time.
const SIGNAL_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// How many trailing messages feed the projected-cost estimate.
const PROJECTION_WINDOW: usize = 5;
/// Rough chars-per-token used only for the pre-call budget projection, not
/// for the cost actually recorded (that always comes from the LLM response).
const CHARS_PER_TOKEN_ESTIMATE: f64 = 4.0;

/// Starts one Agent Execution Workflow as a background task and returns a
/// handle for signals/queries plus a join handle for the final result.
pub fn run_agent_execution_workflow(
    ctx: ActivityContext,
    request: AgentExecutionRequest,
) -> (Arc<WorkflowHandle>, tokio::task::JoinHandle<AgentExecutionResult>) {
    let goal = AgentGoal::from_request(&request);
    let execution_id = format!("exec_{}", Uuid::new_v4());
    let state = AgentExecutionState::new(execution_id.clone(), &request, goal);
    let budget = BudgetTracker::new(state.budget_usd);
    let (handle, driver) = handle::channel(&state, &budget);

    let join = tokio::spawn(run(ctx, request, state, budget, driver));
    (handle, join)
}

/// One execution's full lifecycle. Not exported directly - callers go through
/// `run_agent_execution_workflow` so they always get a `WorkflowHandle`.
async fn run(
    ctx: ActivityContext,
    request: AgentExecutionRequest,
    mut state: AgentExecutionState,
    mut budget: BudgetTracker,
    mut driver: handle::WorkflowDriver,
) -> AgentExecutionResult {
    let mut events = EventManager::new(
        EventMode::Immediate,
        request.task_id,
        request.agent_id,
        state.execution_id.clone(),
    );
    let mut paused = false;
    let mut write_ahead_seq: i32 = 0;

    events.add_event(EventType::WorkflowStarted, json!({}));
    flush(&ctx, &mut events).await;

    if let Err(reason) = initialize(&ctx, &request, &mut state, &mut write_ahead_seq).await {
        events.add_event(EventType::WorkflowFailed, json!({"error": reason}));
        flush(&ctx, &mut events).await;
        return finalize(state, budget, events, Some(reason));
    }

    driver.publish(&state, &budget, paused, events.history());

    loop {
        for signal in driver.drain_signals() {
            apply_signal(signal, &mut state, &mut budget, &mut paused, &mut events);
        }
        flush(&ctx, &mut events).await;

        if matches!(pre_check(&state, &budget), Some(_)) {
            break;
        }

        if paused {
            wait_while_paused(&mut driver, &mut state, &mut budget, &mut paused, &mut events).await;
            flush(&ctx, &mut events).await;
            if matches!(pre_check(&state, &budget), Some(_)) {
                break;
            }
        }

        state.current_iteration += 1;

        events.add_event(
            EventType::IterationStarted,
            json!({"iteration": state.current_iteration, "max_iterations": state.goal.max_iterations}),
        );
        flush(&ctx, &mut events).await;

        build_iteration_messages(&mut state, &budget);

        let projected = estimate_projected_cost(&state.messages);
        if budget.would_exceed(projected) {
            state.status = ExecutionStatus::WaitingForApproval;
            state.pending_approval = Some(PendingApproval {
                reason: "projected LLM call would exceed budget".to_string(),
                requested_at: Utc::now(),
            });
            events.add_event(
                EventType::HumanApprovalRequested,
                json!({"reason": "projected_budget_exceeded", "projected_cost": projected}),
            );
            flush(&ctx, &mut events).await;

            wait_for_approval(&mut driver, &mut state, &mut budget, &mut paused, &mut events).await;
            flush(&ctx, &mut events).await;

            if matches!(pre_check(&state, &budget), Some(_)) {
                state.current_iteration -= 1;
                break;
            }
            state.status = ExecutionStatus::Executing;
        }

        events.add_event(EventType::LlmCallStarted, json!({"iteration": state.current_iteration}));
        flush(&ctx, &mut events).await;
        append_write_ahead(
            &ctx,
            &state.execution_id,
            &mut write_ahead_seq,
            "call_llm",
            json!({"iteration": state.current_iteration}),
        )
        .await;

        let tool_schemas = build_tool_schemas(&state.available_tools);
        let llm_request = LlmCompletionRequest {
            model_id: state
                .agent_config
                .as_ref()
                .map(|c| c.model_id.clone())
                .unwrap_or_default(),
            messages: state.messages.clone(),
            tools: tool_schemas,
            sampling: SamplingParams::default(),
        };

        let turn = match run_with_retry(&ctx.activity_pool, LLM_CALL_TIMEOUT, DEFAULT_RETRY_ATTEMPTS, || {
            agent_activities::call_llm(&ctx, llm_request.clone())
        })
        .await
        {
            Ok(turn) => turn,
            Err(err) => {
                events.add_event(EventType::LlmCallFailed, json!({"error": err.into_inner().to_string()}));
                flush(&ctx, &mut events).await;
                events.add_event(EventType::WorkflowFailed, json!({"reason": "llm_call_failed"}));
                flush(&ctx, &mut events).await;
                return finalize(state, budget, events, Some("LLM call failed".to_string()));
            }
        };

        budget.add_cost(turn.cost);
        events.add_event(
            EventType::LlmCallCompleted,
            json!({"content_len": turn.content.len(), "tool_call_count": turn.tool_calls.len(), "cost": turn.cost}),
        );
        flush(&ctx, &mut events).await;

        let assistant_message = Message::assistant(turn.content.clone(), turn.tool_calls.clone());
        if assistant_message.is_appendable() {
            state.messages.push(assistant_message);
        } else {
            tracing::debug!(iteration = state.current_iteration, "empty assistant message, not appended");
        }

        let mut completed_via_sentinel = false;
        for tool_call in &turn.tool_calls {
            let name = canonicalize_tool_name(&tool_call.function.name);

            if is_completion_sentinel(&name) {
                let args: serde_json::Value = serde_json::from_str(&tool_call.function.arguments).unwrap_or_else(|_| json!({}));
                let result = args
                    .get("result")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .or_else(|| if turn.content.is_empty() { None } else { Some(turn.content.clone()) })
                    .unwrap_or_else(|| DEFAULT_FINAL_RESPONSE.to_string());
                tracing::info!(iteration = state.current_iteration, "completion sentinel received");
                state.success = true;
                state.final_response = Some(result);
                completed_via_sentinel = true;
                break;
            }

            state.status = ExecutionStatus::ToolExecution;
            events.add_event(EventType::ToolCallStarted, json!({"tool_name": name, "call_id": tool_call.id}));
            flush(&ctx, &mut events).await;

            let arguments: serde_json::Value = serde_json::from_str(&tool_call.function.arguments).unwrap_or_else(|_| json!({}));
            let server_instance_id = state
                .available_tools
                .iter()
                .find(|t| t.name == name)
                .and_then(|t| t.server_instance_id.clone());

            let tool_request = ToolExecutionRequest {
                tool_name: name.clone(),
                arguments,
                server_instance_id,
            };

            append_write_ahead(
                &ctx,
                &state.execution_id,
                &mut write_ahead_seq,
                "execute_mcp_tool",
                json!({"tool_name": name, "call_id": tool_call.id}),
            )
            .await;

            match run_with_retry(&ctx.activity_pool, TOOL_EXECUTION_TIMEOUT, DEFAULT_RETRY_ATTEMPTS, || {
                agent_activities::execute_mcp_tool(&ctx, tool_request.clone())
            })
            .await
            {
                Ok(response) if response.success => {
                    state.messages.push(Message::tool(tool_call.id.clone(), name.clone(), response.result.clone()));
                    events.add_event(
                        EventType::ToolCallCompleted,
                        json!({"tool_name": name, "call_id": tool_call.id, "success": true}),
                    );
                }
                Ok(response) => {
                    // The activity completed but reported `success: false` (e.g. a
                    // timeout the tool server caught itself) - treated the same as a
                    // transport error per §4.6/§7: a prefixed tool message, not a
                    // silent `ToolCallCompleted`.
                    let message = format!("Tool execution failed: {}", response.result);
                    tracing::warn!(tool_name = %name, result = %response.result, "tool reported failure");
                    state.messages.push(Message::tool(tool_call.id.clone(), name.clone(), message.clone()));
                    events.add_event(EventType::ToolCallFailed, json!({"tool_name": name, "call_id": tool_call.id, "error": message}));
                }
                Err(err) => {
                    let inner = err.into_inner().to_string();
                    let message = if inner.starts_with("Tool execution failed") {
                        inner
                    } else {
                        format!("Tool execution failed: {inner}")
                    };
                    tracing::warn!(tool_name = %name, error = %message, "tool execution failed");
                    state.messages.push(Message::tool(tool_call.id.clone(), name.clone(), message.clone()));
                    events.add_event(EventType::ToolCallFailed, json!({"tool_name": name, "call_id": tool_call.id, "error": message}));
                }
            }
            flush(&ctx, &mut events).await;
        }
        state.status = ExecutionStatus::Executing;

        if !completed_via_sentinel {
            state.status = ExecutionStatus::Evaluating;
            let progress = agent_activities::evaluate_goal_progress(
                &ctx,
                &state.goal.description,
                &state.goal.success_criteria,
                &state.messages,
                state.current_iteration,
            )
            .await;
            if progress.goal_achieved {
                state.success = true;
                state.final_response = progress.final_response.or_else(|| state.last_assistant_content());
            }
            state.status = ExecutionStatus::Executing;
        }

        if budget.should_warn() {
            events.add_event(EventType::BudgetWarning, json!({"cost": budget.cost(), "limit": budget.budget_limit()}));
            budget.mark_warning_sent();
            flush(&ctx, &mut events).await;
        }
        if budget.is_exceeded() {
            events.add_event(EventType::BudgetExceeded, json!({"cost": budget.cost(), "limit": budget.budget_limit()}));
            flush(&ctx, &mut events).await;
        }

        events.add_event(
            EventType::IterationCompleted,
            json!({"iteration": state.current_iteration, "success": state.success}),
        );
        flush(&ctx, &mut events).await;

        driver.publish(&state, &budget, paused, events.history());

        if post_check(&state, &budget).is_some() {
            break;
        }
    }

    let reason = post_check(&state, &budget).map(str::to_string);
    match reason.as_deref() {
        Some("Goal achieved") => {
            events.add_event(EventType::WorkflowCompleted, json!({}));
        }
        Some("Cancelled") => {
            events.add_event(EventType::WorkflowCancelled, json!({}));
        }
        _ => {
            events.add_event(EventType::WorkflowFailed, json!({"reason": reason}));
        }
    }
    flush(&ctx, &mut events).await;
    driver.publish(&state, &budget, paused, events.history());

    let error_message = if state.success { None } else { reason };
    finalize(state, budget, events, error_message)
}

/// Resolve agent config + tools, validate, and install both on `state`.
/// Returns `Err(message)` for a non-retryable initialization failure.
async fn initialize(
    ctx: &ActivityContext,
    request: &AgentExecutionRequest,
    state: &mut AgentExecutionState,
    write_ahead_seq: &mut i32,
) -> Result<(), String> {
    let agent_id = request.agent_id.to_string();

    append_write_ahead(ctx, &state.execution_id, write_ahead_seq, "build_agent_config", json!({"agent_id": agent_id})).await;
    let agent_config = run_with_retry(&ctx.activity_pool, crate::activities::ACTIVITY_TIMEOUT, DEFAULT_RETRY_ATTEMPTS, || {
        agent_activities::build_agent_config(ctx, &agent_id)
    })
    .await
    .map_err(|e| e.into_inner().to_string())?;

    let config_json = json!({"id": agent_config.id, "name": agent_config.name, "model_id": agent_config.model_id});
    StateValidator::validate_agent_config(&config_json).map_err(|e| e.to_string())?;

    append_write_ahead(ctx, &state.execution_id, write_ahead_seq, "discover_available_tools", json!({})).await;
    let tools = run_with_retry(&ctx.activity_pool, crate::activities::ACTIVITY_TIMEOUT, DEFAULT_RETRY_ATTEMPTS, || {
        agent_activities::discover_available_tools(ctx, &agent_config.tools_config)
    })
    .await
    .map_err(|e| e.into_inner().to_string())?;

    let tool_records: Vec<serde_json::Value> = tools
        .iter()
        .map(|t| json!({"name": t.name, "description": t.description}))
        .collect();
    StateValidator::validate_tools(&tool_records).map_err(|e| e.to_string())?;
    StateValidator::validate_goal(&state.goal.description, &state.goal.success_criteria, state.goal.max_iterations)
        .map_err(|e| e.to_string())?;

    state.agent_config = Some(agent_config);
    state.available_tools = tools;
    state.status = ExecutionStatus::Executing;
    Ok(())
}

fn build_iteration_messages(state: &mut AgentExecutionState, budget: &BudgetTracker) {
    if state.current_iteration == 1 {
        let Some(config) = state.agent_config.as_ref() else { return };
        let tools: Vec<(String, String)> = state.available_tools.iter().map(|t| (t.name.clone(), t.description.clone())).collect();
        state.messages.push(MessageBuilder::build_system_message(
            &config.name,
            &config.instruction,
            &state.goal.description,
            &state.goal.success_criteria,
            &tools,
        ));
        state.messages.push(MessageBuilder::build_initial_user_message(&state.goal.description));
    } else {
        state.messages.push(MessageBuilder::build_status_message(
            state.current_iteration,
            state.goal.max_iterations,
            budget.get_remaining(),
        ));
    }
}

fn build_tool_schemas(tools: &[ToolDescriptor]) -> Vec<serde_json::Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                }
            })
        })
        .collect()
}

/// Rough token-count projection over the trailing window of messages, used
/// only to gate the upcoming LLM call before it's made (§4.3).
fn estimate_projected_cost(messages: &[Message]) -> f64 {
    let start = messages.len().saturating_sub(PROJECTION_WINDOW);
    let chars: usize = messages[start..].iter().map(|m| m.content.len()).sum();
    let projected_tokens = chars as f64 / CHARS_PER_TOKEN_ESTIMATE;
    projected_tokens * FALLBACK_COST_PER_TOKEN
}

/// Termination check run *before* committing to an iteration's work -
/// deliberately excludes `max_iterations` so that incrementing up to the
/// limit still lets that iteration run (§8 boundary: `max_iterations = 1`
/// executes exactly one iteration).
fn pre_check(state: &AgentExecutionState, budget: &BudgetTracker) -> Option<&'static str> {
    if state.success {
        Some("Goal achieved")
    } else if budget.is_exceeded() {
        Some("Budget exceeded")
    } else if state.status == ExecutionStatus::Cancelled {
        Some("Cancelled")
    } else {
        None
    }
}

/// Termination check run *after* an iteration completes (§4.6 step 3,
/// priority order).
fn post_check(state: &AgentExecutionState, budget: &BudgetTracker) -> Option<&'static str> {
    if state.success {
        Some("Goal achieved")
    } else if state.current_iteration >= state.goal.max_iterations {
        Some("Maximum iterations reached")
    } else if budget.is_exceeded() {
        Some("Budget exceeded")
    } else if state.status == ExecutionStatus::Cancelled {
        Some("Cancelled")
    } else {
        None
    }
}

fn apply_signal(
    signal: WorkflowSignal,
    state: &mut AgentExecutionState,
    budget: &mut BudgetTracker,
    paused: &mut bool,
    events: &mut EventManager,
) {
    match signal {
        WorkflowSignal::Pause { reason } => {
            tracing::info!(?reason, "workflow paused");
            *paused = true;
        }
        WorkflowSignal::Resume { reason } => {
            tracing::info!(?reason, "workflow resumed");
            *paused = false;
        }
        WorkflowSignal::CancelExecution { reason } => {
            tracing::info!(%reason, "workflow cancelled");
            state.status = ExecutionStatus::Cancelled;
            state.final_response = Some(format!("Execution cancelled: {reason}"));
        }
        WorkflowSignal::ApproveAction { approved, feedback } => {
            if state.status != ExecutionStatus::WaitingForApproval {
                return;
            }
            state.pending_approval = None;
            state.status = ExecutionStatus::Executing;
            if approved {
                events.add_event(EventType::HumanApprovalReceived, json!({"approved": true}));
            } else {
                state.messages.push(Message::user_with_metadata(
                    format!("Action rejected: {}", feedback.unwrap_or_default()),
                    json!({"type": "human_rejection"}),
                ));
                events.add_event(EventType::HumanApprovalReceived, json!({"approved": false}));
            }
        }
        WorkflowSignal::ProvideFeedback { text } => {
            state
                .messages
                .push(Message::user_with_metadata(text, json!({"type": "human_feedback"})));
        }
        WorkflowSignal::UpdateBudget { new_budget_usd, reason } => {
            tracing::info!(new_budget_usd, ?reason, "budget updated");
            let was_exceeded = budget.is_exceeded();
            budget.set_budget_limit(new_budget_usd);
            if was_exceeded && !budget.is_exceeded() && state.status == ExecutionStatus::WaitingForApproval {
                state.pending_approval = None;
                state.status = ExecutionStatus::Executing;
                *paused = false;
            }
        }
    }
}

/// Blocks, polling the signal channel, until a `resume`/`cancel` signal
/// clears the paused flag (§9: "signal-setting a flag plus a
/// condition-wait at defined gate points, not a thread suspend").
async fn wait_while_paused(
    driver: &mut handle::WorkflowDriver,
    state: &mut AgentExecutionState,
    budget: &mut BudgetTracker,
    paused: &mut bool,
    events: &mut EventManager,
) {
    while *paused && state.status != ExecutionStatus::Cancelled {
        if let Some(signal) = driver.next_signal_within(SIGNAL_POLL_INTERVAL).await {
            apply_signal(signal, state, budget, paused, events);
        }
    }
}

/// Blocks until the pending approval is resolved (`approve_action` or a
/// budget update that clears it) or `APPROVAL_TIMEOUT` elapses.
async fn wait_for_approval(
    driver: &mut handle::WorkflowDriver,
    state: &mut AgentExecutionState,
    budget: &mut BudgetTracker,
    paused: &mut bool,
    events: &mut EventManager,
) {
    let deadline = tokio::time::Instant::now() + APPROVAL_TIMEOUT;
    while state.status == ExecutionStatus::WaitingForApproval {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            tracing::warn!("approval timed out after 24h");
            state.status = ExecutionStatus::Cancelled;
            state.final_response = Some("Execution cancelled: approval timeout".to_string());
            return;
        }
        let wait = remaining.min(SIGNAL_POLL_INTERVAL);
        if let Some(signal) = driver.next_signal_within(wait).await {
            apply_signal(signal, state, budget, paused, events);
        }
    }
}

/// Append one write-ahead row before `activity_name` is awaited (§4.9,
/// invariant 8), then advance the per-execution sequence counter. A no-op
/// when the context carries no event log (e.g. in tests).
async fn append_write_ahead(
    ctx: &ActivityContext,
    execution_id: &str,
    seq: &mut i32,
    activity_name: &str,
    payload: serde_json::Value,
) {
    if let Some(log) = &ctx.event_log {
        if let Err(e) = log.append(execution_id, *seq, activity_name, &payload).await {
            tracing::warn!(error = %e, activity_name, "failed to append write-ahead log entry");
        }
    }
    *seq += 1;
}

async fn flush(ctx: &ActivityContext, events: &mut EventManager) {
    if events.mode() == EventMode::Immediate && events.has_pending() {
        let pending = events.drain_pending();
        agent_activities::publish_workflow_events(ctx, &pending).await;
    }
}

fn finalize(
    state: AgentExecutionState,
    budget: BudgetTracker,
    events: EventManager,
    error_message: Option<String>,
) -> AgentExecutionResult {
    let final_response = state
        .final_response
        .clone()
        .or_else(|| state.last_assistant_content())
        .unwrap_or_else(|| DEFAULT_FINAL_RESPONSE.to_string());

    AgentExecutionResult {
        task_id: state.task_id,
        agent_id: state.agent_id,
        success: state.success,
        final_response,
        total_cost: budget.cost(),
        reasoning_iterations_used: state.current_iteration,
        conversation_history: state.messages,
        error_message,
    }
}
