//! Observability module for metrics and tracing
//!
//! Provides OpenTelemetry integration for workflow/activity/trigger execution
//! metrics, distributed tracing, and operational visibility.

use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use std::sync::OnceLock;
use std::time::Instant;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// agentflow metrics for workflow, activity, and trigger execution
pub struct Metrics {
    /// Total workflows started by kind ("agent_execution" | "trigger_execution")
    pub workflows_started: Counter<u64>,
    /// Total workflows completed successfully by kind
    pub workflows_succeeded: Counter<u64>,
    /// Total workflows that failed by kind
    pub workflows_failed: Counter<u64>,
    /// Total workflows cancelled by kind
    pub workflows_cancelled: Counter<u64>,
    /// Workflow duration in seconds
    pub workflow_duration_seconds: Histogram<f64>,
    /// Reasoning iterations executed
    pub iterations_executed: Counter<u64>,
    /// LLM call latency in seconds
    pub llm_call_duration_seconds: Histogram<f64>,
    /// LLM call cost in USD
    pub llm_call_cost_usd: Histogram<f64>,
    /// Tool call latency in seconds
    pub tool_call_duration_seconds: Histogram<f64>,
    /// Tool calls that failed
    pub tool_call_failures: Counter<u64>,
    /// Trigger executions by status ("success" | "failed" | "skipped")
    pub trigger_executions: Counter<u64>,
    /// Cron schedule fires
    pub schedule_fires: Counter<u64>,
}

impl Metrics {
    /// Create metrics from a meter
    pub fn new(meter: &Meter) -> Self {
        Self {
            workflows_started: meter
                .u64_counter("agentflow_workflows_started_total")
                .with_description("Total number of workflows started")
                .with_unit("workflows")
                .build(),
            workflows_succeeded: meter
                .u64_counter("agentflow_workflows_succeeded_total")
                .with_description("Total number of workflows completed successfully")
                .with_unit("workflows")
                .build(),
            workflows_failed: meter
                .u64_counter("agentflow_workflows_failed_total")
                .with_description("Total number of workflows that failed")
                .with_unit("workflows")
                .build(),
            workflows_cancelled: meter
                .u64_counter("agentflow_workflows_cancelled_total")
                .with_description("Total number of workflows cancelled")
                .with_unit("workflows")
                .build(),
            workflow_duration_seconds: meter
                .f64_histogram("agentflow_workflow_duration_seconds")
                .with_description("Duration of workflow execution")
                .with_unit("s")
                .build(),
            iterations_executed: meter
                .u64_counter("agentflow_iterations_executed_total")
                .with_description("Total reasoning iterations executed")
                .with_unit("iterations")
                .build(),
            llm_call_duration_seconds: meter
                .f64_histogram("agentflow_llm_call_duration_seconds")
                .with_description("Duration of LLM calls")
                .with_unit("s")
                .build(),
            llm_call_cost_usd: meter
                .f64_histogram("agentflow_llm_call_cost_usd")
                .with_description("Cost of LLM calls in USD")
                .with_unit("usd")
                .build(),
            tool_call_duration_seconds: meter
                .f64_histogram("agentflow_tool_call_duration_seconds")
                .with_description("Duration of tool calls")
                .with_unit("s")
                .build(),
            tool_call_failures: meter
                .u64_counter("agentflow_tool_call_failures_total")
                .with_description("Total tool calls that failed")
                .with_unit("calls")
                .build(),
            trigger_executions: meter
                .u64_counter("agentflow_trigger_executions_total")
                .with_description("Total trigger executions by status")
                .with_unit("executions")
                .build(),
            schedule_fires: meter
                .u64_counter("agentflow_schedule_fires_total")
                .with_description("Total cron schedule fires")
                .with_unit("fires")
                .build(),
        }
    }

    pub fn record_workflow_started(&self, kind: &str) {
        self.workflows_started
            .add(1, &[KeyValue::new("kind", kind.to_string())]);
    }

    pub fn record_workflow_finished(&self, kind: &str, outcome: &str, duration: f64) {
        let attrs = &[KeyValue::new("kind", kind.to_string())];
        match outcome {
            "succeeded" => self.workflows_succeeded.add(1, attrs),
            "cancelled" => self.workflows_cancelled.add(1, attrs),
            _ => self.workflows_failed.add(1, attrs),
        }
        self.workflow_duration_seconds.record(duration, attrs);
    }

    pub fn record_iteration(&self) {
        self.iterations_executed.add(1, &[]);
    }

    pub fn record_llm_call(&self, duration: f64, cost: f64) {
        self.llm_call_duration_seconds.record(duration, &[]);
        self.llm_call_cost_usd.record(cost, &[]);
    }

    pub fn record_tool_call(&self, duration: f64, success: bool) {
        self.tool_call_duration_seconds.record(duration, &[]);
        if !success {
            self.tool_call_failures.add(1, &[]);
        }
    }

    pub fn record_trigger_execution(&self, status: &str) {
        self.trigger_executions
            .add(1, &[KeyValue::new("status", status.to_string())]);
    }

    pub fn record_schedule_fire(&self, trigger_id: &str) {
        self.schedule_fires
            .add(1, &[KeyValue::new("trigger_id", trigger_id.to_string())]);
    }
}

/// Configuration for observability
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// OTLP endpoint (e.g., "http://localhost:4317")
    pub otlp_endpoint: Option<String>,
    /// Service name for tracing
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            service_name: "agentflow".to_string(),
        }
    }
}

/// Initialize observability with optional OTLP export
///
/// If OTEL_EXPORTER_OTLP_ENDPOINT is set, metrics will be exported to that endpoint.
/// Otherwise, metrics are still collected but only logged locally.
pub fn init(config: ObservabilityConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let meter_provider = if let Some(endpoint) = &config.otlp_endpoint {
        // Configure OTLP exporter
        use opentelemetry_otlp::WithExportConfig;
        use opentelemetry_sdk::metrics::PeriodicReader;
        use opentelemetry_sdk::runtime;

        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()?;

        let reader = PeriodicReader::builder(exporter, runtime::Tokio)
            .with_interval(std::time::Duration::from_secs(30))
            .build();

        SdkMeterProvider::builder().with_reader(reader).build()
    } else {
        // No OTLP endpoint - use noop provider (metrics still tracked in-memory)
        tracing::info!("OTEL_EXPORTER_OTLP_ENDPOINT not set, metrics will be logged only");
        SdkMeterProvider::builder().build()
    };

    // Note: meter() requires &'static str, so we use the default name
    let meter = meter_provider.meter("agentflow");
    let metrics = Metrics::new(&meter);

    // Store globally
    METRICS
        .set(metrics)
        .map_err(|_| "Metrics already initialized")?;

    tracing::info!(
        otlp_endpoint = ?config.otlp_endpoint,
        "Observability initialized"
    );

    Ok(())
}

/// Get global metrics instance
///
/// Returns None if observability has not been initialized.
/// Use `init()` at startup to initialize.
pub fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

/// Helper to time a workflow run and record metrics/tracing on completion.
pub struct WorkflowTimer {
    kind: String,
    start: Instant,
}

impl WorkflowTimer {
    /// Start timing a workflow of the given kind
    pub fn start(kind: &str) -> Self {
        if let Some(m) = metrics() {
            m.record_workflow_started(kind);
        }
        Self {
            kind: kind.to_string(),
            start: Instant::now(),
        }
    }

    /// Record the terminal outcome ("succeeded" | "failed" | "cancelled")
    pub fn finish(self, outcome: &str) {
        let duration = self.start.elapsed().as_secs_f64();
        if let Some(m) = metrics() {
            m.record_workflow_finished(&self.kind, outcome, duration);
        }
        tracing::info!(
            kind = %self.kind,
            outcome = %outcome,
            duration_seconds = duration,
            "Workflow finished"
        );
    }

    /// Get elapsed duration without consuming the timer
    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_timer() {
        let timer = WorkflowTimer::start("test");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(timer.elapsed() >= 0.01);
    }
}
