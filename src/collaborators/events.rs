//! Event publishing collaborator
//!
//! Accepts a batch of structured events and delivers them best-effort; the
//! activity layer retries at most once (`EVENT_PUBLISH_RETRY_ATTEMPTS = 1`)
//! and a publish failure must never block or fail the workflow.

use async_trait::async_trait;

use crate::error::Result;
use crate::events::WorkflowEvent;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, events: &[WorkflowEvent]) -> Result<()>;
}

/// Default publisher: always emits a tracing event, and additionally POSTs to
/// an external broker URL when one is configured.
pub struct LoggingEventPublisher {
    broker_url: Option<String>,
    http: reqwest::Client,
}

impl LoggingEventPublisher {
    pub fn new(broker_url: Option<String>) -> Self {
        Self {
            broker_url,
            http: crate::http_client::tollbooth_client(),
        }
    }
}

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, events: &[WorkflowEvent]) -> Result<()> {
        for event in events {
            tracing::info!(
                event_type = ?event.event_type,
                event_id = %event.event_id,
                data = %event.data,
                "workflow event"
            );
        }

        if let Some(url) = &self.broker_url {
            let body = serde_json::json!({ "events": events });
            // Best-effort: failures are logged, never propagated as a hard error,
            // matching the fire-and-forget contract of `publish_workflow_events`.
            if let Err(e) = self.http.post(url).json(&body).send().await {
                tracing::warn!(error = %e, "failed to publish events to broker");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn logging_publisher_without_broker_never_fails() {
        let publisher = LoggingEventPublisher::new(None);
        let events = vec![WorkflowEvent {
            event_id: Uuid::new_v4(),
            event_type: crate::events::EventType::WorkflowStarted,
            timestamp: chrono::Utc::now(),
            data: serde_json::json!({}),
        }];
        assert!(publisher.publish(&events).await.is_ok());
    }
}
