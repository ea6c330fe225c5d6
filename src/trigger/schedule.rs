//! Schedule Manager (C8.1)
//!
//! Owns a `tokio_cron_scheduler::JobScheduler`, directly generalizing the
//! teacher's `Scheduler` (which loads cron-scheduled ETL streams from
//! Postgres and schedules a sync job per stream). Here, each active
//! `CronTrigger` becomes one `Job`, keyed by `trigger_id`, whose fire
//! callback starts a Trigger Execution Workflow instance.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Invoked when a cron job fires, with the `trigger_id` that fired.
pub type FireCallback = Arc<dyn Fn(Uuid) + Send + Sync>;

struct ScheduledJob {
    job_id: Uuid,
    cron_expression: String,
    timezone: String,
}

pub struct ScheduleManager {
    scheduler: JobScheduler,
    /// trigger_id -> job bookkeeping. `tokio_cron_scheduler` has no native
    /// pause primitive, so "pause" removes the job and keeps its
    /// cron/timezone around for a later `resume_schedule` to recreate.
    jobs: Mutex<HashMap<Uuid, Option<ScheduledJob>>>,
    on_fire: FireCallback,
}

impl ScheduleManager {
    pub async fn new(on_fire: FireCallback) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| Error::Other(format!("failed to create job scheduler: {e}")))?;

        Ok(Self {
            scheduler,
            jobs: Mutex::new(HashMap::new()),
            on_fire,
        })
    }

    pub async fn start(&self) -> Result<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| Error::Other(format!("failed to start job scheduler: {e}")))
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| Error::Other(format!("failed to shut down job scheduler: {e}")))
    }

    pub async fn create_schedule(&self, trigger_id: Uuid, cron_expression: &str, timezone: &str) -> Result<()> {
        let on_fire = self.on_fire.clone();
        let job = Job::new_async(cron_expression, move |_uuid, _lock| {
            let on_fire = on_fire.clone();
            Box::pin(async move {
                tracing::info!(%trigger_id, "cron schedule fired");
                on_fire(trigger_id);
            })
        })
        .map_err(|e| Error::Other(format!("failed to build cron job: {e}")))?;

        let job_id = self
            .scheduler
            .add(job)
            .await
            .map_err(|e| Error::Other(format!("failed to register cron job: {e}")))?;

        self.jobs.lock().await.insert(
            trigger_id,
            Some(ScheduledJob {
                job_id,
                cron_expression: cron_expression.to_string(),
                timezone: timezone.to_string(),
            }),
        );

        Ok(())
    }

    pub async fn update_schedule(&self, trigger_id: Uuid, cron_expression: &str, timezone: &str) -> Result<()> {
        self.remove_job_only(trigger_id).await?;
        self.create_schedule(trigger_id, cron_expression, timezone).await
    }

    pub async fn pause_schedule(&self, trigger_id: Uuid) -> Result<()> {
        let mut jobs = self.jobs.lock().await;
        if let Some(Some(scheduled)) = jobs.get(&trigger_id) {
            let job_id = scheduled.job_id;
            let cron_expression = scheduled.cron_expression.clone();
            let timezone = scheduled.timezone.clone();
            drop(jobs);

            self.scheduler
                .remove(&job_id)
                .await
                .map_err(|e| Error::Other(format!("failed to pause cron job: {e}")))?;

            self.jobs.lock().await.insert(
                trigger_id,
                Some(ScheduledJob {
                    job_id,
                    cron_expression,
                    timezone,
                }),
            );
        }
        Ok(())
    }

    pub async fn resume_schedule(&self, trigger_id: Uuid) -> Result<()> {
        let entry = self.jobs.lock().await.get(&trigger_id).and_then(|j| j.as_ref().map(|s| (s.cron_expression.clone(), s.timezone.clone())));
        if let Some((cron_expression, timezone)) = entry {
            self.create_schedule(trigger_id, &cron_expression, &timezone).await?;
        }
        Ok(())
    }

    pub async fn remove_schedule(&self, trigger_id: Uuid) -> Result<()> {
        self.remove_job_only(trigger_id).await?;
        self.jobs.lock().await.remove(&trigger_id);
        Ok(())
    }

    async fn remove_job_only(&self, trigger_id: Uuid) -> Result<()> {
        let job_id = self.jobs.lock().await.get(&trigger_id).and_then(|j| j.as_ref().map(|s| s.job_id));
        if let Some(job_id) = job_id {
            self.scheduler
                .remove(&job_id)
                .await
                .map_err(|e| Error::Other(format!("failed to remove cron job: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn create_schedule_registers_a_job() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = fired.clone();
        let manager = ScheduleManager::new(Arc::new(move |_id| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }))
        .await
        .unwrap();

        let trigger_id = Uuid::new_v4();
        manager.create_schedule(trigger_id, "0 0 * * * *", "UTC").await.unwrap();
        assert!(manager.jobs.lock().await.contains_key(&trigger_id));
    }

    #[tokio::test]
    async fn remove_schedule_clears_bookkeeping() {
        let manager = ScheduleManager::new(Arc::new(|_id| {})).await.unwrap();
        let trigger_id = Uuid::new_v4();
        manager.create_schedule(trigger_id, "0 0 * * * *", "UTC").await.unwrap();
        manager.remove_schedule(trigger_id).await.unwrap();
        assert!(!manager.jobs.lock().await.contains_key(&trigger_id));
    }
}
