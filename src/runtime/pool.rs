//! Bounded activity worker pool (§4.9)
//!
//! Activities are "non-deterministic workers executed on a worker pool;
//! many activities may run in parallel across workflows" - a semaphore
//! gate sized by `Config::activity_worker_concurrency` bounds that total,
//! so a worker process running many concurrent executions doesn't open an
//! unbounded number of simultaneous LLM/tool calls.

use std::sync::Arc;

use tokio::sync::{Semaphore, SemaphorePermit};

pub struct ActivityWorkerPool {
    semaphore: Semaphore,
    capacity: usize,
}

impl ActivityWorkerPool {
    pub fn new(concurrency: usize) -> Self {
        let capacity = concurrency.max(1);
        Self {
            semaphore: Semaphore::new(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of activities that could start running right now without
    /// queuing behind a permit.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Acquire one permit, queuing if the pool is already at capacity. The
    /// returned guard releases the permit on drop, once the caller's
    /// activity attempt (including its timeout) has finished.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.semaphore
            .acquire()
            .await
            .expect("ActivityWorkerPool semaphore is never closed")
    }
}

impl Default for ActivityWorkerPool {
    fn default() -> Self {
        Self::new(8)
    }
}

/// Handy for call sites that want to share one pool across clones of
/// `ActivityContext` without owning it directly.
pub type SharedActivityWorkerPool = Arc<ActivityWorkerPool>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permits_cap_at_configured_concurrency() {
        let pool = ActivityWorkerPool::new(2);
        assert_eq!(pool.available(), 2);
        let _a = pool.acquire().await;
        let _b = pool.acquire().await;
        assert_eq!(pool.available(), 0);
    }

    #[tokio::test]
    async fn dropping_a_permit_frees_capacity() {
        let pool = ActivityWorkerPool::new(1);
        {
            let _permit = pool.acquire().await;
            assert_eq!(pool.available(), 0);
        }
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn zero_concurrency_is_clamped_to_one() {
        let pool = ActivityWorkerPool::new(0);
        assert_eq!(pool.capacity(), 1);
    }
}
