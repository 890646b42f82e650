//! Bounded pool for running handlers off the I/O threads.
//!
//! # Responsibilities
//! - Run synchronous handlers on Tokio's blocking threads
//! - Enforce `worker_threads` via semaphore (backpressure)
//!
//! # Design Decisions
//! - Acquire the permit before spawning, so excess requests queue on the
//!   semaphore instead of piling up blocking threads
//! - The permit moves into the task and is released even if the handler panics

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// Semaphore-bounded `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Wait for a free worker, then run `job` on it.
    pub async fn spawn<F>(&self, job: F) -> Result<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        // Acquire permit first (backpressure)
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| Error::Server("worker pool closed".to_string()))?;

        tracing::trace!(
            available_workers = self.permits.available_permits(),
            "Worker acquired"
        );

        Ok(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job();
        }))
    }

    /// Workers currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn limits_concurrent_jobs() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(
                pool.spawn(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
                .unwrap(),
            );
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn panicking_job_releases_permit() {
        let pool = WorkerPool::new(1);
        let handle = pool.spawn(|| panic!("boom")).await.unwrap();
        assert!(handle.await.unwrap_err().is_panic());
        assert_eq!(pool.available(), 1);
    }
}
