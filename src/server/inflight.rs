//! In-flight request tracking.
//!
//! # Responsibilities
//! - Count requests between dispatch and handler completion
//! - Let shutdown wait until every worker has finished
//!
//! # Design Decisions
//! - Guard-based: the count drops when the guard drops, panics included
//! - Waiting polls the counter; shutdown is rare and bounded by a timeout

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics::set_in_flight;

/// Sequence number attached to in-flight guards for log correlation.
static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

/// Tracks active requests for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    /// Current count of active requests.
    active_count: Arc<AtomicU64>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active request. Returns a guard that decrements on drop.
    pub fn track(&self) -> InFlightGuard {
        let now = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        set_in_flight(now);
        InFlightGuard {
            active_count: Arc::clone(&self.active_count),
            seq: REQUEST_SEQ.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Get current active request count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until no request is active. Returns false if `timeout` elapsed first.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let drained = async {
            while self.active_count() > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }
}

/// Guard that tracks a request's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    active_count: Arc<AtomicU64>,
    seq: u64,
}

impl InFlightGuard {
    /// Process-wide sequence number of this request.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let now = self.active_count.fetch_sub(1, Ordering::SeqCst) - 1;
        set_in_flight(now);
        tracing::trace!(request_seq = self.seq, "Request finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_count_requests() {
        let tracker = InFlight::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);
        assert_ne!(guard1.seq(), guard2.seq());

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);

        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn wait_idle_honours_timeout() {
        let tracker = InFlight::new();
        assert!(tracker.wait_idle(Duration::from_millis(10)).await);

        let guard = tracker.track();
        assert!(!tracker.wait_idle(Duration::from_millis(60)).await);

        let waiter = tracker.clone();
        let wait = tokio::spawn(async move { waiter.wait_idle(Duration::from_secs(2)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);
        assert!(wait.await.unwrap());
    }
}
