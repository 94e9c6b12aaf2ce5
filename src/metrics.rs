use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Point-in-time view of orchestrator counters, plus current queue
/// depths.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrchestratorMetricsSnapshot {
    pub requests_admitted: u64,
    pub requests_deferred: u64,
    pub requests_succeeded: u64,
    pub requests_failed: u64,
    pub retries_scheduled: u64,
    pub throttle_rejections: u64,
    pub debounce_cancellations: u64,
    pub promotions: u64,
    pub queue_clears: u64,
    pub in_flight: u64,
    pub pending: u64,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct OrchestratorMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    requests_admitted: AtomicU64,
    requests_deferred: AtomicU64,
    requests_succeeded: AtomicU64,
    requests_failed: AtomicU64,
    retries_scheduled: AtomicU64,
    throttle_rejections: AtomicU64,
    debounce_cancellations: AtomicU64,
    promotions: AtomicU64,
    queue_clears: AtomicU64,
}

impl OrchestratorMetrics {
    pub(crate) fn record_admitted(&self) {
        self.inner.requests_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deferred(&self) {
        self.inner.requests_deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_succeeded(&self) {
        self.inner.requests_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.inner.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry_scheduled(&self) {
        self.inner.retries_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_throttle_rejection(&self) {
        self.inner
            .throttle_rejections
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_debounce_cancellations(&self, count: u64) {
        if count > 0 {
            self.inner
                .debounce_cancellations
                .fetch_add(count, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_promotion(&self) {
        self.inner.promotions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_queue_clear(&self) {
        self.inner.queue_clears.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, in_flight: usize, pending: usize) -> OrchestratorMetricsSnapshot {
        OrchestratorMetricsSnapshot {
            requests_admitted: self.inner.requests_admitted.load(Ordering::Relaxed),
            requests_deferred: self.inner.requests_deferred.load(Ordering::Relaxed),
            requests_succeeded: self.inner.requests_succeeded.load(Ordering::Relaxed),
            requests_failed: self.inner.requests_failed.load(Ordering::Relaxed),
            retries_scheduled: self.inner.retries_scheduled.load(Ordering::Relaxed),
            throttle_rejections: self.inner.throttle_rejections.load(Ordering::Relaxed),
            debounce_cancellations: self.inner.debounce_cancellations.load(Ordering::Relaxed),
            promotions: self.inner.promotions.load(Ordering::Relaxed),
            queue_clears: self.inner.queue_clears.load(Ordering::Relaxed),
            in_flight: in_flight as u64,
            pending: pending as u64,
        }
    }
}
