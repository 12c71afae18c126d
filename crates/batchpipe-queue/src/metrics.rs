use std::sync::atomic::{AtomicU64, Ordering};

/// Per-queue counters, safe to update from any producer thread.
#[derive(Debug, Default)]
pub struct QueueMetrics {
    items_put: AtomicU64,
    items_taken: AtomicU64,
    items_cleared: AtomicU64,
    put_requests: AtomicU64,
    get_requests: AtomicU64,
}

/// Point-in-time copy of [`QueueMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub items_put: u64,
    pub items_taken: u64,
    pub items_cleared: u64,
    pub put_requests: u64,
    pub get_requests: u64,
}

impl QueueMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            items_put: self.items_put.load(Ordering::Relaxed),
            items_taken: self.items_taken.load(Ordering::Relaxed),
            items_cleared: self.items_cleared.load(Ordering::Relaxed),
            put_requests: self.put_requests.load(Ordering::Relaxed),
            get_requests: self.get_requests.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_put(&self, count: usize) {
        self.put_requests.fetch_add(1, Ordering::Relaxed);
        self.items_put.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_get(&self, count: usize) {
        self.get_requests.fetch_add(1, Ordering::Relaxed);
        self.items_taken.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_clear(&self, count: usize) {
        self.items_cleared.fetch_add(count as u64, Ordering::Relaxed);
    }
}
