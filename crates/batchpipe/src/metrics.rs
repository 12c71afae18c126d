use std::sync::atomic::{AtomicU64, Ordering};

/// Consumer-side counters.
///
/// Shared through an `Arc` so they stay readable after `close`, including
/// while a detached consumer is still finishing.
#[derive(Debug, Default)]
pub struct PipeMetrics {
    /// Loop iterations, whatever woke them
    pub wakes: AtomicU64,
    /// Signal tokens taken off the control partition
    pub signals_consumed: AtomicU64,
    /// Handler invocations that completed successfully
    pub batches_handled: AtomicU64,
    /// Values inside those invocations
    pub items_handled: AtomicU64,
    /// Items discarded by the final clear
    pub residual_cleared: AtomicU64,
}

impl PipeMetrics {
    pub fn wakes(&self) -> u64 {
        self.wakes.load(Ordering::Relaxed)
    }

    pub fn signals_consumed(&self) -> u64 {
        self.signals_consumed.load(Ordering::Relaxed)
    }

    pub fn batches_handled(&self) -> u64 {
        self.batches_handled.load(Ordering::Relaxed)
    }

    pub fn items_handled(&self) -> u64 {
        self.items_handled.load(Ordering::Relaxed)
    }

    pub fn residual_cleared(&self) -> u64 {
        self.residual_cleared.load(Ordering::Relaxed)
    }

    pub(crate) fn record_wake(&self, signals: usize) {
        self.wakes.fetch_add(1, Ordering::Relaxed);
        self.signals_consumed.fetch_add(signals as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self, items: usize) {
        self.batches_handled.fetch_add(1, Ordering::Relaxed);
        self.items_handled.fetch_add(items as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_cleared(&self, items: usize) {
        self.residual_cleared.fetch_add(items as u64, Ordering::Relaxed);
    }
}
