//! In-process queue backend.
//!
//! `MemoryQueue` keeps one `VecDeque` per partition behind a mutex and wakes
//! blocked getters through a shared `Notify`. Producers on any thread may hold
//! a clone of the handle; the consumer side is fully async.

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::metrics::QueueMetrics;
use crate::partition::Partition;
use crate::service::{Payload, QueueBackend, QueueService};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, trace};

/// Backend that allocates [`MemoryQueue`]s inside the current process.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<BackendInner>,
}

#[derive(Default)]
struct BackendInner {
    config: QueueConfig,
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, MemoryQueue>>,
}

impl MemoryBackend {
    /// Creates a backend whose queues use `config`.
    pub fn new(config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(BackendInner {
                config,
                next_id: AtomicU64::new(0),
                live: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Returns the configuration applied to new queues.
    pub fn config(&self) -> QueueConfig {
        self.inner.config
    }

    /// Returns the number of allocated, not yet released queues.
    pub fn live_queues(&self) -> usize {
        self.live().len()
    }

    fn live(&self) -> MutexGuard<'_, HashMap<u64, MemoryQueue>> {
        self.inner.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl QueueBackend for MemoryBackend {
    type Queue = MemoryQueue;

    async fn ephemeral(&self) -> Result<MemoryQueue, QueueError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let queue = MemoryQueue::new(id, self.inner.config);
        self.live().insert(id, queue.clone());
        debug!(queue_id = id, "allocated ephemeral queue");
        Ok(queue)
    }

    async fn release(&self, queue: &MemoryQueue) -> Result<(), QueueError> {
        let was_live = self.live().remove(&queue.id()).is_some();
        queue.close();
        debug!(queue_id = queue.id(), was_live, "released ephemeral queue");
        Ok(())
    }
}

/// Handle to an in-process partitioned queue.
///
/// Cloning is cheap; all clones share the same partitions.
#[derive(Clone)]
pub struct MemoryQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    id: u64,
    config: QueueConfig,
    state: Mutex<QueueState>,
    /// Wakes blocked getters on every put and on close.
    notify: Notify,
    metrics: QueueMetrics,
}

#[derive(Default)]
struct QueueState {
    partitions: HashMap<Partition, VecDeque<Payload>>,
    closed: bool,
}

impl MemoryQueue {
    fn new(id: u64, config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                id,
                config,
                state: Mutex::new(QueueState::default()),
                notify: Notify::new(),
                metrics: QueueMetrics::default(),
            }),
        }
    }

    /// Backend-assigned identifier.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Returns `true` once the queue has been released.
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Returns this queue's counters.
    pub fn metrics(&self) -> &QueueMetrics {
        &self.inner.metrics
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) {
        {
            let mut state = self.state();
            state.closed = true;
            state.partitions.clear();
        }
        self.inner.notify.notify_waiters();
    }

    /// Takes up to `max_count` items, or `None` if the partition is empty.
    fn try_take(
        &self,
        max_count: usize,
        partition: &Partition,
    ) -> Result<Option<Vec<Payload>>, QueueError> {
        let mut state = self.state();
        if state.closed {
            return Err(QueueError::Closed);
        }
        let Some(fifo) = state.partitions.get_mut(partition) else {
            return Ok(None);
        };
        if fifo.is_empty() {
            return Ok(None);
        }
        let take = max_count.min(fifo.len());
        Ok(Some(fifo.drain(..take).collect()))
    }

    fn check_request(&self, requested: usize) -> Result<(), QueueError> {
        let max = self.inner.config.max_len;
        if requested > max {
            return Err(QueueError::RequestTooLarge { requested, max });
        }
        Ok(())
    }
}

impl QueueService for MemoryQueue {
    fn put_many(&self, items: Vec<Payload>, partition: &Partition) -> Result<(), QueueError> {
        self.check_request(items.len())?;
        let count = items.len();
        {
            let mut state = self.state();
            if state.closed {
                return Err(QueueError::Closed);
            }
            if count == 0 {
                return Ok(());
            }
            let capacity = self.inner.config.partition_capacity;
            let fifo = state.partitions.entry(partition.clone()).or_default();
            if fifo.len() + count > capacity {
                return Err(QueueError::Full { capacity });
            }
            fifo.extend(items);
        }
        self.inner.metrics.record_put(count);
        trace!(queue_id = self.id(), %partition, count, "put");
        self.inner.notify.notify_waiters();
        Ok(())
    }

    async fn get_many(
        &self,
        max_count: usize,
        partition: &Partition,
        block: bool,
    ) -> Result<Vec<Payload>, QueueError> {
        self.check_request(max_count)?;
        if max_count == 0 {
            return Ok(Vec::new());
        }

        loop {
            // Register interest before looking, so a put that lands between
            // the check and the await still wakes us.
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(items) = self.try_take(max_count, partition)? {
                self.inner.metrics.record_get(items.len());
                return Ok(items);
            }
            if !block {
                self.inner.metrics.record_get(0);
                return Ok(Vec::new());
            }

            notified.await;
        }
    }

    async fn clear(&self, partition: &Partition, all: bool) -> Result<usize, QueueError> {
        let discarded = {
            let mut state = self.state();
            if state.closed {
                return Err(QueueError::Closed);
            }
            if all {
                let total = state.partitions.values().map(VecDeque::len).sum();
                state.partitions.clear();
                total
            } else {
                state.partitions.remove(partition).map_or(0, |fifo| fifo.len())
            }
        };
        self.inner.metrics.record_clear(discarded);
        Ok(discarded)
    }

    fn len(&self, partition: &Partition) -> Result<usize, QueueError> {
        let state = self.state();
        if state.closed {
            return Err(QueueError::Closed);
        }
        Ok(state.partitions.get(partition).map_or(0, VecDeque::len))
    }

    fn max_len(&self) -> usize {
        self.inner.config.max_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn items(range: std::ops::Range<u8>) -> Vec<Payload> {
        range.map(|i| vec![i]).collect()
    }

    #[tokio::test]
    async fn test_put_get_fifo() {
        let backend = MemoryBackend::default();
        let queue = backend.ephemeral().await.unwrap();

        queue.put_many(items(0..5), &Partition::Default).unwrap();
        queue.put(vec![5], &Partition::Default).unwrap();

        let got = queue.get_many(4, &Partition::Default, false).await.unwrap();
        assert_eq!(got, items(0..4));
        let got = queue.get_many(10, &Partition::Default, false).await.unwrap();
        assert_eq!(got, items(4..6));
        assert!(queue.is_empty(&Partition::Default).unwrap());
    }

    #[tokio::test]
    async fn test_non_blocking_get_on_empty_partition() {
        let backend = MemoryBackend::default();
        let queue = backend.ephemeral().await.unwrap();

        let got = queue.get_many(10, &Partition::named("signal"), false).await.unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn test_partitions_are_independent() {
        let backend = MemoryBackend::default();
        let queue = backend.ephemeral().await.unwrap();
        let signal = Partition::named("signal");

        queue.put_many(items(0..3), &Partition::Default).unwrap();
        queue.put(vec![42], &signal).unwrap();

        assert_eq!(queue.len(&Partition::Default).unwrap(), 3);
        assert_eq!(queue.len(&signal).unwrap(), 1);
        assert_eq!(queue.get_many(10, &signal, false).await.unwrap(), vec![vec![42]]);
        assert_eq!(queue.len(&Partition::Default).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_blocking_get_wakes_on_put() {
        let backend = MemoryBackend::default();
        let queue = backend.ephemeral().await.unwrap();

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get_many(10, &Partition::named("signal"), true).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        queue.put(vec![1], &Partition::named("signal")).unwrap();
        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("getter was not woken")
            .unwrap()
            .unwrap();
        assert_eq!(got, vec![vec![1]]);
    }

    #[tokio::test]
    async fn test_dropped_blocking_get_loses_nothing() {
        let backend = MemoryBackend::default();
        let queue = backend.ephemeral().await.unwrap();

        let pending = queue.get_many(10, &Partition::Default, true);
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());

        queue.put_many(items(0..2), &Partition::Default).unwrap();
        assert_eq!(queue.len(&Partition::Default).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_request_ceiling() {
        let backend = MemoryBackend::new(QueueConfig::small());
        let queue = backend.ephemeral().await.unwrap();

        let err = queue.put_many(items(0..9), &Partition::Default).unwrap_err();
        assert_eq!(err, QueueError::RequestTooLarge { requested: 9, max: 8 });

        let err = queue.get_many(9, &Partition::Default, false).await.unwrap_err();
        assert_eq!(err, QueueError::RequestTooLarge { requested: 9, max: 8 });
        assert_eq!(queue.max_len(), 8);
    }

    #[tokio::test]
    async fn test_partition_capacity_is_all_or_nothing() {
        let backend = MemoryBackend::new(QueueConfig::new(8, 10));
        let queue = backend.ephemeral().await.unwrap();

        queue.put_many(items(0..8), &Partition::Default).unwrap();
        let err = queue.put_many(items(8..11), &Partition::Default).unwrap_err();
        assert_eq!(err, QueueError::Full { capacity: 10 });
        assert_eq!(queue.len(&Partition::Default).unwrap(), 8);
    }

    #[tokio::test]
    async fn test_clear() {
        let backend = MemoryBackend::default();
        let queue = backend.ephemeral().await.unwrap();
        let signal = Partition::named("signal");

        queue.put_many(items(0..3), &Partition::Default).unwrap();
        queue.put_many(items(0..2), &signal).unwrap();

        assert_eq!(queue.clear(&signal, false).await.unwrap(), 2);
        assert_eq!(queue.len(&Partition::Default).unwrap(), 3);

        queue.put(vec![9], &signal).unwrap();
        assert_eq!(queue.clear(&Partition::Default, true).await.unwrap(), 4);
        assert_eq!(queue.metrics().snapshot().items_cleared, 6);
    }

    #[tokio::test]
    async fn test_release_closes_and_wakes_getters() {
        let backend = MemoryBackend::default();
        let queue = backend.ephemeral().await.unwrap();
        assert_eq!(backend.live_queues(), 1);

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get_many(1, &Partition::Default, true).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        backend.release(&queue).await.unwrap();
        assert_eq!(backend.live_queues(), 0);
        assert!(queue.is_closed());

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("getter was not woken")
            .unwrap();
        assert_eq!(result, Err(QueueError::Closed));
        assert_eq!(queue.put(vec![1], &Partition::Default), Err(QueueError::Closed));
    }
}
