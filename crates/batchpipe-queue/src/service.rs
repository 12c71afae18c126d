//! The queue-service contract.

use crate::error::QueueError;
use crate::partition::Partition;
use std::future::Future;

/// An opaque, already-encoded item. Queues never look inside.
pub type Payload = Vec<u8>;

/// A partitioned FIFO queue shared by many producers and one consumer.
///
/// Handles are cheap to clone; every clone addresses the same queue, so a
/// handle can be moved to any thread or task that wants to produce.
///
/// # Note on Object Safety
///
/// The async methods return `impl Future`, so this trait is used through
/// generics rather than `dyn QueueService`.
pub trait QueueService: Clone + Send + Sync + 'static {
    /// Enqueues `items` onto `partition`, preserving their order.
    ///
    /// All-or-nothing: on error no item has been enqueued.
    fn put_many(&self, items: Vec<Payload>, partition: &Partition) -> Result<(), QueueError>;

    /// Enqueues a single item onto `partition`.
    fn put(&self, item: Payload, partition: &Partition) -> Result<(), QueueError> {
        self.put_many(vec![item], partition)
    }

    /// Dequeues up to `max_count` items from `partition`.
    ///
    /// With `block` set, waits until at least one item is present. Without it,
    /// returns whatever is there, possibly nothing. Dropping the returned
    /// future before it completes loses no items.
    fn get_many(
        &self,
        max_count: usize,
        partition: &Partition,
        block: bool,
    ) -> impl Future<Output = Result<Vec<Payload>, QueueError>> + Send;

    /// Discards the items of `partition`, or of every partition when `all` is set.
    ///
    /// Returns the number of items discarded.
    fn clear(
        &self,
        partition: &Partition,
        all: bool,
    ) -> impl Future<Output = Result<usize, QueueError>> + Send;

    /// Number of items currently resident in `partition`.
    fn len(&self, partition: &Partition) -> Result<usize, QueueError>;

    /// Returns `true` if `partition` holds no items.
    fn is_empty(&self, partition: &Partition) -> Result<bool, QueueError> {
        self.len(partition).map(|len| len == 0)
    }

    /// The per-request item ceiling this queue enforces.
    fn max_len(&self) -> usize;
}

/// Allocates and destroys ephemeral queues.
pub trait QueueBackend: Clone + Send + Sync + 'static {
    /// The queue handle this backend hands out.
    type Queue: QueueService;

    /// Allocates a fresh, empty queue.
    fn ephemeral(&self) -> impl Future<Output = Result<Self::Queue, QueueError>> + Send;

    /// Destroys `queue`. Its items are dropped, blocked getters wake with
    /// [`QueueError::Closed`], and every later operation fails the same way.
    fn release(&self, queue: &Self::Queue) -> impl Future<Output = Result<(), QueueError>> + Send;
}
