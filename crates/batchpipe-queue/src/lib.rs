//! Partitioned FIFO Queue Service for batchpipe
//!
//! This crate defines the contract batchpipe needs from a distributed queue
//! service, and ships an in-process implementation of it.
//!
//! The contract is deliberately small:
//!
//! - **Named partitions**: FIFO order holds within one partition, never across
//! - **Multi-put**: synchronous, non-blocking, all-or-nothing enqueue
//! - **Multi-get**: blocking (wait for at least one item) or non-blocking (possibly empty)
//! - **Clear**: discard residual items of one or every partition
//! - **Ephemeral lifecycle**: queues are allocated and released by a [`QueueBackend`]
//!
//! Every request is bounded by a hard item ceiling ([`MAX_LEN`] by default).
//!
//! # Example
//!
//! ```
//! use batchpipe_queue::{MemoryBackend, Partition, QueueBackend, QueueService};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), batchpipe_queue::QueueError> {
//! let backend = MemoryBackend::default();
//! let queue = backend.ephemeral().await?;
//!
//! queue.put_many(vec![b"a".to_vec(), b"b".to_vec()], &Partition::Default)?;
//! let items = queue.get_many(10, &Partition::Default, false).await?;
//! assert_eq!(items, vec![b"a".to_vec(), b"b".to_vec()]);
//!
//! backend.release(&queue).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod memory;
mod metrics;
mod partition;
mod service;

pub use config::{QueueConfig, DEFAULT_PARTITION_CAPACITY, MAX_LEN};
pub use error::QueueError;
pub use memory::{MemoryBackend, MemoryQueue};
pub use metrics::{MetricsSnapshot, QueueMetrics};
pub use partition::Partition;
pub use service::{Payload, QueueBackend, QueueService};
