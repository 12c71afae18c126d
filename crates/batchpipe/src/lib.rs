//! Many-Producer, Single-Consumer Batching Pipe
//!
//! Producers anywhere (tasks, threads, or processes that can reach the queue
//! service) enqueue values; exactly one local consumer task drains them in
//! batches and awaits a user-supplied handler for each batch.
//!
//! The queue service only offers multi-put, blocking/non-blocking multi-get,
//! clear, and named partitions. Low-latency wakeups are built on top of that:
//! every send writes its values to a data partition and one signal token to a
//! control partition, and the consumer blocks on the control partition instead
//! of polling.
//!
//! # Features
//!
//! - **No polling**: the consumer wakes on a signal token or on stop, nothing else
//! - **Sequential dispatch**: one handler call at a time, each awaited to completion
//! - **Sync or async handlers**: [`sync_handler`] and [`async_handler`] share one contract
//! - **Drained shutdown**: `close` raises stop, the consumer drains what is left, and
//!   the wait is bounded by `trailing_timeout` with a configurable [`ErrorPolicy`]
//! - **Per-item or per-batch**: [`Pipe`] and [`BatchPipe`] are two views of one mechanism
//!
//! # Example
//!
//! ```
//! use batchpipe::{sync_handler, with_pipe, PipeConfig};
//! use batchpipe_queue::MemoryBackend;
//! use std::sync::{Arc, Mutex};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), batchpipe::PipeError> {
//! let backend = MemoryBackend::default();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let handler = {
//!     let seen = Arc::clone(&seen);
//!     sync_handler(move |v: u32| seen.lock().unwrap().push(v))
//! };
//!
//! with_pipe(&backend, handler, PipeConfig::default(), |send| async move {
//!     // Each clone of `send` can live on its own thread.
//!     for v in 1..=3 {
//!         send.send(v)?;
//!     }
//!     Ok::<_, batchpipe::PipeError>(())
//! })
//! .await??;
//!
//! assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
//! # Ok(())
//! # }
//! ```

mod codec;
mod config;
mod consumer;
mod error;
mod handler;
mod invariants;
mod metrics;
mod pipe;
mod router;
mod sender;
mod shutdown;
mod single;

pub use config::{ErrorPolicy, ParsePolicyError, PipeConfig, DEFAULT_TRAILING_TIMEOUT, SIGNAL_PARTITION};
pub use error::{BoxError, PipeError};
pub use handler::{
    async_handler, sync_handler, AsyncFn, Handler, HandlerBoxed, HandlerResult, IntoHandlerResult,
    SyncFn,
};
pub use metrics::PipeMetrics;
pub use pipe::{with_batch_pipe, BatchPipe, Teardown};
pub use router::{Event, Router};
pub use sender::BatchSender;
pub use single::{with_pipe, EachItem, Pipe, Sender};
