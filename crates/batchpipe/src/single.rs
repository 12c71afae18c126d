//! One-value-at-a-time view of the batch pipe.
//!
//! [`Sender::send`] wraps a value into a one-element batch; [`EachItem`]
//! unwraps batches on the consumer side and awaits the per-item handler on
//! each element in order.

use crate::config::PipeConfig;
use crate::error::PipeError;
use crate::handler::{Handler, HandlerResult};
use crate::metrics::PipeMetrics;
use crate::pipe::{BatchPipe, Teardown};
use crate::sender::BatchSender;
use batchpipe_queue::{QueueBackend, QueueService};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Batch handler that feeds each element to a per-item handler, sequentially.
#[derive(Clone)]
pub struct EachItem<H>(H);

impl<H> EachItem<H> {
    pub fn new(handler: H) -> Self {
        Self(handler)
    }

    pub fn into_inner(self) -> H {
        self.0
    }
}

impl<T, H> Handler<Vec<T>> for EachItem<H>
where
    T: Send + 'static,
    H: Handler<T>,
{
    fn handle(&mut self, batch: Vec<T>) -> impl Future<Output = HandlerResult> + Send + '_ {
        async move {
            for value in batch {
                self.0.handle(value).await?;
            }
            Ok(())
        }
    }
}

/// Sends single values to a [`Pipe`].
pub struct Sender<T, Q> {
    batch: BatchSender<T, Q>,
}

impl<T, Q: Clone> Clone for Sender<T, Q> {
    fn clone(&self) -> Self {
        Self {
            batch: self.batch.clone(),
        }
    }
}

impl<T, Q> fmt::Debug for Sender<T, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Sender").field(&self.batch).finish()
    }
}

impl<T, Q> Sender<T, Q>
where
    T: Serialize,
    Q: QueueService,
{
    /// Enqueues `value` as a one-element batch.
    pub fn send(&self, value: T) -> Result<(), PipeError> {
        self.batch.send(std::iter::once(value))
    }
}

/// Single-item pipe: one handler call per value.
///
/// A thin layer over [`BatchPipe`]; lifecycle and error behavior are the same.
pub struct Pipe<T, B: QueueBackend> {
    inner: BatchPipe<T, B>,
}

impl<T, B> Pipe<T, B>
where
    T: Serialize + DeserializeOwned + Send + 'static,
    B: QueueBackend,
{
    /// Allocates an ephemeral queue and starts feeding values to `receive`.
    pub async fn open<H>(backend: &B, receive: H, config: PipeConfig) -> Result<Self, PipeError>
    where
        H: Handler<T>,
    {
        let inner = BatchPipe::open(backend, EachItem::new(receive), config).await?;
        Ok(Self { inner })
    }

    /// Returns a new producer handle.
    pub fn sender(&self) -> Sender<T, B::Queue> {
        Sender {
            batch: self.inner.sender(),
        }
    }

    /// Returns the consumer's counters. Counts are per batch, not per handler call.
    pub fn metrics(&self) -> &Arc<PipeMetrics> {
        self.inner.metrics()
    }

    /// See [`BatchPipe::close`].
    pub async fn close(self) -> Result<Teardown, PipeError> {
        self.inner.close().await
    }
}

/// Runs `body` with a sender for a fresh single-item pipe, then closes the pipe.
///
/// ```
/// use batchpipe::{with_pipe, sync_handler, PipeConfig};
/// use batchpipe_queue::MemoryBackend;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), batchpipe::PipeError> {
/// let backend = MemoryBackend::default();
/// let handler = sync_handler(|item: String| println!("processing {item}"));
///
/// with_pipe(&backend, handler, PipeConfig::default(), |send| async move {
///     send.send("item1".to_owned())
/// })
/// .await??;
/// # Ok(())
/// # }
/// ```
pub async fn with_pipe<T, B, H, F, Fut>(
    backend: &B,
    receive: H,
    config: PipeConfig,
    body: F,
) -> Result<Fut::Output, PipeError>
where
    T: Serialize + DeserializeOwned + Send + 'static,
    B: QueueBackend,
    H: Handler<T>,
    F: FnOnce(Sender<T, B::Queue>) -> Fut,
    Fut: Future,
{
    let pipe = Pipe::open(backend, receive, config).await?;
    let output = body(pipe.sender()).await;
    pipe.close().await?;
    Ok(output)
}
