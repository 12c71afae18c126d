//! Pipe lifecycle: allocate the queue, run the consumer, tear both down.

use crate::config::{ErrorPolicy, PipeConfig};
use crate::consumer::BatchConsumer;
use crate::error::PipeError;
use crate::handler::Handler;
use crate::metrics::PipeMetrics;
use crate::sender::BatchSender;
use crate::shutdown::{stop_request, StopRequest};
use batchpipe_queue::{QueueBackend, QueueService};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, warn};

/// How a successful [`BatchPipe::close`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// The consumer finished its final drain and the queue was released.
    Drained,
    /// The consumer outlived `trailing_timeout` and was handed to a watcher
    /// task, which releases the queue once the consumer finishes.
    Detached,
}

/// A many-producer, single-consumer batching pipe.
///
/// `open` allocates an ephemeral queue and starts the consumer task; any
/// number of [`BatchSender`]s feed it; `close` stops the consumer after a
/// final drain and releases the queue.
///
/// Dropping a pipe without calling `close` raises the stop request and
/// detaches the consumer, which then drains and releases the queue on its own.
///
/// # Example
///
/// ```
/// use batchpipe::{sync_handler, BatchPipe, PipeConfig};
/// use batchpipe_queue::MemoryBackend;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), batchpipe::PipeError> {
/// let backend = MemoryBackend::default();
/// let handler = sync_handler(|batch: Vec<u32>| println!("{batch:?}"));
///
/// let pipe = BatchPipe::open(&backend, handler, PipeConfig::default()).await?;
/// let send = pipe.sender();
/// send.send([1, 2, 3])?;
/// pipe.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct BatchPipe<T, B: QueueBackend> {
    backend: B,
    queue: B::Queue,
    sender: BatchSender<T, B::Queue>,
    /// `None` only after `close` or `drop` took it.
    consumer: Option<JoinHandle<Result<(), PipeError>>>,
    stop: StopRequest,
    config: PipeConfig,
    metrics: Arc<PipeMetrics>,
}

impl<T, B> BatchPipe<T, B>
where
    T: Serialize + DeserializeOwned + Send + 'static,
    B: QueueBackend,
{
    /// Allocates an ephemeral queue on `backend` and starts consuming it with `receive`.
    ///
    /// Must be called inside a Tokio runtime.
    pub async fn open<H>(backend: &B, receive: H, config: PipeConfig) -> Result<Self, PipeError>
    where
        H: Handler<Vec<T>>,
    {
        config.validate()?;
        let queue = backend.ephemeral().await?;
        let max_len = config.max_len.min(queue.max_len());

        let (stop, listener) = stop_request();
        let metrics = Arc::new(PipeMetrics::default());
        let consumer = BatchConsumer::new(
            queue.clone(),
            receive,
            listener,
            config.data_partition.clone(),
            config.signal_partition.clone(),
            max_len,
            Arc::clone(&metrics),
        );

        debug!(max_len, "starting consumer task");
        let consumer = tokio::spawn(consumer.run());

        let sender = BatchSender::new(
            queue.clone(),
            config.data_partition.clone(),
            config.signal_partition.clone(),
        );

        Ok(Self {
            backend: backend.clone(),
            queue,
            sender,
            consumer: Some(consumer),
            stop,
            config,
            metrics,
        })
    }

    /// Returns a new producer handle.
    pub fn sender(&self) -> BatchSender<T, B::Queue> {
        self.sender.clone()
    }

    /// Returns the consumer's counters.
    pub fn metrics(&self) -> &Arc<PipeMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &PipeConfig {
        &self.config
    }

    /// Stops the consumer and waits for it to drain trailing items.
    ///
    /// The wait is bounded by `trailing_timeout`. When it expires, the
    /// consumer keeps running under a watcher task and the result depends on
    /// the error policy: [`ErrorPolicy::Throw`] returns
    /// [`PipeError::TrailingTimeout`], [`ErrorPolicy::Log`] warns and returns
    /// [`Teardown::Detached`].
    ///
    /// Handler and decode failures from the consumer surface here.
    pub async fn close(mut self) -> Result<Teardown, PipeError> {
        debug!("stopping consumer task");
        self.stop.raise();

        let Some(mut consumer) = self.consumer.take() else {
            return Ok(Teardown::Drained);
        };

        let joined = match self.config.trailing_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut consumer).await {
                Ok(joined) => joined,
                Err(_) => {
                    detach(&Handle::current(), consumer, self.backend.clone(), self.queue.clone());
                    return match self.config.errors {
                        ErrorPolicy::Throw => Err(PipeError::TrailingTimeout { timeout: limit }),
                        ErrorPolicy::Log => {
                            warn!(timeout = ?limit, "timed out waiting for trailing messages");
                            Ok(Teardown::Detached)
                        }
                    };
                }
            },
            None => consumer.await,
        };

        let released = self.backend.release(&self.queue).await;
        join_outcome(joined)?;
        released?;
        debug!(items = self.metrics.items_handled(), "pipe closed");
        Ok(Teardown::Drained)
    }
}

impl<T, B: QueueBackend> Drop for BatchPipe<T, B> {
    fn drop(&mut self) {
        let Some(consumer) = self.consumer.take() else {
            return;
        };
        self.stop.raise();
        match Handle::try_current() {
            Ok(runtime) => {
                warn!("pipe dropped without close; detaching consumer");
                detach(&runtime, consumer, self.backend.clone(), self.queue.clone());
            }
            Err(_) => warn!("pipe dropped outside a runtime; queue is not released"),
        }
    }
}

/// Hands a still-running consumer to a watcher that reports its outcome and
/// then releases the queue.
fn detach<B: QueueBackend>(
    runtime: &Handle,
    consumer: JoinHandle<Result<(), PipeError>>,
    backend: B,
    queue: B::Queue,
) {
    runtime.spawn(async move {
        match join_outcome(consumer.await) {
            Ok(()) => debug!("detached consumer finished draining"),
            Err(e) => error!(error = %e, "detached consumer failed"),
        }
        if let Err(e) = backend.release(&queue).await {
            warn!(error = %e, "failed to release queue of detached consumer");
        }
    });
}

fn join_outcome(joined: Result<Result<(), PipeError>, JoinError>) -> Result<(), PipeError> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(PipeError::ConsumerPanicked(e.to_string())),
    }
}

/// Runs `body` with a sender for a fresh batch pipe, then closes the pipe.
///
/// Teardown always follows `body`, whatever it returns. If `body` panics the
/// pipe is dropped, which raises the stop request and detaches the consumer.
///
/// ```
/// use batchpipe::{with_batch_pipe, async_handler, PipeConfig};
/// use batchpipe_queue::MemoryBackend;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), batchpipe::PipeError> {
/// let backend = MemoryBackend::default();
/// let handler = async_handler(|batch: Vec<String>| async move {
///     println!("processing {} items", batch.len());
/// });
///
/// with_batch_pipe(&backend, handler, PipeConfig::default(), |send| async move {
///     send.send(["item1".to_owned(), "item2".to_owned()])
/// })
/// .await??;
/// # Ok(())
/// # }
/// ```
pub async fn with_batch_pipe<T, B, H, F, Fut>(
    backend: &B,
    receive: H,
    config: PipeConfig,
    body: F,
) -> Result<Fut::Output, PipeError>
where
    T: Serialize + DeserializeOwned + Send + 'static,
    B: QueueBackend,
    H: Handler<Vec<T>>,
    F: FnOnce(BatchSender<T, B::Queue>) -> Fut,
    Fut: Future,
{
    let pipe = BatchPipe::open(backend, receive, config).await?;
    let output = body(pipe.sender()).await;
    pipe.close().await?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::sync_handler;
    use batchpipe_queue::MemoryBackend;
    use std::time::Duration;

    #[tokio::test]
    async fn test_close_releases_queue() {
        let backend = MemoryBackend::default();
        let pipe: BatchPipe<u32, _> =
            BatchPipe::open(&backend, sync_handler(|_: Vec<u32>| ()), PipeConfig::default())
                .await
                .unwrap();
        assert_eq!(backend.live_queues(), 1);

        assert_eq!(pipe.close().await.unwrap(), Teardown::Drained);
        assert_eq!(backend.live_queues(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_allocation() {
        let backend = MemoryBackend::default();
        let result: Result<BatchPipe<u32, _>, _> = BatchPipe::open(
            &backend,
            sync_handler(|_: Vec<u32>| ()),
            PipeConfig::default().with_max_len(0),
        )
        .await;

        assert!(matches!(result, Err(PipeError::InvalidConfig(_))));
        assert_eq!(backend.live_queues(), 0);
    }

    #[tokio::test]
    async fn test_drop_without_close_detaches_and_drains() {
        let backend = MemoryBackend::default();
        let pipe = BatchPipe::open(&backend, sync_handler(|_: Vec<u32>| ()), PipeConfig::default())
            .await
            .unwrap();
        let metrics = Arc::clone(pipe.metrics());
        pipe.sender().send([1, 2]).unwrap();
        drop(pipe);

        tokio::time::timeout(Duration::from_secs(2), async {
            while backend.live_queues() > 0 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("detached consumer never released the queue");
        assert_eq!(metrics.items_handled(), 2);
    }
}
