//! The batch consumer loop.
//!
//! There is no "N items are ready" notification in the queue service, so
//! producers write a signal token to a control partition after every batch.
//! Each iteration:
//!
//! 1. Races a blocking get on the control partition against the stop request
//! 2. Drains up to `max_len` values from the data partition, whatever woke it
//! 3. Awaits the handler on a non-empty drain
//! 4. Stops only if the stop request had already won the race in step 1
//!
//! The stop outcome is captured at race time. Re-reading the flag after the
//! handler returns would let a late stop skip the drain of data that arrived
//! alongside it.
//!
//! A drain that comes back exactly `max_len` long means more may be waiting,
//! so the next iteration skips the wait and drains again. On stop the loop
//! keeps draining until a short batch before it clears residual tokens.

use crate::codec::decode_batch;
use crate::error::PipeError;
use crate::handler::Handler;
#[cfg(debug_assertions)]
use crate::invariants::{debug_assert_drain_within_limit, debug_assert_final_drain};
use crate::metrics::PipeMetrics;
use crate::shutdown::StopListener;
use batchpipe_queue::{Partition, QueueService};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace};

pub(crate) struct BatchConsumer<T, Q, H> {
    queue: Q,
    handler: H,
    stop: StopListener,
    data: Partition,
    signal: Partition,
    max_len: usize,
    metrics: Arc<PipeMetrics>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, Q, H> BatchConsumer<T, Q, H>
where
    T: DeserializeOwned + Send + 'static,
    Q: QueueService,
    H: Handler<Vec<T>>,
{
    pub(crate) fn new(
        queue: Q,
        handler: H,
        stop: StopListener,
        data: Partition,
        signal: Partition,
        max_len: usize,
        metrics: Arc<PipeMetrics>,
    ) -> Self {
        Self {
            queue,
            handler,
            stop,
            data,
            signal,
            max_len,
            metrics,
            _marker: PhantomData,
        }
    }

    /// Runs until a stop request has been observed and the final drain is done.
    pub(crate) async fn run(mut self) -> Result<(), PipeError> {
        let mut backlog = false;

        loop {
            let stop_raised = if backlog {
                self.metrics.record_wake(0);
                self.stop.try_raised()
            } else {
                self.wait_for_wake().await?
            };

            let mut drained = self.drain().await?;
            backlog = drained == self.max_len;

            if stop_raised {
                while drained == self.max_len {
                    drained = self.drain().await?;
                }

                // INV-STOP-01: nothing accepted before stop is cleared
                #[cfg(debug_assertions)]
                debug_assert_final_drain!(drained, self.max_len);

                let cleared = self.queue.clear(&self.data, true).await?;
                self.metrics.record_cleared(cleared);
                debug!(cleared, "consumer stopped");
                return Ok(());
            }
        }
    }

    /// Waits for a signal token or the stop request.
    ///
    /// Returns whether the stop request won.
    async fn wait_for_wake(&mut self) -> Result<bool, PipeError> {
        tokio::select! {
            biased;

            () = self.stop.raised() => {
                self.metrics.record_wake(0);
                Ok(true)
            }

            tokens = self.queue.get_many(self.max_len, &self.signal, true) => {
                let tokens = tokens?;
                self.metrics.record_wake(tokens.len());
                Ok(false)
            }
        }
    }

    /// Takes one batch off the data partition and hands it to the handler.
    async fn drain(&mut self) -> Result<usize, PipeError> {
        let payloads = self.queue.get_many(self.max_len, &self.data, false).await?;
        let count = payloads.len();

        // INV-DRAIN-01: one drain never exceeds max_len
        #[cfg(debug_assertions)]
        debug_assert_drain_within_limit!(count, self.max_len);

        if count > 0 {
            let values: Vec<T> = decode_batch(payloads)?;
            self.handler
                .handle(values)
                .await
                .map_err(PipeError::Handler)?;
            self.metrics.record_batch(count);
            trace!(count, "handled batch");
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::sync_handler;
    use crate::sender::BatchSender;
    use crate::shutdown::stop_request;
    use batchpipe_queue::{MemoryBackend, MemoryQueue, QueueBackend};
    use std::sync::Mutex;
    use std::time::Duration;

    struct Harness {
        queue: MemoryQueue,
        sender: BatchSender<u32, MemoryQueue>,
        batches: Arc<Mutex<Vec<Vec<u32>>>>,
        metrics: Arc<PipeMetrics>,
    }

    async fn spawn_consumer(
        max_len: usize,
    ) -> (
        Harness,
        crate::shutdown::StopRequest,
        tokio::task::JoinHandle<Result<(), PipeError>>,
    ) {
        let backend = MemoryBackend::default();
        let queue = backend.ephemeral().await.unwrap();
        let batches = Arc::new(Mutex::new(Vec::new()));
        let metrics = Arc::new(PipeMetrics::default());
        let (stop, listener) = stop_request();

        let handler = {
            let batches = Arc::clone(&batches);
            sync_handler(move |batch: Vec<u32>| batches.lock().unwrap().push(batch))
        };
        let consumer = BatchConsumer::new(
            queue.clone(),
            handler,
            listener,
            Partition::Default,
            Partition::named("signal"),
            max_len,
            Arc::clone(&metrics),
        );
        let task = tokio::spawn(consumer.run());
        let sender = BatchSender::new(queue.clone(), Partition::Default, Partition::named("signal"));

        (
            Harness {
                queue,
                sender,
                batches,
                metrics,
            },
            stop,
            task,
        )
    }

    async fn wait_for_items(metrics: &PipeMetrics, expected: u64) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while metrics.items_handled() < expected {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("consumer did not handle all items in time");
    }

    #[tokio::test]
    async fn test_wakes_on_signal() {
        let (h, mut stop, task) = spawn_consumer(100).await;

        h.sender.send([1, 2, 3]).unwrap();
        wait_for_items(&h.metrics, 3).await;
        assert_eq!(*h.batches.lock().unwrap(), vec![vec![1, 2, 3]]);

        stop.raise();
        task.await.unwrap().unwrap();
        assert!(h.metrics.signals_consumed() >= 1);
    }

    #[tokio::test]
    async fn test_backlog_beyond_max_len_is_drained_without_new_sends() {
        let (h, mut stop, task) = spawn_consumer(4).await;

        h.sender.send(0..10).unwrap();
        wait_for_items(&h.metrics, 10).await;

        let batches = h.batches.lock().unwrap().clone();
        assert_eq!(batches, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9]]);

        stop.raise();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_stop_drains_backlog_before_clearing() {
        let (h, mut stop, task) = spawn_consumer(4).await;

        // Data without a signal: only the stop wake can find it.
        h.queue
            .put_many(
                (0..9u32).map(|v| serde_json::to_vec(&v).unwrap()).collect(),
                &Partition::Default,
            )
            .unwrap();
        stop.raise();
        task.await.unwrap().unwrap();

        let all: Vec<u32> = h.batches.lock().unwrap().concat();
        assert_eq!(all, (0..9).collect::<Vec<_>>());
        assert_eq!(h.metrics.residual_cleared(), 0);
    }

    #[tokio::test]
    async fn test_stop_clears_residual_tokens() {
        let (h, mut stop, task) = spawn_consumer(100).await;

        h.queue.put(b"true".to_vec(), &Partition::named("signal")).unwrap();
        h.queue.put(b"true".to_vec(), &Partition::named("signal")).unwrap();
        stop.raise();
        task.await.unwrap().unwrap();

        // Either both tokens were consumed by a wake, or the clear took them.
        assert_eq!(h.metrics.signals_consumed() + h.metrics.residual_cleared(), 2);
        assert_eq!(h.queue.len(&Partition::named("signal")).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_handler_error_ends_loop() {
        let backend = MemoryBackend::default();
        let queue = backend.ephemeral().await.unwrap();
        let (_stop, listener) = stop_request();
        let handler = sync_handler(|_: Vec<u32>| Err::<(), _>("rejected"));
        let consumer = BatchConsumer::new(
            queue.clone(),
            handler,
            listener,
            Partition::Default,
            Partition::named("signal"),
            100,
            Arc::new(PipeMetrics::default()),
        );
        let task = tokio::spawn(consumer.run());

        let sender: BatchSender<u32, _> =
            BatchSender::new(queue, Partition::Default, Partition::named("signal"));
        sender.send([1]).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(PipeError::Handler(e)) if e.to_string() == "rejected"));
    }

    #[tokio::test]
    async fn test_undecodable_payload_discards_whole_batch() {
        let (h, _stop, task) = spawn_consumer(100).await;

        h.queue
            .put_many(
                vec![
                    serde_json::to_vec(&1u32).unwrap(),
                    b"not json".to_vec(),
                    serde_json::to_vec(&3u32).unwrap(),
                ],
                &Partition::Default,
            )
            .unwrap();
        h.queue.put(b"true".to_vec(), &Partition::named("signal")).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(PipeError::Decode(_))));
        assert!(h.batches.lock().unwrap().is_empty());
        assert_eq!(h.queue.len(&Partition::Default).unwrap(), 0);
        assert_eq!(h.metrics.items_handled(), 0);
    }
}
