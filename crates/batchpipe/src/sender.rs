//! Producer side of the pipe.

use crate::codec::{encode_batch, SIGNAL_TOKEN};
use crate::error::PipeError;
#[cfg(debug_assertions)]
use crate::invariants::debug_assert_data_before_signal;
use batchpipe_queue::{Partition, QueueError, QueueService};
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use tracing::trace;

/// Sends batches of values to the pipe's consumer.
///
/// A `BatchSender` holds nothing but a queue handle and two partition names:
/// no lock, no local channel, nothing shared with the consumer except the queue
/// service. Clones may be moved to any thread or task, and the same scheme
/// works for producers in other processes that can reach the queue.
pub struct BatchSender<T, Q> {
    queue: Q,
    data: Partition,
    signal: Partition,
    _marker: PhantomData<fn(T)>,
}

impl<T, Q: Clone> Clone for BatchSender<T, Q> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            data: self.data.clone(),
            signal: self.signal.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, Q> fmt::Debug for BatchSender<T, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchSender")
            .field("data", &self.data)
            .field("signal", &self.signal)
            .finish_non_exhaustive()
    }
}

impl<T, Q> BatchSender<T, Q>
where
    T: Serialize,
    Q: QueueService,
{
    pub(crate) fn new(queue: Q, data: Partition, signal: Partition) -> Self {
        Self {
            queue,
            data,
            signal,
            _marker: PhantomData,
        }
    }

    /// Enqueues `values` as one batch, then one signal token.
    ///
    /// Values of one call reach the handler in iteration order. Returns once
    /// both writes are accepted; it never waits for the consumer. An empty
    /// batch is a no-op.
    pub fn send<I>(&self, values: I) -> Result<(), PipeError>
    where
        I: IntoIterator<Item = T>,
    {
        let payloads = encode_batch(values)?;
        if payloads.is_empty() {
            return Ok(());
        }
        let count = payloads.len();

        self.queue.put_many(payloads, &self.data)?;

        // INV-SEND-01: signal only follows accepted data
        #[cfg(debug_assertions)]
        debug_assert_data_before_signal!(true);

        match self.queue.put(SIGNAL_TOKEN.to_vec(), &self.signal) {
            Ok(()) => {}
            // A full control partition already holds tokens that will wake
            // the consumer, and any wake drains the data partition.
            Err(QueueError::Full { .. }) => {
                trace!(partition = %self.signal, "signal partition full; relying on pending tokens");
            }
            Err(e) => return Err(e.into()),
        }

        trace!(count, "sent batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchpipe_queue::{MemoryBackend, QueueBackend, QueueConfig};

    #[tokio::test]
    async fn test_send_writes_data_then_one_signal() {
        let backend = MemoryBackend::default();
        let queue = backend.ephemeral().await.unwrap();
        let sender: BatchSender<u32, _> =
            BatchSender::new(queue.clone(), Partition::Default, Partition::named("signal"));

        sender.send([1, 2, 3]).unwrap();
        sender.send(vec![4]).unwrap();

        assert_eq!(queue.len(&Partition::Default).unwrap(), 4);
        assert_eq!(queue.len(&Partition::named("signal")).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_no_op() {
        let backend = MemoryBackend::default();
        let queue = backend.ephemeral().await.unwrap();
        let sender: BatchSender<u32, _> =
            BatchSender::new(queue.clone(), Partition::Default, Partition::named("signal"));

        sender.send(Vec::new()).unwrap();
        assert!(queue.is_empty(&Partition::named("signal")).unwrap());
    }

    #[tokio::test]
    async fn test_full_signal_partition_is_tolerated() {
        let backend = MemoryBackend::new(QueueConfig::new(8, 4));
        let queue = backend.ephemeral().await.unwrap();
        let signal = Partition::named("signal");
        queue.put_many(vec![SIGNAL_TOKEN.to_vec(); 4], &signal).unwrap();

        let sender: BatchSender<u32, _> =
            BatchSender::new(queue.clone(), Partition::Default, signal.clone());
        sender.send([7]).unwrap();

        assert_eq!(queue.len(&Partition::Default).unwrap(), 1);
        assert_eq!(queue.len(&signal).unwrap(), 4);
    }

    #[tokio::test]
    async fn test_full_data_partition_is_reported() {
        let backend = MemoryBackend::new(QueueConfig::new(8, 2));
        let queue = backend.ephemeral().await.unwrap();
        let sender: BatchSender<u32, _> =
            BatchSender::new(queue.clone(), Partition::Default, Partition::named("signal"));

        let err = sender.send([1, 2, 3]).unwrap_err();
        assert!(err.is_recoverable());
        assert!(queue.is_empty(&Partition::named("signal")).unwrap());
    }
}
