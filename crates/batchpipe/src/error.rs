//! Error types for pipe operations.

use batchpipe_queue::QueueError;
use std::time::Duration;
use thiserror::Error;

/// Error type handlers may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while sending through, draining, or tearing down a pipe.
#[derive(Debug, Error)]
pub enum PipeError {
    /// The underlying queue service rejected an operation.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// A value could not be encoded for the queue.
    #[error("failed to encode item: {0}")]
    Encode(#[source] serde_json::Error),

    /// A payload taken from the queue could not be decoded; the consumer stopped.
    ///
    /// The whole drained batch is discarded, including payloads that did
    /// decode: they were already dequeued and the handler never sees them.
    #[error("failed to decode item: {0}")]
    Decode(#[source] serde_json::Error),

    /// The user's handler returned an error; the consumer stopped.
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),

    /// The consumer task panicked.
    #[error("consumer task panicked: {0}")]
    ConsumerPanicked(String),

    /// The consumer did not finish within `trailing_timeout` after stop.
    #[error("timed out after {timeout:?} while waiting for trailing messages")]
    TrailingTimeout {
        /// The configured bound that expired.
        timeout: Duration,
    },

    /// The configuration cannot be used.
    #[error("invalid pipe configuration: {0}")]
    InvalidConfig(&'static str),
}

impl PipeError {
    /// Returns `true` if retrying the failed send later may succeed.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Queue(e) if e.is_recoverable())
    }

    /// Returns `true` if the pipe (or its queue) is permanently unusable.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Queue(e) => e.is_terminal(),
            Self::Handler(_) | Self::ConsumerPanicked(_) | Self::Decode(_) => true,
            _ => false,
        }
    }
}
