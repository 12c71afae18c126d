//! Error types for queue operations.

use thiserror::Error;

/// Errors that can occur in queue operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The partition cannot hold the requested items.
    #[error("partition is full (capacity: {capacity})")]
    Full {
        /// The configured per-partition capacity.
        capacity: usize,
    },

    /// A single request exceeded the per-request item ceiling.
    #[error("request of {requested} items exceeds the limit of {max}")]
    RequestTooLarge {
        /// Number of items in the rejected request.
        requested: usize,
        /// The configured per-request ceiling.
        max: usize,
    },

    /// The queue has been released.
    #[error("queue is closed")]
    Closed,
}

impl QueueError {
    /// Returns `true` if retrying later may succeed (e.g., `Full`).
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Full { .. })
    }

    /// Returns `true` if the queue is permanently unusable.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
