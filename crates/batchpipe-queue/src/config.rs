/// Maximum number of items a single request may carry.
///
/// Backends treat this as a hard ceiling for both `put_many` and `get_many`.
pub const MAX_LEN: usize = 5_000;

/// Default number of items one partition may hold at once.
pub const DEFAULT_PARTITION_CAPACITY: usize = 5_000;

/// Configuration for in-memory queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum items per request (default: [`MAX_LEN`])
    pub max_len: usize,
    /// Maximum items resident in one partition (default: [`DEFAULT_PARTITION_CAPACITY`])
    pub partition_capacity: usize,
}

impl QueueConfig {
    /// Creates a new configuration with custom settings.
    pub const fn new(max_len: usize, partition_capacity: usize) -> Self {
        Self {
            max_len,
            partition_capacity,
        }
    }

    /// Tiny limits, handy for exercising backlog and capacity paths in tests.
    pub const fn small() -> Self {
        Self::new(8, 32)
    }

    /// Sets the per-request ceiling.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Sets the per-partition capacity.
    pub fn with_partition_capacity(mut self, capacity: usize) -> Self {
        self.partition_capacity = capacity;
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new(MAX_LEN, DEFAULT_PARTITION_CAPACITY)
    }
}
