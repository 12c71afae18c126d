//! Configuration for pipe behavior.

use crate::error::PipeError;
use batchpipe_queue::{Partition, MAX_LEN};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default bound on how long `close` waits for trailing items.
pub const DEFAULT_TRAILING_TIMEOUT: Duration = Duration::from_secs(5);

/// Name of the control partition carrying signal tokens.
pub const SIGNAL_PARTITION: &str = "signal";

/// What `close` does when the consumer outlives `trailing_timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Return [`PipeError::TrailingTimeout`].
    Throw,
    /// Emit a warning and finish teardown normally.
    #[default]
    Log,
}

/// Returned when parsing an [`ErrorPolicy`] from an unknown string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown error policy {0:?} (expected \"throw\" or \"log\")")]
pub struct ParsePolicyError(String);

impl FromStr for ErrorPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "throw" => Ok(Self::Throw),
            "log" => Ok(Self::Log),
            other => Err(ParsePolicyError(other.to_owned())),
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Throw => "throw",
            Self::Log => "log",
        })
    }
}

/// Configuration for a pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeConfig {
    /// How long `close` waits for the consumer after raising stop.
    ///
    /// `None` waits indefinitely.
    ///
    /// Default: 5s
    pub trailing_timeout: Option<Duration>,

    /// Behavior when `trailing_timeout` expires.
    ///
    /// Default: [`ErrorPolicy::Log`]
    pub errors: ErrorPolicy,

    /// Maximum items taken from the queue per request.
    ///
    /// Clamped to the queue's own ceiling at open time.
    ///
    /// Default: [`MAX_LEN`]
    pub max_len: usize,

    /// Partition carrying the values.
    pub data_partition: Partition,

    /// Partition carrying signal tokens.
    pub signal_partition: Partition,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            trailing_timeout: Some(DEFAULT_TRAILING_TIMEOUT),
            errors: ErrorPolicy::Log,
            max_len: MAX_LEN,
            data_partition: Partition::Default,
            signal_partition: Partition::named(SIGNAL_PARTITION),
        }
    }
}

impl PipeConfig {
    /// Waits for trailing items without a bound.
    pub fn unbounded() -> Self {
        Self::default().with_trailing_timeout(None)
    }

    /// Fails `close` when trailing items are not handled in time.
    pub fn strict() -> Self {
        Self::default().with_errors(ErrorPolicy::Throw)
    }

    /// Sets the trailing timeout.
    pub fn with_trailing_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.trailing_timeout = timeout;
        self
    }

    /// Sets the timeout policy.
    pub fn with_errors(mut self, errors: ErrorPolicy) -> Self {
        self.errors = errors;
        self
    }

    /// Sets the per-request drain size.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Sets both partition names.
    pub fn with_partitions(mut self, data: Partition, signal: Partition) -> Self {
        self.data_partition = data;
        self.signal_partition = signal;
        self
    }

    /// Checks that the configuration can drive a pipe.
    pub fn validate(&self) -> Result<(), PipeError> {
        if self.max_len == 0 {
            return Err(PipeError::InvalidConfig("max_len must be at least 1"));
        }
        if self.data_partition == self.signal_partition {
            return Err(PipeError::InvalidConfig(
                "data and signal partitions must differ",
            ));
        }
        Ok(())
    }
}
