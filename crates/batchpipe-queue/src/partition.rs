use std::fmt;

/// A named sub-channel of a queue.
///
/// Items keep FIFO order within one partition. Nothing is promised across
/// partitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Partition {
    /// The unnamed partition every queue starts with.
    #[default]
    Default,
    /// A partition addressed by name.
    Named(String),
}

impl Partition {
    /// Creates a named partition.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("<default>"),
            Self::Named(name) => f.write_str(name),
        }
    }
}
