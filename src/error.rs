//! Error types for the monitor store and writer.

use thiserror::Error;

/// Errors returned by [`MonitorStore`](crate::MonitorStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Monitor names must contain something other than whitespace.
    #[error("monitor name cannot be blank")]
    InvalidName,

    /// No live monitor with this name.
    #[error("monitor not found: {0}")]
    NotFound(String),

    /// The key-value store could not be reached or rejected the command.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// One item of a fan-out read failed.
    #[error("failed to read monitor {name}: {source}")]
    PartialFailure {
        name: String,
        #[source]
        source: Box<StoreError>,
    },

    /// A stored record has a field that cannot be decoded.
    #[error("monitor {name} is corrupt: field `{field}` is missing or malformed")]
    Corrupt { name: String, field: &'static str },
}

impl StoreError {
    /// True for `NotFound`, including one wrapped in a `PartialFailure`.
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound(_) => true,
            StoreError::PartialFailure { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Errors returned by [`MonitorWriter`](crate::MonitorWriter).
#[derive(Debug, Error)]
pub enum WriterError {
    /// Writing a line to the store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Reading input or writing pass-through output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A previous store failure left this writer unusable.
    #[error("writer for monitor {0} failed earlier and cannot be reused")]
    Poisoned(String),
}
