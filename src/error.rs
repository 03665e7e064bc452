use thiserror::Error;

/// Error type for `filedict`.
#[derive(Error, Debug)]
pub enum FileDictError {
    /// I/O error.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization or deserialization error.
    #[error("{0}")]
    Serde(#[from] serde_json::Error),
    /// Read or delete of a key that is not present.
    #[error("key not found")]
    KeyNotFound,
    /// A line believed to hold a live record did not decode as one.
    #[error("corrupt record at offset {offset}: {reason}")]
    CorruptRecord {
        /// Byte offset of the offending line.
        offset: u64,
        /// Human-readable reason the line failed to decode.
        reason: String,
    },
    /// The operation is not supported by this type.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
    /// A key or value exceeded the format's size limit.
    #[error("size limit exceeded: {0}")]
    SizeLimitExceeded(&'static str),
}

/// Custom result type for `FileDictError`.
pub type Result<T> = std::result::Result<T, FileDictError>;
