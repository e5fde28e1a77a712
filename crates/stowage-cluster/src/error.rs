//! Error types for the stowage-cluster crate

use thiserror::Error;

/// Result type alias using `StorageError`
pub type Result<T> = std::result::Result<T, StorageError>;

/// Coarse classification callers branch on instead of matching every variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The addressed object does not exist
    NotFound,
    /// The request itself was unacceptable (bad master, bad range, bad config)
    InvalidInput,
    /// The cluster could not be reached or the byte transfer broke
    TransportFailure,
}

/// Errors that can occur while talking to the storage cluster
#[derive(Error, Debug)]
pub enum StorageError {
    /// No connection to the cluster could be established
    #[error("storage cluster unavailable: {0}")]
    StorageUnavailable(String),

    /// The cluster answered an upload with a non-zero status code
    #[error("upload rejected by cluster (code {code}): {reason}")]
    UploadRejected { code: u8, reason: String },

    /// The master id of a slave upload is empty or unknown
    #[error("invalid master file id: {0:?}")]
    InvalidMaster(String),

    /// Negative offset, non-positive length, or an offset past the object end
    #[error("invalid range: offset {offset}, length {length}")]
    InvalidRange { offset: i64, length: i64 },

    /// The file id does not resolve to a stored object
    #[error("file not found: {0}")]
    NotFound(String),

    /// An I/O error interrupted a byte transfer
    #[error("transfer failed: {0}")]
    TransferFailed(#[source] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidMaster(_) | Self::InvalidRange { .. } | Self::Configuration(_) => {
                ErrorKind::InvalidInput
            }
            Self::StorageUnavailable(_) | Self::UploadRejected { .. } | Self::TransferFailed(_) => {
                ErrorKind::TransportFailure
            }
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<config::ConfigError> for StorageError {
    fn from(err: config::ConfigError) -> Self {
        StorageError::Configuration(err.to_string())
    }
}
