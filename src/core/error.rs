//! Error types and error handling for the quarry index layer.
//!
//! Every fallible operation in the crate returns [`Result`]. Errors are
//! plain values: no operation retries internally, so the variant tells the
//! caller whether a retry makes sense.

use thiserror::Error;

/// Result type alias for quarry operations
pub type Result<T> = std::result::Result<T, QuarryError>;

/// Main error type for the index layer
#[derive(Error, Debug)]
pub enum QuarryError {
    #[error("Invalid index name: {0}")]
    InvalidIndexName(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index is closed: {0}")]
    IndexClosed(String),

    #[error("Invalid storage type: {0}")]
    InvalidStorageType(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid document field '{field}': {message}")]
    InvalidDocumentField { field: String, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Persistence error: index: {index}, error: {message}")]
    PersistenceError { index: String, message: String },

    #[error("Metadata error: {0}")]
    MetadataError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("WAL error: {0}")]
    WalError(String),

    #[error("Shard error: index: {index}, shard: {shard}, error: {message}")]
    ShardError {
        index: String,
        shard: u64,
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl QuarryError {
    /// Get user-friendly error message
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Check if this is a "not found" type error
    pub fn is_not_found(&self) -> bool {
        matches!(self, QuarryError::IndexNotFound(_))
    }

    /// Check if this is a bad request error (invalid input)
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            QuarryError::InvalidIndexName(_)
                | QuarryError::InvalidStorageType(_)
                | QuarryError::InvalidDocument(_)
                | QuarryError::InvalidDocumentField { .. }
                | QuarryError::ConfigError(_)
        )
    }

    /// Check if the failure happened while writing the index definition
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            QuarryError::PersistenceError { .. } | QuarryError::MetadataError(_)
        )
    }
}
