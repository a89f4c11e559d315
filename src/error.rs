//! Error types for the uploader

use thiserror::Error;

use crate::delivery::DeliveryError;

/// Result type for upload operations
pub type Result<T> = std::result::Result<T, UploadError>;

/// Errors that abort a whole upload batch
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid ignore pattern {pattern:?}: {source}")]
    InvalidIgnorePattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Failed to upload {path}: {source}")]
    Delivery {
        path: String,
        #[source]
        source: DeliveryError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scan worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
