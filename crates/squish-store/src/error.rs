//! Error types for squish storage.

use squish_core::Window;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// A usage window is at capacity; the increment was not applied.
    #[error("{window} limit reached")]
    QuotaExceeded {
        /// The first exhausted window.
        window: Window,
    },
}
