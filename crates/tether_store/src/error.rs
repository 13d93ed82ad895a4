//! Error types for store operations.

use crate::id::EntityId;
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No row exists for the requested identifier.
    #[error("no row for entity {id}")]
    NotFound {
        /// The identifier that was looked up.
        id: EntityId,
    },

    /// The snapshot file could not be encoded or decoded.
    #[error("snapshot codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// The store file is corrupted.
    #[error("store corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },
}

impl StoreError {
    /// Creates a not-found error.
    pub fn not_found(id: EntityId) -> Self {
        Self::NotFound { id }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }
}
