//! Error types for session operations.

use tether_store::{EntityId, StoreError};
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur in session operations.
///
/// Each state-machine violation has its own kind; all are raised
/// synchronously at the violating call, except stale row counts, which
/// surface at flush because that is where deferred updates are written.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Store collaborator error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Entity payload could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),

    /// Entity payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] ciborium::de::Error<std::io::Error>),

    /// A write affected a row count different from expected. The entity
    /// was believed to exist in the store but does not.
    #[error("stale state: update for entity {entity_id} affected {actual} rows, expected {expected}")]
    StaleState {
        /// The entity whose write misfired.
        entity_id: EntityId,
        /// The row count the session expected.
        expected: u64,
        /// The row count the store reported.
        actual: u64,
    },

    /// Persist was called on an entity bearing an identifier that this
    /// session does not track.
    #[error("detached entity passed to persist: {entity_id}")]
    DetachedEntity {
        /// The detached entity's identifier.
        entity_id: EntityId,
    },

    /// A second distinct in-memory instance was offered for an identifier
    /// this session already tracks.
    #[error("a different instance with identifier {entity_id} is already tracked in this session")]
    NonUniqueObject {
        /// The contested identifier.
        entity_id: EntityId,
    },

    /// Lock was called on an entity that was never assigned an identifier.
    #[error("cannot lock an unsaved transient instance")]
    TransientObject,

    /// No entity exists for the requested identifier.
    #[error("entity not found: {entity_id}")]
    NotFound {
        /// The identifier that was looked up.
        entity_id: EntityId,
    },
}

impl SessionError {
    /// Creates a stale-state error.
    pub fn stale_state(entity_id: EntityId, expected: u64, actual: u64) -> Self {
        Self::StaleState {
            entity_id,
            expected,
            actual,
        }
    }

    /// Creates a detached-entity error.
    pub fn detached_entity(entity_id: EntityId) -> Self {
        Self::DetachedEntity { entity_id }
    }

    /// Creates a non-unique-object error.
    pub fn non_unique_object(entity_id: EntityId) -> Self {
        Self::NonUniqueObject { entity_id }
    }

    /// Creates a not-found error.
    pub fn not_found(entity_id: EntityId) -> Self {
        Self::NotFound { entity_id }
    }
}
