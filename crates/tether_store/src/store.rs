//! Store trait definition.

use crate::error::StoreResult;
use crate::id::EntityId;

/// A durable backing table for entity payloads.
///
/// Stores are **opaque payload tables** keyed by identifier. They provide
/// the four operations a session needs and nothing more; all entity
/// semantics live in the layer above.
///
/// # Invariants
///
/// - `insert` assigns a fresh identifier (never zero, never reused) and
///   returns it
/// - `update` reports the number of affected rows; a missing row is
///   `Ok(0)`, not an error, so the caller can decide what a miss means
/// - `load` returns exactly the bytes most recently inserted or updated
///   for that identifier
/// - `scan` returns rows in ascending identifier order
/// - Stores must be `Send + Sync`; many sessions may share one store
///
/// # Implementors
///
/// - [`super::MemoryStore`] - For tests and ephemeral tables
/// - [`super::FileStore`] - For persistent tables
pub trait Store: Send + Sync {
    /// Inserts a new row and returns its assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be persisted.
    fn insert(&self, payload: Vec<u8>) -> StoreResult<EntityId>;

    /// Overwrites the row with the given identifier.
    ///
    /// Returns the number of rows affected: 1 when the row existed,
    /// 0 when it did not. A zero count is how callers detect rows that
    /// were never inserted or have since disappeared.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. A missing row is not an
    /// error at this layer.
    fn update(&self, id: EntityId, payload: Vec<u8>) -> StoreResult<u64>;

    /// Loads the row with the given identifier.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::NotFound`] if no such row exists.
    fn load(&self, id: EntityId) -> StoreResult<Vec<u8>>;

    /// Returns all rows in ascending identifier order.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    fn scan(&self) -> StoreResult<Vec<(EntityId, Vec<u8>)>>;

    /// Returns the number of rows in the table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    fn count(&self) -> StoreResult<usize> {
        Ok(self.scan()?.len())
    }
}
