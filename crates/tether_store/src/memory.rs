//! In-memory store for testing.

use crate::error::{StoreError, StoreResult};
use crate::id::EntityId;
use crate::store::Store;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory store.
///
/// This store keeps all rows in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral tables that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use tether_store::{MemoryStore, Store};
///
/// let store = MemoryStore::new();
/// let id = store.insert(b"row".to_vec()).unwrap();
/// assert_eq!(id.as_u64(), 1);
/// assert_eq!(store.count().unwrap(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Table>,
}

#[derive(Debug, Default)]
struct Table {
    last_id: EntityId,
    rows: BTreeMap<EntityId, Vec<u8>>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes all rows and resets identifier assignment.
    ///
    /// Useful for test setup that reuses one store across cases.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.rows.clear();
        inner.last_id = EntityId::UNSAVED;
    }

    /// Returns `true` if the store has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().rows.is_empty()
    }
}

impl Store for MemoryStore {
    fn insert(&self, payload: Vec<u8>) -> StoreResult<EntityId> {
        let mut inner = self.inner.write();
        let id = inner.last_id.next();
        inner.last_id = id;
        inner.rows.insert(id, payload);
        Ok(id)
    }

    fn update(&self, id: EntityId, payload: Vec<u8>) -> StoreResult<u64> {
        let mut inner = self.inner.write();
        match inner.rows.get_mut(&id) {
            Some(row) => {
                *row = payload;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn load(&self, id: EntityId) -> StoreResult<Vec<u8>> {
        self.inner
            .read()
            .rows
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { id })
    }

    fn scan(&self) -> StoreResult<Vec<(EntityId, Vec<u8>)>> {
        Ok(self
            .inner
            .read()
            .rows
            .iter()
            .map(|(id, payload)| (*id, payload.clone()))
            .collect())
    }
}
