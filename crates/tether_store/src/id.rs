//! Entity identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an entity row.
///
/// Identifiers are assigned by the store on insert, start at 1, and are
/// never reused within a store. The zero value is reserved as the
/// "unsaved" sentinel carried by transient entities that have never been
/// inserted anywhere.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct EntityId(pub u64);

impl EntityId {
    /// The sentinel carried by entities that were never inserted.
    pub const UNSAVED: Self = Self(0);

    /// Creates an entity ID from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is the unsaved sentinel.
    #[must_use]
    pub const fn is_unsaved(self) -> bool {
        self.0 == 0
    }

    /// Returns the next identifier in sequence.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<EntityId> for u64 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}
