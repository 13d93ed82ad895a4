//! Entity trait and in-memory handles.

use crate::error::SessionResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use tether_store::EntityId;

/// Trait for types that can be tracked by a session.
///
/// Entity identity is the identifier, never the in-memory address: two
/// values with the same identifier denote the same stored row. A freshly
/// constructed entity carries [`EntityId::UNSAVED`] until a session
/// inserts it and stamps the store-assigned identifier back on.
///
/// Payloads are CBOR via serde. The identifier travels in the store key,
/// so `set_id` is invoked on every decode to stamp the key back onto the
/// value.
///
/// # Example
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use tether_session::{Entity, EntityId};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct User {
///     id: EntityId,
///     name: String,
/// }
///
/// impl Entity for User {
///     fn id(&self) -> EntityId {
///         self.id
///     }
///
///     fn set_id(&mut self, id: EntityId) {
///         self.id = id;
///     }
/// }
/// ```
pub trait Entity: Clone + Serialize + DeserializeOwned {
    /// Returns the entity's identifier, or [`EntityId::UNSAVED`] if the
    /// entity was never inserted.
    fn id(&self) -> EntityId;

    /// Stamps an identifier onto the entity.
    ///
    /// Called by the session after insert and after decode.
    fn set_id(&mut self, id: EntityId);
}

/// A shared handle to an in-memory entity value.
///
/// Sessions and callers hold the same handle, so field changes made by
/// either side are visible to both. Handles are single-threaded on
/// purpose: a session is one unit of work on one thread.
pub type Handle<T> = Rc<RefCell<T>>;

/// Wraps an entity value in a [`Handle`].
pub fn handle<T>(entity: T) -> Handle<T> {
    Rc::new(RefCell::new(entity))
}

/// Encodes an entity to CBOR payload bytes.
pub(crate) fn encode<T: Entity>(entity: &T) -> SessionResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(entity, &mut buf)?;
    Ok(buf)
}

/// Decodes an entity from CBOR payload bytes.
///
/// The `id` comes from the store key and is stamped onto the decoded
/// value, overriding whatever identifier the payload was encoded with.
pub(crate) fn decode<T: Entity>(id: EntityId, bytes: &[u8]) -> SessionResult<T> {
    let mut entity: T = ciborium::de::from_reader(bytes)?;
    entity.set_id(id);
    Ok(entity)
}
