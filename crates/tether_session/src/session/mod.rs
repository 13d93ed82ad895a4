//! Session: a single-threaded unit of work over one store.

mod identity_map;
mod state;

pub use state::{EntityState, LockMode};

use crate::entity::{decode, encode, handle, Entity, Handle};
use crate::error::{SessionError, SessionResult};
use identity_map::{AssociateOutcome, IdentityMap};
use state::WriteState;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tether_store::{EntityId, Store, StoreError};
use tracing::{debug, trace};

/// A short-lived, single-threaded unit of work wrapping one [`Store`].
///
/// The session maintains an identity map of identifier → tracked handle
/// and implements the transient/persistent/detached state machine:
///
/// - [`save`](Self::save) inserts transient entities immediately and
///   silently re-attaches detached ones (write deferred to flush)
/// - [`persist`](Self::persist) refuses detached instances
/// - [`update`](Self::update) re-attaches and schedules an update whose
///   row must exist by flush time
/// - [`merge`](Self::merge) reconciles a second in-memory copy into the
///   tracked instance instead of conflicting
/// - [`lock`](Self::lock) re-attaches trusting in-memory fields as
///   current
/// - [`flush`](Self::flush) writes dirty entries back and turns a
///   zero-row update into a stale-state error
///
/// Dropping the session discards the identity map without flushing
/// (manual flush policy); handles the caller still holds become
/// detached.
///
/// # Example
///
/// ```rust,ignore
/// let factory: SessionFactory<User> = SessionFactory::new(store);
///
/// let user = handle(User::new("Zhu"));
/// let id = {
///     let mut session = factory.open_session();
///     session.save(&user)?
/// };
/// // `user` is now detached; a later session can re-attach it.
/// ```
pub struct Session<T: Entity> {
    /// Backing store shared with other sessions.
    store: Arc<dyn Store>,
    /// Identifier → tracked handle, scoped to this session's lifetime.
    map: IdentityMap<T>,
}

impl<T: Entity> Session<T> {
    /// Creates a session over the given store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            map: IdentityMap::new(),
        }
    }

    /// Saves an entity, assigning an identifier if it has none.
    ///
    /// Transient entities are inserted into the store immediately and the
    /// assigned identifier is stamped onto the value. An entity already
    /// tracked by this session is left as-is. A detached entity is
    /// re-associated without touching the store; the deferred update must
    /// affect exactly one row at flush or flush fails with
    /// [`SessionError::StaleState`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NonUniqueObject`] if a distinct instance
    /// with the same identifier is already tracked here.
    pub fn save(&mut self, entity: &Handle<T>) -> SessionResult<EntityId> {
        let id = entity.borrow().id();
        if id.is_unsaved() {
            return self.insert_transient(entity);
        }

        if self.map.associate(id, entity, WriteState::Scheduled)? == AssociateOutcome::Inserted {
            debug!(entity_id = %id, "re-attached detached entity; update deferred to flush");
        }
        Ok(id)
    }

    /// Makes a transient entity persistent.
    ///
    /// Behaves like [`save`](Self::save) for transient entities and for
    /// entities already tracked by this session. Unlike save, it refuses
    /// to re-attach detached instances.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DetachedEntity`] if the entity carries an
    /// identifier this session does not track it under.
    pub fn persist(&mut self, entity: &Handle<T>) -> SessionResult<()> {
        let id = entity.borrow().id();
        if id.is_unsaved() {
            self.insert_transient(entity)?;
            return Ok(());
        }

        if self.is_tracked_instance(id, entity) {
            return Ok(());
        }
        Err(SessionError::detached_entity(id))
    }

    /// Re-attaches an entity and schedules an update for it.
    ///
    /// The entity is associated under its current identifier (even the
    /// unsaved sentinel) and the row write happens at flush. A row that
    /// never existed in the store surfaces there as
    /// [`SessionError::StaleState`] (expected 1, actual 0).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NonUniqueObject`] if a distinct instance
    /// with the same identifier is already tracked here.
    pub fn update(&mut self, entity: &Handle<T>) -> SessionResult<()> {
        let id = entity.borrow().id();
        if self.map.associate(id, entity, WriteState::Scheduled)? == AssociateOutcome::Inserted {
            debug!(entity_id = %id, "scheduled update for re-attached entity");
        }
        Ok(())
    }

    /// Saves entities without an identifier, updates the rest.
    ///
    /// Delegates to [`save`](Self::save) when the entity has no
    /// identifier or is already tracked here, and to
    /// [`update`](Self::update) otherwise.
    ///
    /// # Errors
    ///
    /// Propagates the delegated operation's errors.
    pub fn save_or_update(&mut self, entity: &Handle<T>) -> SessionResult<()> {
        let id = entity.borrow().id();
        if id.is_unsaved() || self.is_tracked_instance(id, entity) {
            self.save(entity)?;
            Ok(())
        } else {
            self.update(entity)
        }
    }

    /// Re-attaches a previously saved entity without reading the store.
    ///
    /// The in-memory field values are trusted as current: a snapshot is
    /// taken at lock time, so flush writes only changes made afterwards.
    /// The mode is recorded; storage-level enforcement is delegated to
    /// the store.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TransientObject`] if the entity was never
    /// assigned an identifier, or [`SessionError::NonUniqueObject`] if a
    /// distinct instance with the same identifier is already tracked.
    pub fn lock(&mut self, entity: &Handle<T>, mode: LockMode) -> SessionResult<()> {
        let id = entity.borrow().id();
        if id.is_unsaved() {
            return Err(SessionError::TransientObject);
        }

        let snapshot = encode(&*entity.borrow())?;
        let outcome = self
            .map
            .associate(id, entity, WriteState::Clean { snapshot })?;
        if outcome == AssociateOutcome::Inserted {
            debug!(entity_id = %id, ?mode, "locked detached entity into session");
        }
        Ok(())
    }

    /// Returns the entity with the given identifier.
    ///
    /// The tracked handle is returned if the identifier is already in
    /// this session's identity map; otherwise the row is fetched from
    /// the store and tracked as clean.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] if no such row exists.
    pub fn load(&mut self, id: EntityId) -> SessionResult<Handle<T>> {
        if let Some(entry) = self.map.get(id) {
            return Ok(entry.handle.clone());
        }

        let payload = self.store.load(id).map_err(|e| match e {
            StoreError::NotFound { id } => SessionError::not_found(id),
            other => SessionError::Store(other),
        })?;
        let entity: T = decode(id, &payload)?;
        let snapshot = encode(&entity)?;
        let loaded = handle(entity);
        self.map.track(id, &loaded, WriteState::Clean { snapshot });
        trace!(entity_id = %id, "loaded entity from store");
        Ok(loaded)
    }

    /// Returns the entity with the given identifier, or `None` if no
    /// such row exists.
    ///
    /// # Errors
    ///
    /// Propagates store and codec failures; a missing row is `Ok(None)`.
    pub fn get(&mut self, id: EntityId) -> SessionResult<Option<Handle<T>>> {
        match self.load(id) {
            Ok(found) => Ok(Some(found)),
            Err(SessionError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Merges the argument's field values onto the persistent instance
    /// for its identifier, and returns that instance.
    ///
    /// The argument itself is never mutated or tracked. A transient
    /// argument is copied and the copy inserted. If the identifier is
    /// already tracked, fields are copied into the tracked instance;
    /// this is how a second in-memory copy is reconciled instead of
    /// raising the conflict [`update`](Self::update) would. If the
    /// identifier is not tracked, the persistent instance is produced by
    /// loading the row first.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] if the argument carries an
    /// identifier with no row in the store.
    pub fn merge(&mut self, entity: &Handle<T>) -> SessionResult<Handle<T>> {
        let id = entity.borrow().id();
        if id.is_unsaved() {
            let copy = handle(entity.borrow().clone());
            self.insert_transient(&copy)?;
            return Ok(copy);
        }

        let target = match self.map.get(id) {
            Some(entry) => entry.handle.clone(),
            None => self.load(id)?,
        };
        if !Rc::ptr_eq(&target, entity) {
            *target.borrow_mut() = entity.borrow().clone();
            trace!(entity_id = %id, "merged field values onto tracked instance");
        }
        Ok(target)
    }

    /// Writes all pending changes back to the store.
    ///
    /// Entries are visited in ascending identifier order. Clean entries
    /// whose current encoding matches their snapshot are skipped;
    /// everything else is written with a store update. A successful
    /// write becomes the entry's new clean snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::StaleState`] when an update affects a row
    /// count other than one: the entity was believed to exist in the
    /// store but does not.
    pub fn flush(&mut self) -> SessionResult<()> {
        let mut written = 0usize;
        for (id, entry) in self.map.iter_mut() {
            let current = encode(&*entry.handle.borrow())?;
            if !entry.write_state.needs_write(&current) {
                continue;
            }

            let rows = self.store.update(*id, current.clone())?;
            if rows != 1 {
                return Err(SessionError::stale_state(*id, 1, rows));
            }
            entry.write_state = WriteState::Clean { snapshot: current };
            written += 1;
        }
        debug!(written, tracked = self.map.len(), "flushed session");
        Ok(())
    }

    /// Returns all stored entities, in ascending identifier order.
    ///
    /// Rows already tracked resolve to their tracked handle (the
    /// identity map wins over the freshly decoded copy); untracked rows
    /// become tracked clean entries.
    ///
    /// # Errors
    ///
    /// Propagates store and codec failures.
    pub fn find_all(&mut self) -> SessionResult<Vec<Handle<T>>> {
        let rows = self.store.scan()?;
        let mut found = Vec::with_capacity(rows.len());
        for (id, payload) in rows {
            if let Some(entry) = self.map.get(id) {
                found.push(entry.handle.clone());
                continue;
            }
            let entity: T = decode(id, &payload)?;
            let snapshot = encode(&entity)?;
            let loaded = handle(entity);
            self.map.track(id, &loaded, WriteState::Clean { snapshot });
            found.push(loaded);
        }
        Ok(found)
    }

    /// Whether this exact instance is tracked by this session.
    #[must_use]
    pub fn contains(&self, entity: &Handle<T>) -> bool {
        let id = entity.borrow().id();
        self.is_tracked_instance(id, entity)
    }

    /// Lifecycle state of the instance, relative to this session.
    #[must_use]
    pub fn state_of(&self, entity: &Handle<T>) -> EntityState {
        let id = entity.borrow().id();
        if id.is_unsaved() {
            EntityState::Transient
        } else if self.is_tracked_instance(id, entity) {
            EntityState::Persistent
        } else {
            EntityState::Detached
        }
    }

    /// Removes the instance from the identity map, detaching it.
    ///
    /// Pending changes for it are abandoned. Returns `false` if the
    /// instance was not tracked here.
    pub fn evict(&mut self, entity: &Handle<T>) -> bool {
        let id = entity.borrow().id();
        if self.is_tracked_instance(id, entity) {
            self.map.remove(id);
            return true;
        }
        false
    }

    /// Detaches every tracked instance without flushing.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Number of instances tracked by this session.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.map.len()
    }

    /// Inserts a transient entity now and tracks it as clean.
    fn insert_transient(&mut self, entity: &Handle<T>) -> SessionResult<EntityId> {
        let payload = encode(&*entity.borrow())?;
        let id = self.store.insert(payload)?;
        entity.borrow_mut().set_id(id);

        // Snapshot after the identifier stamp, so only later field
        // changes count as dirty.
        let snapshot = encode(&*entity.borrow())?;
        self.map.track(id, entity, WriteState::Clean { snapshot });
        debug!(entity_id = %id, "inserted transient entity");
        Ok(id)
    }

    fn is_tracked_instance(&self, id: EntityId, entity: &Handle<T>) -> bool {
        self.map
            .get(id)
            .is_some_and(|entry| Rc::ptr_eq(&entry.handle, entity))
    }
}

impl<T: Entity> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("tracked", &self.map.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};
    use tether_store::MemoryStore;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        id: EntityId,
        name: String,
    }

    impl User {
        fn named(name: &str) -> Self {
            Self {
                id: EntityId::UNSAVED,
                name: name.to_string(),
            }
        }

        fn with_id(id: EntityId, name: &str) -> Self {
            Self {
                id,
                name: name.to_string(),
            }
        }
    }

    impl Entity for User {
        fn id(&self) -> EntityId {
            self.id
        }

        fn set_id(&mut self, id: EntityId) {
            self.id = id;
        }
    }

    fn memory_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new())
    }

    fn open_session(store: &Arc<MemoryStore>) -> Session<User> {
        let store: Arc<dyn Store> = store.clone();
        Session::new(store)
    }

    fn stored_name(store: &Arc<MemoryStore>, id: EntityId) -> String {
        let mut session = open_session(store);
        let user = session.load(id).unwrap();
        let name = user.borrow().name.clone();
        name
    }

    #[test]
    fn debug_reports_tracked_count() {
        let store = memory_store();
        let mut session = open_session(&store);
        session.save(&handle(User::named("Zhu"))).unwrap();

        let rendered = format!("{session:?}");
        assert!(rendered.contains("tracked: 1"));
    }

    #[test]
    fn save_transient_assigns_identifier() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let mut session = open_session(&store);
        let id = session.save(&user).unwrap();

        assert!(!id.is_unsaved());
        assert_eq!(user.borrow().id, id);
        assert_eq!(stored_name(&store, id), "Zhu");
    }

    #[test]
    fn save_inserts_immediately_independent_of_later_mutation() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let mut session = open_session(&store);
        let id = session.save(&user).unwrap();

        // Mutated in memory but never flushed.
        user.borrow_mut().name = "Zhen".to_string();
        drop(session);

        assert_eq!(stored_name(&store, id), "Zhu");
    }

    #[test]
    fn save_already_tracked_is_noop() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let mut session = open_session(&store);
        let id1 = session.save(&user).unwrap();
        let id2 = session.save(&user).unwrap();

        assert_eq!(id1, id2);
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(session.tracked_count(), 1);
    }

    #[test]
    fn save_reattaches_detached_without_immediate_write() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let id = {
            let mut session = open_session(&store);
            session.save(&user).unwrap()
        };

        user.borrow_mut().name = "Guang".to_string();
        let mut session = open_session(&store);
        session.save(&user).unwrap();

        // No write until flush.
        assert_eq!(stored_name(&store, id), "Zhu");

        session.flush().unwrap();
        assert_eq!(stored_name(&store, id), "Guang");
    }

    #[test]
    fn save_detached_with_missing_row_fails_at_flush() {
        let store = memory_store();
        let user = handle(User::with_id(EntityId::new(41), "Ghost"));

        let mut session = open_session(&store);
        session.save(&user).unwrap();

        let result = session.flush();
        assert!(matches!(
            result,
            Err(SessionError::StaleState {
                expected: 1,
                actual: 0,
                ..
            })
        ));
    }

    #[test]
    fn save_second_distinct_instance_conflicts() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let mut session = open_session(&store);
        let id = session.save(&user).unwrap();

        let twin = handle(User::with_id(id, "Zhu"));
        let result = session.save(&twin);
        assert!(matches!(result, Err(SessionError::NonUniqueObject { .. })));
    }

    #[test]
    fn persist_transient_assigns_identifier() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let mut session = open_session(&store);
        session.persist(&user).unwrap();

        assert!(!user.borrow().id.is_unsaved());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn persist_already_tracked_is_noop() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let mut session = open_session(&store);
        session.persist(&user).unwrap();
        session.persist(&user).unwrap();

        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn persist_detached_fails() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let id = {
            let mut session = open_session(&store);
            session.save(&user).unwrap()
        };

        let mut session = open_session(&store);
        let result = session.persist(&user);
        assert!(matches!(
            result,
            Err(SessionError::DetachedEntity { entity_id }) if entity_id == id
        ));
    }

    #[test]
    fn save_succeeds_where_persist_refuses() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        {
            let mut session = open_session(&store);
            session.save(&user).unwrap();
        }

        let mut session = open_session(&store);
        assert!(session.persist(&user).is_err());
        assert!(session.save(&user).is_ok());
    }

    #[test]
    fn update_detached_then_flush_writes() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let id = {
            let mut session = open_session(&store);
            session.save(&user).unwrap()
        };

        let mut session = open_session(&store);
        user.borrow_mut().name = "Zhen".to_string();
        session.update(&user).unwrap();
        session.flush().unwrap();

        assert_eq!(stored_name(&store, id), "Zhen");
    }

    #[test]
    fn update_unknown_row_succeeds_then_flush_reports_stale_state() {
        let store = memory_store();
        let user = handle(User::with_id(EntityId::new(99), "Nobody"));

        let mut session = open_session(&store);
        session.update(&user).unwrap();

        let result = session.flush();
        assert!(matches!(
            result,
            Err(SessionError::StaleState {
                entity_id,
                expected: 1,
                actual: 0,
            }) if entity_id == EntityId::new(99)
        ));
    }

    #[test]
    fn update_pristine_transient_fails_at_flush() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let mut session = open_session(&store);
        session.update(&user).unwrap();

        let result = session.flush();
        assert!(matches!(
            result,
            Err(SessionError::StaleState {
                expected: 1,
                actual: 0,
                ..
            })
        ));
    }

    #[test]
    fn update_second_distinct_instance_conflicts() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let id = {
            let mut session = open_session(&store);
            session.save(&user).unwrap()
        };

        let mut session = open_session(&store);
        session.update(&user).unwrap();

        let twin = handle(User::with_id(id, "Other"));
        let result = session.update(&twin);
        assert!(matches!(
            result,
            Err(SessionError::NonUniqueObject { entity_id }) if entity_id == id
        ));
    }

    #[test]
    fn update_becomes_clean_after_flush() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let id = {
            let mut session = open_session(&store);
            session.save(&user).unwrap()
        };

        let mut session = open_session(&store);
        session.update(&user).unwrap();
        session.flush().unwrap();

        // Mutate the row behind the session's back. An unchanged clean
        // entry must not be rewritten by the next flush.
        store
            .update(id, b"external".to_vec())
            .unwrap();
        session.flush().unwrap();
        assert_eq!(store.load(id).unwrap(), b"external");
    }

    #[test]
    fn save_or_update_saves_transient() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let mut session = open_session(&store);
        session.save_or_update(&user).unwrap();

        assert!(!user.borrow().id.is_unsaved());
    }

    #[test]
    fn save_or_update_updates_detached() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let id = {
            let mut session = open_session(&store);
            session.save_or_update(&user).unwrap();
            user.borrow().id
        };

        let mut session = open_session(&store);
        session.save_or_update(&user).unwrap();
        user.borrow_mut().name = "Zhen".to_string();
        session.flush().unwrap();

        assert_eq!(stored_name(&store, id), "Zhen");
    }

    #[test]
    fn lock_transient_fails() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let mut session = open_session(&store);
        let result = session.lock(&user, LockMode::None);
        assert!(matches!(result, Err(SessionError::TransientObject)));
    }

    #[test]
    fn lock_after_save_in_same_session_is_noop() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let mut session = open_session(&store);
        session.save(&user).unwrap();
        session.lock(&user, LockMode::None).unwrap();

        assert_eq!(session.tracked_count(), 1);
    }

    #[test]
    fn lock_trusts_in_memory_values_and_writes_only_later_changes() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let id = {
            let mut session = open_session(&store);
            session.save(&user).unwrap()
        };

        // The row drifts while the entity is detached.
        store.update(id, b"external".to_vec()).unwrap();

        let mut session = open_session(&store);
        session.lock(&user, LockMode::Read).unwrap();

        // Nothing changed since the lock: flush writes nothing and the
        // drifted row is left alone.
        session.flush().unwrap();
        assert_eq!(store.load(id).unwrap(), b"external");

        // A change made after the lock is written back.
        user.borrow_mut().name = "Zhen".to_string();
        session.flush().unwrap();
        assert_eq!(stored_name(&store, id), "Zhen");
    }

    #[test]
    fn load_missing_fails_not_found() {
        let store = memory_store();
        let mut session = open_session(&store);

        let result = session.load(EntityId::new(404));
        assert!(matches!(
            result,
            Err(SessionError::NotFound { entity_id }) if entity_id == EntityId::new(404)
        ));
    }

    #[test]
    fn get_missing_returns_none() {
        let store = memory_store();
        let mut session = open_session(&store);

        assert!(session.get(EntityId::new(404)).unwrap().is_none());
    }

    #[test]
    fn load_returns_the_tracked_instance() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let mut session = open_session(&store);
        let id = session.save(&user).unwrap();

        let loaded = session.load(id).unwrap();
        assert!(Rc::ptr_eq(&loaded, &user));

        let again = session.load(id).unwrap();
        assert!(Rc::ptr_eq(&again, &loaded));
    }

    #[test]
    fn loaded_mutation_is_written_at_flush() {
        let store = memory_store();
        let id = {
            let mut session = open_session(&store);
            session.save(&handle(User::named("Zhu"))).unwrap()
        };

        let mut session = open_session(&store);
        let user = session.load(id).unwrap();
        user.borrow_mut().name = "Zhen".to_string();
        session.flush().unwrap();

        assert_eq!(stored_name(&store, id), "Zhen");
    }

    #[test]
    fn merge_transient_inserts_a_copy_and_leaves_argument_untouched() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let mut session = open_session(&store);
        let merged = session.merge(&user).unwrap();

        assert!(user.borrow().id.is_unsaved());
        assert!(!merged.borrow().id.is_unsaved());
        assert!(!Rc::ptr_eq(&merged, &user));
        assert_eq!(merged.borrow().name, "Zhu");
        assert!(!session.contains(&user));
        assert!(session.contains(&merged));
    }

    #[test]
    fn merge_resolves_the_conflict_update_forbids() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let id = {
            let mut session = open_session(&store);
            session.save(&user).unwrap()
        };

        let mut session = open_session(&store);
        session.update(&user).unwrap();

        let twin = handle(User::with_id(id, "Zhen"));
        assert!(session.update(&twin).is_err());

        let merged = session.merge(&twin).unwrap();
        assert!(Rc::ptr_eq(&merged, &user));
        assert_eq!(user.borrow().name, "Zhen");

        session.flush().unwrap();
        assert_eq!(stored_name(&store, id), "Zhen");
    }

    #[test]
    fn merge_tracked_instance_is_idempotent() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let mut session = open_session(&store);
        session.save(&user).unwrap();

        let first = session.merge(&user).unwrap();
        let second = session.merge(&user).unwrap();

        assert!(Rc::ptr_eq(&first, &user));
        assert!(Rc::ptr_eq(&second, &user));
    }

    #[test]
    fn merge_untracked_loads_row_then_copies_fields() {
        let store = memory_store();
        let id = {
            let mut session = open_session(&store);
            session.save(&handle(User::named("Zhu"))).unwrap()
        };

        let detached = handle(User::with_id(id, "Zhen"));
        let mut session = open_session(&store);
        let merged = session.merge(&detached).unwrap();

        assert!(!Rc::ptr_eq(&merged, &detached));
        assert_eq!(merged.borrow().name, "Zhen");
        assert!(!session.contains(&detached));

        session.flush().unwrap();
        assert_eq!(stored_name(&store, id), "Zhen");
    }

    #[test]
    fn merge_missing_row_fails_not_found() {
        let store = memory_store();
        let ghost = handle(User::with_id(EntityId::new(13), "Ghost"));

        let mut session = open_session(&store);
        let result = session.merge(&ghost);
        assert!(matches!(result, Err(SessionError::NotFound { .. })));
    }

    #[test]
    fn flush_writes_entries_in_identifier_order() {
        let store = memory_store();
        let first = handle(User::named("A"));
        let second = handle(User::named("B"));

        let mut session = open_session(&store);
        let id1 = session.save(&first).unwrap();
        let id2 = session.save(&second).unwrap();
        assert!(id1 < id2);

        first.borrow_mut().name = "A2".to_string();
        second.borrow_mut().name = "B2".to_string();
        session.flush().unwrap();

        assert_eq!(stored_name(&store, id1), "A2");
        assert_eq!(stored_name(&store, id2), "B2");
    }

    #[test]
    fn dropping_session_detaches_without_flushing() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let id = {
            let mut session = open_session(&store);
            let id = session.save(&user).unwrap();
            user.borrow_mut().name = "Zhen".to_string();
            id
            // Dropped without flush.
        };

        assert_eq!(stored_name(&store, id), "Zhu");

        let session = open_session(&store);
        assert_eq!(session.state_of(&user), EntityState::Detached);
        assert_eq!(session.tracked_count(), 0);
    }

    #[test]
    fn state_of_follows_the_lifecycle() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let mut session = open_session(&store);
        assert_eq!(session.state_of(&user), EntityState::Transient);

        let id = session.save(&user).unwrap();
        assert_eq!(session.state_of(&user), EntityState::Persistent);

        let twin = handle(User::with_id(id, "Zhu"));
        assert_eq!(session.state_of(&twin), EntityState::Detached);
    }

    #[test]
    fn evict_detaches_and_abandons_pending_changes() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let mut session = open_session(&store);
        let id = session.save(&user).unwrap();

        user.borrow_mut().name = "Zhen".to_string();
        assert!(session.evict(&user));
        assert!(!session.contains(&user));
        assert!(!session.evict(&user));

        session.flush().unwrap();
        assert_eq!(stored_name(&store, id), "Zhu");
    }

    #[test]
    fn clear_detaches_everything() {
        let store = memory_store();
        let mut session = open_session(&store);

        session.save(&handle(User::named("A"))).unwrap();
        session.save(&handle(User::named("B"))).unwrap();
        assert_eq!(session.tracked_count(), 2);

        session.clear();
        assert_eq!(session.tracked_count(), 0);
    }

    #[test]
    fn find_all_prefers_tracked_instances() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        let mut session = open_session(&store);
        session.save(&user).unwrap();
        session.save(&handle(User::named("Other"))).unwrap();

        // In-memory change not yet flushed: the tracked handle wins over
        // the stored payload.
        user.borrow_mut().name = "Zhen".to_string();

        let all = session.find_all().unwrap();
        assert_eq!(all.len(), 2);
        assert!(Rc::ptr_eq(&all[0], &user));
        assert_eq!(all[0].borrow().name, "Zhen");
    }

    #[test]
    fn find_all_tracks_previously_unseen_rows() {
        let store = memory_store();
        {
            let mut session = open_session(&store);
            session.save(&handle(User::named("A"))).unwrap();
            session.save(&handle(User::named("B"))).unwrap();
        }

        let mut session = open_session(&store);
        let all = session.find_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(session.tracked_count(), 2);

        for found in &all {
            assert!(session.contains(found));
        }
    }

    #[test]
    fn rename_across_sessions_round_trip() {
        let store = memory_store();
        let user = handle(User::named("Zhu"));

        // Save and verify.
        let id = {
            let mut session = open_session(&store);
            let id = session.save(&user).unwrap();
            session.flush().unwrap();
            id
        };
        assert_eq!(stored_name(&store, id), "Zhu");

        // Rename in a new session via update + flush.
        {
            let mut session = open_session(&store);
            user.borrow_mut().name = "Zhen".to_string();
            session.update(&user).unwrap();
            session.flush().unwrap();
        }
        assert_eq!(stored_name(&store, id), "Zhen");
    }

    proptest! {
        #[test]
        fn saved_names_survive_a_new_session(names in prop::collection::vec("[a-zA-Z]{1,12}", 1..8)) {
            let store = memory_store();
            let mut session = open_session(&store);

            let mut ids = Vec::new();
            for name in &names {
                let user = handle(User::named(name));
                ids.push(session.save(&user).unwrap());
            }
            drop(session);

            let mut session = open_session(&store);
            for (id, name) in ids.iter().zip(&names) {
                let loaded = session.load(*id).unwrap();
                prop_assert_eq!(&loaded.borrow().name, name);
            }
        }

        #[test]
        fn identifiers_are_unique_per_store(count in 1usize..32) {
            let store = memory_store();
            let mut session = open_session(&store);

            let mut ids = Vec::new();
            for i in 0..count {
                let user = handle(User::named(&format!("user-{i}")));
                ids.push(session.save(&user).unwrap());
            }

            let mut deduped = ids.clone();
            deduped.sort();
            deduped.dedup();
            prop_assert_eq!(deduped.len(), ids.len());
        }
    }
}
