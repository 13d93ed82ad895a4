//! Lifecycle harness for cross-crate integration testing.
//!
//! Drives the public session API through full unit-of-work rounds and
//! cross-checks the store against a shadow map. Each round opens a fresh
//! session, so every re-attachment path (update, merge, lock) is
//! exercised against genuinely detached instances.

use crate::fixtures::User;
use std::collections::HashMap;
use std::sync::Arc;
use tether_session::{handle, Handle, LockMode, SessionFactory};
use tether_store::{EntityId, Store};

/// A test harness replaying session lifecycles against a store.
pub struct LifecycleHarness {
    factory: SessionFactory<User>,
    /// Expected store contents for verification.
    expected: HashMap<EntityId, String>,
}

impl LifecycleHarness {
    /// Creates a harness over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            factory: SessionFactory::new(store),
            expected: HashMap::new(),
        }
    }

    /// Saves a new user in its own session and returns the now-detached
    /// handle.
    pub fn create(&mut self, name: &str) -> Handle<User> {
        let user = handle(User::new(name));
        let mut session = self.factory.open_session();
        let id = session.save(&user).expect("Failed to save user");
        session.flush().expect("Failed to flush after save");

        self.expected.insert(id, name.to_string());
        user
    }

    /// Renames a detached user through update + flush in a fresh
    /// session.
    pub fn rename_via_update(&mut self, user: &Handle<User>, name: &str) {
        let mut session = self.factory.open_session();
        user.borrow_mut().name = name.to_string();
        session.update(user).expect("Failed to update user");
        session.flush().expect("Failed to flush update");

        self.expected.insert(user.borrow().id, name.to_string());
    }

    /// Renames through merge in a fresh session, offering a second
    /// in-memory copy of the row.
    pub fn rename_via_merge(&mut self, id: EntityId, name: &str) -> Handle<User> {
        let copy = handle(User::with_id(id, name));
        let mut session = self.factory.open_session();
        let merged = session.merge(&copy).expect("Failed to merge user");
        session.flush().expect("Failed to flush merge");

        self.expected.insert(id, name.to_string());
        merged
    }

    /// Re-attaches via lock in a fresh session, then renames and
    /// flushes.
    pub fn rename_via_lock(&mut self, user: &Handle<User>, name: &str) {
        let mut session = self.factory.open_session();
        session
            .lock(user, LockMode::None)
            .expect("Failed to lock user");
        user.borrow_mut().name = name.to_string();
        session.flush().expect("Failed to flush after lock");

        self.expected.insert(user.borrow().id, name.to_string());
    }

    /// Verifies every expected row through a fresh session.
    pub fn verify_all(&self) {
        let mut session = self.factory.open_session();
        for (id, expected_name) in &self.expected {
            let loaded = session.load(*id).expect("Failed to load user");
            assert_eq!(
                &loaded.borrow().name,
                expected_name,
                "Name mismatch for {id}"
            );
        }
    }

    /// Returns the count of expected rows.
    #[must_use]
    pub fn expected_count(&self) -> usize {
        self.expected.len()
    }

    /// Replays one full lifecycle: save, then rename through each
    /// re-attachment path, verifying after every round.
    pub fn run_full_lifecycle(&mut self) {
        let user = self.create("Zhu");
        self.verify_all();

        self.rename_via_update(&user, "Zhen");
        self.verify_all();

        let id = user.borrow().id;
        self.rename_via_merge(id, "Guang");
        self.verify_all();

        // The merge round wrote through its own instance; this handle is
        // stale now, so refresh it before locking.
        user.borrow_mut().name = "Guang".to_string();
        self.rename_via_lock(&user, "Hui");
        self.verify_all();
    }
}
