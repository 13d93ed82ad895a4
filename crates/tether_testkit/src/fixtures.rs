//! Test fixtures and store helpers.
//!
//! Provides a sample entity and convenience constructors for setting up
//! test stores and session factories.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tether_session::{Entity, EntityId, SessionFactory};
use tether_store::{FileStore, MemoryStore, Store};

/// The sample entity used throughout the test suites: an identifier and
/// a name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Store-assigned identifier; the unsaved sentinel until inserted.
    pub id: EntityId,
    /// The single mutable field.
    pub name: String,
}

impl User {
    /// Creates a transient user with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::UNSAVED,
            name: name.into(),
        }
    }

    /// Creates a user claiming an already-assigned identifier, as a
    /// detached instance would.
    #[must_use]
    pub fn with_id(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
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

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The shared store handle.
    pub store: Arc<dyn Store>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory test store.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            _temp_dir: None,
        }
    }

    /// Creates a new file-backed test store in a temporary directory.
    #[must_use]
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("users.tether");
        let store = FileStore::open(&path).expect("Failed to open file store");

        Self {
            store: Arc::new(store),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Opens a session factory over this store.
    #[must_use]
    pub fn factory(&self) -> SessionFactory<User> {
        SessionFactory::new(Arc::clone(&self.store))
    }

    /// Returns the snapshot path if file-backed, `None` if in-memory.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir
            .as_ref()
            .map(|d| d.path().join("users.tether"))
    }
}

/// Runs a test with a factory over a temporary in-memory store.
///
/// # Example
///
/// ```rust,ignore
/// use tether_testkit::with_memory_factory;
///
/// #[test]
/// fn my_test() {
///     with_memory_factory(|factory| {
///         let mut session = factory.open_session();
///         // ... test operations
///     });
/// }
/// ```
pub fn with_memory_factory<F, R>(f: F) -> R
where
    F: FnOnce(&SessionFactory<User>) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.factory())
}

/// Runs a test with a factory over a temporary file-backed store.
pub fn with_file_factory<F, R>(f: F) -> R
where
    F: FnOnce(&SessionFactory<User>, &std::path::Path) -> R,
{
    let test_store = TestStore::file();
    let path = test_store.path().expect("File store should have a path");
    f(&test_store.factory(), &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use tether_session::handle;

    /// Creates a store pre-populated with named users.
    ///
    /// Returns the store and the assigned identifiers in insertion
    /// order.
    pub fn populated_store(user_count: usize) -> (TestStore, Vec<EntityId>) {
        let test_store = TestStore::memory();
        let factory = test_store.factory();

        let mut session = factory.open_session();
        let mut ids = Vec::with_capacity(user_count);
        for i in 0..user_count {
            let user = handle(User::new(format!("user-{i}")));
            ids.push(session.save(&user).expect("Failed to save user"));
        }

        (test_store, ids)
    }
}
