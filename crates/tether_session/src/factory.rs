//! Session factory.

use crate::entity::Entity;
use crate::session::Session;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tether_store::Store;

/// Opens sessions over one shared store.
///
/// The factory is the long-lived object; sessions are cheap and
/// short-lived. All sessions it opens share the same backing store, so a
/// row saved through one can be loaded through the next. Sessions never
/// share identity maps: an entity persistent in one session is detached
/// in every other.
///
/// Sessions use the manual flush policy: nothing is written at session
/// end unless [`Session::flush`] was called.
///
/// # Example
///
/// ```rust,ignore
/// let factory: SessionFactory<User> = SessionFactory::new(Arc::new(MemoryStore::new()));
///
/// let mut session = factory.open_session();
/// session.save(&user)?;
/// session.flush()?;
/// ```
pub struct SessionFactory<T: Entity> {
    store: Arc<dyn Store>,
    _marker: PhantomData<T>,
}

impl<T: Entity> SessionFactory<T> {
    /// Creates a factory over the given store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    /// Opens a new session with an empty identity map.
    #[must_use]
    pub fn open_session(&self) -> Session<T> {
        Session::new(Arc::clone(&self.store))
    }

    /// Returns a handle to the shared backing store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }
}

impl<T: Entity> Clone for SessionFactory<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _marker: PhantomData,
        }
    }
}

impl<T: Entity> fmt::Debug for SessionFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionFactory").finish_non_exhaustive()
    }
}
