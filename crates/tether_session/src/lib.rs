//! # Tether Session
//!
//! Session-scoped unit-of-work and identity-map core for tether.
//!
//! A [`Session`] is a short-lived, single-threaded unit of work over one
//! [`Store`]. It tracks entity instances in an identity map (one tracked
//! handle per identifier), dirty-checks them against snapshots, and
//! implements the transient/persistent/detached state machine: `save`
//! re-attaches detached instances silently, `persist` refuses them,
//! `update` schedules a write whose row must exist by flush time, and
//! `merge` reconciles a second in-memory copy instead of conflicting.
//!
//! Entity state is always relative to a session: the same value can be
//! persistent in one session and detached in another. Nothing is written
//! at session end; flushing is explicit.
//!
//! ## Example
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//! use tether_session::{handle, Entity, EntityId, SessionFactory};
//! use tether_store::MemoryStore;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct User {
//!     id: EntityId,
//!     name: String,
//! }
//!
//! impl Entity for User {
//!     fn id(&self) -> EntityId {
//!         self.id
//!     }
//!
//!     fn set_id(&mut self, id: EntityId) {
//!         self.id = id;
//!     }
//! }
//!
//! let factory: SessionFactory<User> = SessionFactory::new(Arc::new(MemoryStore::new()));
//!
//! let user = handle(User {
//!     id: EntityId::UNSAVED,
//!     name: "Zhu".to_string(),
//! });
//!
//! let id = {
//!     let mut session = factory.open_session();
//!     session.save(&user).unwrap()
//! };
//!
//! // The session ended, so `user` is detached; a new session can pick
//! // it back up.
//! let mut session = factory.open_session();
//! user.borrow_mut().name = "Zhen".to_string();
//! session.update(&user).unwrap();
//! session.flush().unwrap();
//!
//! assert_eq!(session.load(id).unwrap().borrow().name, "Zhen");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
mod error;
mod factory;
mod session;

pub use entity::{handle, Entity, Handle};
pub use error::{SessionError, SessionResult};
pub use factory::SessionFactory;
pub use session::{EntityState, LockMode, Session};
pub use tether_store::{EntityId, Store};
