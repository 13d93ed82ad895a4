//! Per-entry tracking state.

use crate::entity::Handle;

/// Lifecycle state of an entity instance, relative to one session.
///
/// State is never stored on the entity itself: the same value can be
/// persistent in one session and detached in another. Sessions derive it
/// from the identifier and their own identity map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Never inserted anywhere; identifier is the unsaved sentinel.
    Transient,
    /// Tracked by this session; writes flow back to the store at flush.
    Persistent,
    /// Identifier assigned, but this instance is not tracked here.
    Detached,
}

/// Lock mode requested when associating an instance via lock.
///
/// The session records the mode; row-level enforcement is the store's
/// concern and none of the bundled stores implement one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Reattach only; no storage-level lock requested.
    None,
    /// Shared read lock.
    Read,
    /// Exclusive upgrade lock.
    Upgrade,
}

/// Write-back plan for a tracked entity at the next flush.
#[derive(Debug, Clone)]
pub(crate) enum WriteState {
    /// The entity matched this snapshot when it was associated; write
    /// only if the current encoding drifts from it.
    Clean {
        /// Encoded payload at association time.
        snapshot: Vec<u8>,
    },
    /// An update is already scheduled, regardless of current field
    /// values. Used for detached re-association, where the row's
    /// existence is only proven by the flush-time row count.
    Scheduled,
}

impl WriteState {
    /// Whether the entry must be written given its current encoding.
    pub(crate) fn needs_write(&self, current: &[u8]) -> bool {
        match self {
            Self::Clean { snapshot } => snapshot != current,
            Self::Scheduled => true,
        }
    }
}

/// A tracked entity: the shared handle plus its write-back plan.
#[derive(Debug)]
pub(crate) struct TrackedEntry<T> {
    /// Handle to the in-memory value.
    pub handle: Handle<T>,
    /// Write-back plan for the next flush.
    pub write_state: WriteState,
}
