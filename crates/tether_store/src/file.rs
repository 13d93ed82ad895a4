//! File-backed store for persistent tables.

use crate::error::{StoreError, StoreResult};
use crate::id::EntityId;
use crate::store::Store;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Configuration for opening a file store.
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Whether to create the store file if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to fsync the snapshot after every write (safer but slower).
    pub sync_on_write: bool,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: true,
        }
    }
}

impl FileStoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store file if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fsync the snapshot after every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }
}

/// On-disk form of the table: identifier sequence plus rows.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    last_id: EntityId,
    rows: BTreeMap<EntityId, Vec<u8>>,
}

/// A file-backed store.
///
/// The whole table (identifier sequence and rows) is held in memory and
/// written back to a single CBOR snapshot file on every mutation. Data
/// survives process restarts. Suited to the small tables a session-scoped
/// unit of work operates on; it makes no attempt at incremental writes.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads. Internal
/// locking keeps the in-memory table and the snapshot file consistent.
///
/// # Example
///
/// ```no_run
/// use tether_store::{FileStore, Store};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("users.tether")).unwrap();
/// let id = store.insert(b"row".to_vec()).unwrap();
/// assert_eq!(store.load(id).unwrap(), b"row");
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    config: FileStoreConfig,
    inner: RwLock<Snapshot>,
}

impl FileStore {
    /// Opens or creates a file store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_config(path, FileStoreConfig::default())
    }

    /// Opens or creates a file store with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file does not exist and `create_if_missing` is false
    /// - The file cannot be read or decoded
    pub fn open_with_config(path: &Path, config: FileStoreConfig) -> StoreResult<Self> {
        let snapshot = if path.exists() {
            Self::read_snapshot(path)?
        } else {
            if !config.create_if_missing {
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!(
                        "store file {} does not exist and create_if_missing is false",
                        path.display()
                    ),
                )));
            }
            Snapshot::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            config,
            inner: RwLock::new(snapshot),
        })
    }

    /// Returns the path to the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_snapshot(path: &Path) -> StoreResult<Snapshot> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Ok(Snapshot::default());
        }
        ciborium::de::from_reader(file)
            .map_err(|e| StoreError::corrupted(format!("{}: {e}", path.display())))
    }

    /// Writes the current table back to the snapshot file.
    fn persist(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(snapshot, &mut buf)
            .map_err(|e| StoreError::codec(e.to_string()))?;

        let mut file = File::create(&self.path)?;
        file.write_all(&buf)?;
        file.flush()?;
        if self.config.sync_on_write {
            file.sync_all()?;
        }
        Ok(())
    }
}

impl Store for FileStore {
    fn insert(&self, payload: Vec<u8>) -> StoreResult<EntityId> {
        let mut inner = self.inner.write();
        let id = inner.last_id.next();
        inner.last_id = id;
        inner.rows.insert(id, payload);
        self.persist(&inner)?;
        Ok(id)
    }

    fn update(&self, id: EntityId, payload: Vec<u8>) -> StoreResult<u64> {
        let mut inner = self.inner.write();
        match inner.rows.get_mut(&id) {
            Some(row) => {
                *row = payload;
                self.persist(&inner)?;
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
