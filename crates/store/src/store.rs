//! Key-value store that ties together the hash table and the snapshot codec.

use std::path::Path;

use snapshot::{LoadStats, SaveStats, SnapshotReader, SnapshotWriter};
use table::HashTable;
use tracing::error;

use crate::config::StoreConfig;
use crate::error::KvError;

/// An in-memory key-value store with explicit snapshot persistence.
///
/// # Write Path
///
/// `set` and `delete` go straight to the [`HashTable`]; nothing touches disk
/// until [`save`](KvStore::save) is called.
///
/// # Persistence
///
/// [`save`](KvStore::save) writes every live entry to the configured snapshot
/// path, replacing the previous snapshot. [`load`](KvStore::load) replays a
/// snapshot into the table; a missing snapshot file is not an error.
///
/// The store is single-threaded: every mutation takes `&mut self`. Callers
/// that need shared access wrap the whole store in a lock.
#[derive(Debug)]
pub struct KvStore {
    table: HashTable,
    config: StoreConfig,
}

impl KvStore {
    /// Creates an empty store. Does not read the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::Table`] with `OutOfMemory` if the slot array cannot
    /// be allocated.
    pub fn new(config: StoreConfig) -> Result<Self, KvError> {
        let table = HashTable::with_capacity(config.initial_capacity)?;
        Ok(Self { table, config })
    }

    /// Creates a store and loads the configured snapshot into it, if one
    /// exists.
    pub fn open(config: StoreConfig) -> Result<Self, KvError> {
        let mut store = Self::new(config)?;
        store.load()?;
        Ok(store)
    }

    /// Inserts or replaces the value for `key` (the `SET` operation).
    pub fn set(&mut self, key: &str, value: &[u8]) -> Result<(), KvError> {
        self.table.set(key, value)?;
        Ok(())
    }

    /// Looks up `key`, returning a borrowed view of its value.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.table.get(key)
    }

    /// Removes `key` (the `DEL` operation).
    ///
    /// # Errors
    ///
    /// Returns `TableError::KeyNotFound` if the key is absent.
    pub fn delete(&mut self, key: &str) -> Result<(), KvError> {
        self.table.delete(key)?;
        Ok(())
    }

    /// Saves all entries to the configured snapshot path.
    pub fn save(&self) -> Result<SaveStats, KvError> {
        self.save_to(&self.config.snapshot_path)
    }

    /// Saves all entries to `path`.
    ///
    /// Failures are logged and returned; the in-memory table is unaffected
    /// either way.
    pub fn save_to(&self, path: &Path) -> Result<SaveStats, KvError> {
        SnapshotWriter::save(path, &self.table, self.config.sync_on_save).map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to save snapshot");
            KvError::from(e)
        })
    }

    /// Loads the configured snapshot into the table.
    pub fn load(&mut self) -> Result<LoadStats, KvError> {
        Ok(SnapshotReader::load(&self.config.snapshot_path, &mut self.table)?)
    }

    /// Loads the snapshot at `path` into the table.
    ///
    /// Records are applied as `set` calls on top of the current contents.
    /// Loading stops silently at the first incomplete record.
    pub fn load_from(&mut self, path: &Path) -> Result<LoadStats, KvError> {
        Ok(SnapshotReader::load(path, &mut self.table)?)
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the current slot count of the underlying table.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Read-only access to the underlying table, e.g. for iteration.
    pub fn table(&self) -> &HashTable {
        &self.table
    }
}
