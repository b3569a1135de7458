use std::path::{Path, PathBuf};

use table::INITIAL_CAPACITY;

/// Snapshot file name used when none is configured, relative to the working
/// directory.
pub const DEFAULT_SNAPSHOT_PATH: &str = "kvstore.snapshot";

/// Settings for a [`KvStore`](crate::KvStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Where [`save`](crate::KvStore::save) writes and
    /// [`load`](crate::KvStore::load) reads the snapshot.
    pub snapshot_path: PathBuf,

    /// Slot count of the table on creation. Rounded up to a power of two.
    pub initial_capacity: usize,

    /// If `true`, every save fsyncs the snapshot before it replaces the old one.
    pub sync_on_save: bool,
}

impl StoreConfig {
    pub fn with_snapshot_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.snapshot_path = path.as_ref().to_path_buf();
        self
    }

    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn with_sync_on_save(mut self, sync: bool) -> Self {
        self.sync_on_save = sync;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            initial_capacity: INITIAL_CAPACITY,
            sync_on_save: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behavior() {
        let c = StoreConfig::default();
        assert_eq!(c.snapshot_path, PathBuf::from("kvstore.snapshot"));
        assert_eq!(c.initial_capacity, 32);
        assert!(!c.sync_on_save);
    }

    #[test]
    fn builders_override_fields() {
        let c = StoreConfig::default()
            .with_snapshot_path("/tmp/other.snapshot")
            .with_initial_capacity(128)
            .with_sync_on_save(true);
        assert_eq!(c.snapshot_path, PathBuf::from("/tmp/other.snapshot"));
        assert_eq!(c.initial_capacity, 128);
        assert!(c.sync_on_save);
    }
}
