//! # kvstore
//!
//! An in-process key-value store: a [`table::HashTable`] of text keys and
//! byte values that can be saved to and restored from a binary snapshot file.
//!
//! ```rust,no_run
//! use kvstore::{KvStore, StoreConfig};
//!
//! let mut store = KvStore::open(StoreConfig::default().with_snapshot_path("data.snapshot"))?;
//! store.set("name", b"Francis")?;
//! assert_eq!(store.get("name"), Some(b"Francis".as_slice()));
//! store.save()?;
//! # Ok::<(), kvstore::KvError>(())
//! ```

mod config;
mod error;
mod store;

pub use config::{StoreConfig, DEFAULT_SNAPSHOT_PATH};
pub use error::{KvError, Status};
pub use store::KvStore;

pub use snapshot::{LoadStats, SaveStats};
pub use table::{HashTable, TableError, INITIAL_CAPACITY};
