//! # Snapshot
//!
//! Full point-in-time export of a [`table::HashTable`] to a flat binary file,
//! and the reverse.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ key_len (u32) | key | value_len (u64) | value │
//! │                                               │
//! │ ... repeated for each live entry ...          │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! There is no header, footer, entry count or checksum: end of file is the
//! only terminator. Keys are written without a terminator and values are
//! written verbatim, so both may be empty. All integers are little-endian.
//!
//! Records appear in table-internal order (slot ascending, chain head to
//! tail). Loading replays each record through [`table::HashTable::set`], so a
//! stream with duplicate keys collapses to the last record for that key.
//!
//! A short read of any field ends the load. Everything before it stays
//! applied; a partial trailing record is reported through
//! [`LoadStats::truncated`] rather than as an error. A complete record whose
//! key cannot be stored is skipped and counted in [`LoadStats::skipped`].

mod format;
mod reader;
mod writer;

use std::io;

use thiserror::Error;

pub use format::{read_record, write_record, ReadOutcome, KEY_LEN_BYTES, VALUE_LEN_BYTES};
pub use reader::{LoadStats, SnapshotReader};
pub use writer::{SaveStats, SnapshotWriter};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("table error: {0}")]
    Table(#[from] table::TableError),
}
