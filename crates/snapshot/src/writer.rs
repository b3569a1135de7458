use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use table::HashTable;
use tracing::info;

use crate::format::write_record;
use crate::SnapshotError;

/// Counts reported by a successful save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveStats {
    /// Number of records written (one per live entry).
    pub records: u64,
    /// Total size of the snapshot in bytes.
    pub bytes: u64,
}

/// Writes a [`HashTable`] out as a snapshot.
///
/// The writer is stateless; all work happens in [`save`](SnapshotWriter::save)
/// and [`write_to`](SnapshotWriter::write_to).
#[derive(Debug)]
pub struct SnapshotWriter {}

impl SnapshotWriter {
    /// Saves every entry of `table` to `path`, replacing any existing file.
    ///
    /// # Crash Safety
    ///
    /// Records are written to `<path>.tmp`, flushed (and with `sync`, fsynced),
    /// then renamed over `path`. A crash mid-write leaves the previous snapshot
    /// intact and a stray temp file behind.
    ///
    /// If `path` already exists it is resolved first, so a symlinked snapshot
    /// path keeps its link and the file it points to is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] if the temp file cannot be created or
    /// written, or the rename fails. The temp file is removed on failure.
    pub fn save(path: &Path, table: &HashTable, sync: bool) -> Result<SaveStats, SnapshotError> {
        let resolved = fs::canonicalize(path).ok();
        let path = resolved.as_deref().unwrap_or(path);
        let tmp_path = tmp_path_for(path);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        let result = (|| -> Result<SaveStats, SnapshotError> {
            let mut w = BufWriter::new(file);
            let stats = Self::write_to(&mut w, table)?;
            w.flush()?;
            if sync {
                w.get_ref().sync_all()?;
            }
            drop(w);
            fs::rename(&tmp_path, path)?;
            Ok(stats)
        })();

        match result {
            Ok(stats) => {
                info!(
                    path = %path.display(),
                    records = stats.records,
                    bytes = stats.bytes,
                    "snapshot saved"
                );
                Ok(stats)
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                Err(e)
            }
        }
    }

    /// Writes every entry of `table` to `w`, in table-internal order.
    ///
    /// Does not flush `w`.
    pub fn write_to<W: Write>(w: &mut W, table: &HashTable) -> Result<SaveStats, SnapshotError> {
        let mut stats = SaveStats::default();
        for (key, value) in table {
            stats.bytes += write_record(w, key.as_bytes(), value)?;
            stats.records += 1;
        }
        Ok(stats)
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
