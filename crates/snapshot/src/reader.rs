use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use table::{HashTable, TableError};
use tracing::{info, warn};

use crate::format::{read_record, ReadOutcome, KEY_LEN_BYTES, VALUE_LEN_BYTES};
use crate::SnapshotError;

/// What a load found and applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// `false` if there was no snapshot file to load.
    pub found: bool,
    /// Number of complete records applied to the table.
    pub records: u64,
    /// Complete records that could not be applied: the key was not UTF-8 or
    /// the table rejected it.
    pub skipped: u64,
    /// `true` if the stream ended inside a record. That record was dropped.
    pub truncated: bool,
}

/// Replays a snapshot into a [`HashTable`].
#[derive(Debug)]
pub struct SnapshotReader {}

impl SnapshotReader {
    /// Loads the snapshot at `path` into `table`.
    ///
    /// A missing file means there is no snapshot yet: the table is left as it
    /// is and `Ok` is returned with `found == false`. Each complete record is
    /// applied with [`HashTable::set`], so existing keys are overwritten and
    /// duplicate records collapse to the last one. A record whose key is not
    /// UTF-8 or is rejected by the table is skipped and counted in
    /// [`LoadStats::skipped`]; the records after it still load.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::Io`] if the file exists but cannot be opened or read.
    /// - [`SnapshotError::Table`] if the table runs out of memory.
    ///
    /// Records applied before the error remain in the table.
    pub fn load(path: &Path, table: &mut HashTable) -> Result<LoadStats, SnapshotError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no snapshot to load");
                return Ok(LoadStats::default());
            }
            Err(e) => return Err(e.into()),
        };

        let stats = Self::read_from(BufReader::new(file), table)?;
        if stats.truncated {
            warn!(
                path = %path.display(),
                records = stats.records,
                "snapshot ends in a partial record; loaded the complete records before it"
            );
        }
        info!(
            path = %path.display(),
            records = stats.records,
            skipped = stats.skipped,
            "snapshot loaded"
        );
        Ok(stats)
    }

    /// Replays every complete record from `r` into `table`.
    pub fn read_from<R: Read>(mut r: R, table: &mut HashTable) -> Result<LoadStats, SnapshotError> {
        let mut stats = LoadStats {
            found: true,
            ..LoadStats::default()
        };
        let mut offset = 0u64;

        loop {
            match read_record(&mut r)? {
                ReadOutcome::Record { key, value } => {
                    let record_offset = offset;
                    offset += (KEY_LEN_BYTES + key.len() + VALUE_LEN_BYTES + value.len()) as u64;

                    let Ok(key) = String::from_utf8(key) else {
                        warn!(offset = record_offset, "skipping snapshot record: key is not utf-8");
                        stats.skipped += 1;
                        continue;
                    };
                    match table.set(&key, &value) {
                        Ok(()) => stats.records += 1,
                        Err(TableError::InvalidArgument(reason)) => {
                            warn!(offset = record_offset, reason, "skipping snapshot record");
                            stats.skipped += 1;
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                ReadOutcome::End => break,
                ReadOutcome::Torn => {
                    stats.truncated = true;
                    break;
                }
            }
        }

        Ok(stats)
    }
}
