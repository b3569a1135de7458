use snapshot::SnapshotError;
use table::TableError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

impl KvError {
    /// The status code callers branch on for this error.
    pub fn status(&self) -> Status {
        match self {
            KvError::Table(e) => table_status(e),
            KvError::Snapshot(SnapshotError::Io(_)) => Status::IoFailure,
            KvError::Snapshot(SnapshotError::Table(e)) => table_status(e),
        }
    }
}

fn table_status(e: &TableError) -> Status {
    match e {
        TableError::KeyNotFound => Status::KeyNotFound,
        TableError::OutOfMemory => Status::OutOfMemory,
        TableError::InvalidArgument(_) => Status::InvalidArgument,
    }
}

/// Flat status codes for callers that branch on a number rather than an
/// error type.
///
/// None of them are retried by the store itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    Success = 0,
    KeyNotFound = 1,
    OutOfMemory = 2,
    InvalidArgument = 3,
    IoFailure = 4,
    Unknown = 5,
}

impl Status {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Maps a numeric code back to a status; unrecognised codes are
    /// [`Status::Unknown`].
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Status::Success,
            1 => Status::KeyNotFound,
            2 => Status::OutOfMemory,
            3 => Status::InvalidArgument,
            4 => Status::IoFailure,
            _ => Status::Unknown,
        }
    }

    /// Status of an operation's result.
    pub fn of<T>(result: &Result<T, KvError>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(e) => e.status(),
        }
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}
