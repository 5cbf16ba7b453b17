use std::path::PathBuf;

use thiserror::Error;

/// Every failure this crate can surface to a caller.
///
/// Modeled on the teacher's house style of one flat, `thiserror`-derived
/// enum per crate rather than a tree of nested error types.
#[derive(Debug, Error)]
pub enum PartitionError {
    /// The local clock reported a time before `EPOCH_MS`.
    #[error("Clock is moving backwards, rejecting id generation")]
    ClockRegression,

    /// A file-system or read/write operation failed.
    #[error("I/O error during {op}, path: {path}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A sealed segment's index file is malformed: its size isn't a
    /// multiple of the 20-byte record width, or its header is missing.
    #[error("Corrupt segment, segment_id: {segment_id}")]
    CorruptSegment { segment_id: u32 },

    /// The fetch consumer dropped its receiving channel mid-stream.
    #[error("Fetch was canceled by the consumer")]
    Canceled,
}

impl PartitionError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PartitionError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PartitionError>;
