use thiserror::Error;

/// Failures raised by [`ZipStreamWriter`](super::ZipStreamWriter).
///
/// Every variant other than [`ArchiveError::Io`] is detected before the
/// offending bytes are written, so the archive emitted so far stays intact.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("entry already exists: {0}")]
    DuplicateEntry(String),

    #[error("archive stream is closed")]
    StreamClosed,

    #[error("entry still being written: {0}")]
    EntryInProgress(String),

    #[error("entry too large for a 32-bit archive: {0}")]
    EntryTooLarge(String),

    #[error("no entry is being written")]
    NoActiveEntry,

    #[error("invalid entry name: {0}")]
    InvalidName(String),

    #[error("archive limit exceeded: {0}")]
    LimitExceeded(&'static str),

    #[error("sink: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// The entry was refused before anything was written; the archive can
    /// carry on with other entries.
    pub fn is_entry_rejection(&self) -> bool {
        matches!(
            self,
            ArchiveError::DuplicateEntry(_)
                | ArchiveError::InvalidName(_)
                | ArchiveError::EntryTooLarge(_)
        )
    }
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
