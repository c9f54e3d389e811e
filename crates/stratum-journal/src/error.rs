use std::io;

/// Errors from the journaled file and data manager.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("I/O error: {0}")]
    Io(#[from] stratum_io::IoError),

    #[error("overlay error: {0}")]
    Overlay(#[from] stratum_overlay::OverlayError),

    /// The apply phase of commit failed. The WAL was already written and
    /// is still intact, so recovery at next open replays it; this error
    /// only signals that the *current* session's commit did not finish.
    #[error("commit failed applying overlay to primary file: {0}")]
    Commit(Box<JournalError>),
}

pub type JournalResult<T> = Result<T, JournalError>;

impl From<JournalError> for stratum_io::IoError {
    fn from(e: JournalError) -> Self {
        match e {
            JournalError::Io(inner) => inner,
            other => stratum_io::IoError::Underlying(io::Error::new(
                io::ErrorKind::Other,
                other.to_string(),
            )),
        }
    }
}
