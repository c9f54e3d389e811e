/// Errors from overlay journal serialization and application.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// Failure encoding or decoding the WAL payload.
    #[error("journal codec error: {0}")]
    Codec(#[from] Box<bincode::ErrorKind>),

    /// I/O failure applying the overlay to its target, or reading/writing
    /// the WAL stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O failure from a `RandomAccessFile` target during `apply_to`.
    #[error("I/O error: {0}")]
    Underlying(#[from] stratum_io::IoError),
}

pub type OverlayResult<T> = Result<T, OverlayError>;
