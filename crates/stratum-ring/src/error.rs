/// Errors from the ring list.
#[derive(Debug, thiserror::Error)]
pub enum RingError {
    #[error("cache error: {0}")]
    Cache(#[from] stratum_cache::CacheError),

    #[error("journal error: {0}")]
    Journal(#[from] stratum_journal::JournalError),

    #[error("I/O error: {0}")]
    Io(#[from] stratum_io::IoError),
}

pub type RingResult<T> = Result<T, RingError>;
