/// Errors from the skip list.
#[derive(Debug, thiserror::Error)]
pub enum SkipListError {
    /// Insert collided with an existing key.
    #[error("key already exists")]
    Exists,

    #[error("cache error: {0}")]
    Cache(#[from] stratum_cache::CacheError),

    #[error("journal error: {0}")]
    Journal(#[from] stratum_journal::JournalError),

    #[error("I/O error: {0}")]
    Io(#[from] stratum_io::IoError),
}

pub type SkipListResult<T> = Result<T, SkipListError>;
