/// Errors from the block list.
#[derive(Debug, thiserror::Error)]
pub enum BlockListError {
    #[error("cache error: {0}")]
    Cache(#[from] stratum_cache::CacheError),

    #[error("journal error: {0}")]
    Journal(#[from] stratum_journal::JournalError),

    #[error("I/O error: {0}")]
    Io(#[from] stratum_io::IoError),

    /// A head or element record was too short to decode.
    #[error("truncated block-list record at offset {offset}")]
    Truncated { offset: u64 },
}

pub type BlockListResult<T> = Result<T, BlockListError>;
