/// Errors surfaced by the top-level [`crate::store::Store`] facade.
#[derive(Debug, thiserror::Error)]
pub enum StratumError {
    #[error("I/O error: {0}")]
    Io(#[from] stratum_io::IoError),

    #[error("journal error: {0}")]
    Journal(#[from] stratum_journal::JournalError),

    #[error("cache error: {0}")]
    Cache(#[from] stratum_cache::CacheError),

    #[error("skip-list error: {0}")]
    SkipList(#[from] stratum_skiplist::SkipListError),

    #[error("block-list error: {0}")]
    BlockList(#[from] stratum_blocklist::BlockListError),

    #[error("ring error: {0}")]
    Ring(#[from] stratum_ring::RingError),
}

pub type StratumResult<T> = Result<T, StratumError>;
