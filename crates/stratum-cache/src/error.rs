/// Errors from the block cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A cache configured with capacity 0, or otherwise unable to hold any
    /// block, refused an insertion.
    #[error("cache is disabled")]
    Disabled,

    /// Decoding a block's on-disk bytes failed.
    #[error("decode error at offset {offset}: {reason}")]
    Decode { offset: u64, reason: String },

    #[error("journal error: {0}")]
    Journal(#[from] stratum_journal::JournalError),

    #[error("allocator/I-O error: {0}")]
    Io(#[from] stratum_io::IoError),
}

pub type CacheResult<T> = Result<T, CacheError>;
