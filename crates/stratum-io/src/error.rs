/// Errors surfaced by the random-access file and WAL-target implementations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// An operation targeted offset 0, which is reserved as the null offset.
    #[error("illegal position: offset 0 is reserved")]
    IllegalPosition,

    /// An in-place WAL region (or other fixed-capacity medium) is exhausted.
    #[error("no space: requested end {requested} exceeds capacity {capacity}")]
    NoSpace { requested: u64, capacity: u64 },

    /// A read ran past a hard size boundary.
    #[error("end of stream at offset {offset}, requested {len} bytes")]
    EndOfStream { offset: u64, len: usize },

    /// Pass-through of the underlying OS file's own failure.
    #[error("I/O error: {0}")]
    Underlying(#[from] std::io::Error),
}

pub type IoResult<T> = Result<T, IoError>;
