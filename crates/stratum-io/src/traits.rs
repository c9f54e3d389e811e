use crate::error::IoResult;

/// Outcome of a single `read_at` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    /// How many bytes of the destination buffer were actually filled.
    pub filled: usize,
    /// Whether the read ran off the end of the medium before filling the
    /// whole buffer.
    pub hit_eof: bool,
}

/// Size/metadata snapshot of a random-access medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
}

/// The random-access medium the journaled file and data manager are built
/// on top of. Positional, so callers never need to track a cursor.
pub trait RandomAccessFile: Send + Sync {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> IoResult<ReadOutcome>;
    fn write_at(&self, buf: &[u8], offset: u64) -> IoResult<usize>;
    fn truncate(&self, size: u64) -> IoResult<()>;
    fn stat(&self) -> IoResult<FileStat>;
}

/// The medium a write-ahead log is dumped into and loaded back from.
///
/// Unlike [`RandomAccessFile`] this is a stream, not an offset-addressed
/// file: the overlay codec always rewinds to the start before a dump or a
/// load, so a plain read/write/seek/truncate surface is all that's needed.
pub trait WalFile: std::io::Read + std::io::Write + std::io::Seek {
    fn truncate_stream(&mut self, size: u64) -> IoResult<()>;
}
