//! An in-place WAL: a [`WalFile`] that reuses a region of an already-open
//! [`RandomAccessFile`] instead of requiring a second file descriptor.
//!
//! Layout within the region (see the on-disk layout table): an 8-byte
//! big-endian "used length" prefix at offset 0 of the region, followed by
//! up to `max_len - 8` bytes of payload. Reads/writes/seeks operate on the
//! payload; the prefix is maintained automatically as the payload grows or
//! shrinks, unless [`InplaceWalFile::set_hold_size`] is engaged, in which
//! case the prefix update is deferred until it is released.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use crate::error::{IoError, IoResult};
use crate::traits::{RandomAccessFile, WalFile};

const PREFIX_LEN: u64 = 8;

pub struct InplaceWalFile {
    file: Arc<dyn RandomAccessFile>,
    base: u64,
    max_len: u64,
    used_len: u64,
    pos: u64,
    hold_size: bool,
}

impl InplaceWalFile {
    /// Open a region of `file` starting at `base` with total capacity
    /// `max_len` (including the 8-byte prefix). The prefix is read
    /// immediately; a region backed by all-zero bytes is treated as an
    /// empty WAL.
    pub fn open(file: Arc<dyn RandomAccessFile>, base: u64, max_len: u64) -> IoResult<Self> {
        if max_len < PREFIX_LEN {
            return Err(IoError::NoSpace {
                requested: PREFIX_LEN,
                capacity: max_len,
            });
        }
        let mut prefix = [0u8; 8];
        file.read_at(&mut prefix, base)?;
        let used_len = u64::from_be_bytes(prefix).min(max_len - PREFIX_LEN);
        Ok(InplaceWalFile {
            file,
            base,
            max_len,
            used_len,
            pos: 0,
            hold_size: false,
        })
    }

    fn capacity(&self) -> u64 {
        self.max_len - PREFIX_LEN
    }

    fn persist_used_len(&self) -> IoResult<()> {
        if self.hold_size {
            return Ok(());
        }
        self.file
            .write_at(&self.used_len.to_be_bytes(), self.base)?;
        Ok(())
    }

    /// Suppress persisting the used-length prefix on every write. Useful
    /// when a caller is about to issue a burst of writes and wants exactly
    /// one prefix update at the end.
    pub fn set_hold_size(&mut self, hold: bool) -> IoResult<()> {
        let was_held = self.hold_size;
        self.hold_size = hold;
        if was_held && !hold {
            self.persist_used_len()?;
        }
        Ok(())
    }

    pub fn used_len(&self) -> u64 {
        self.used_len
    }
}

impl Read for InplaceWalFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.used_len {
            return Ok(0);
        }
        let n = (buf.len() as u64).min(self.used_len - self.pos) as usize;
        let outcome = self
            .file
            .read_at(&mut buf[..n], self.base + PREFIX_LEN + self.pos)
            .map_err(io::Error::from)?;
        self.pos += outcome.filled as u64;
        Ok(outcome.filled)
    }
}

impl Write for InplaceWalFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let end = self.pos + buf.len() as u64;
        if end > self.capacity() {
            return Err(IoError::NoSpace {
                requested: end,
                capacity: self.capacity(),
            }
            .into());
        }
        self.file
            .write_at(buf, self.base + PREFIX_LEN + self.pos)
            .map_err(io::Error::from)?;
        self.pos = end;
        if self.used_len < self.pos {
            self.used_len = self.pos;
            self.persist_used_len().map_err(io::Error::from)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for InplaceWalFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::End(delta) => self.used_len as i64 + delta,
            SeekFrom::Current(delta) => self.pos as i64 + delta,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "negative seek position",
            ));
        }
        self.pos = new_pos as u64;
        Ok(self.pos)
    }
}

impl WalFile for InplaceWalFile {
    fn truncate_stream(&mut self, size: u64) -> IoResult<()> {
        if size > self.capacity() {
            return Err(IoError::NoSpace {
                requested: size,
                capacity: self.capacity(),
            });
        }
        self.used_len = size;
        self.pos = self.pos.min(size);
        self.persist_used_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryFile;

    #[test]
    fn fresh_region_is_empty() {
        let backing: Arc<dyn RandomAccessFile> = Arc::new(MemoryFile::new());
        let wal = InplaceWalFile::open(backing, 0, 128).unwrap();
        assert_eq!(wal.used_len(), 0);
    }

    #[test]
    fn write_extends_used_len_and_persists_prefix() {
        let backing: Arc<dyn RandomAccessFile> = Arc::new(MemoryFile::new());
        let mut wal = InplaceWalFile::open(backing.clone(), 0, 128).unwrap();
        wal.write_all(b"hello").unwrap();
        assert_eq!(wal.used_len(), 5);

        // Re-opening over the same backing region should observe the persisted length.
        let reopened = InplaceWalFile::open(backing, 0, 128).unwrap();
        assert_eq!(reopened.used_len(), 5);
    }

    #[test]
    fn truncate_then_read_reports_eof_within_bounds() {
        let backing: Arc<dyn RandomAccessFile> = Arc::new(MemoryFile::new());
        let mut wal = InplaceWalFile::open(backing, 0, 128).unwrap();
        wal.write_all(&[1u8; 100]).unwrap();
        wal.truncate_stream(40).unwrap();
        assert_eq!(wal.seek(SeekFrom::End(0)).unwrap(), 40);

        wal.seek(SeekFrom::Start(0)).unwrap();
        let mut buf = [0u8; 50];
        let n = wal.read(&mut buf).unwrap();
        assert_eq!(n, 40);
    }

    #[test]
    fn write_past_capacity_fails() {
        let backing: Arc<dyn RandomAccessFile> = Arc::new(MemoryFile::new());
        let mut wal = InplaceWalFile::open(backing, 0, 16).unwrap();
        assert!(wal.write_all(&[0u8; 16]).is_err());
    }

    #[test]
    fn hold_size_defers_prefix_persistence() {
        let backing: Arc<dyn RandomAccessFile> = Arc::new(MemoryFile::new());
        let mut wal = InplaceWalFile::open(backing.clone(), 0, 128).unwrap();
        wal.set_hold_size(true).unwrap();
        wal.write_all(b"abc").unwrap();

        let mut prefix = [0u8; 8];
        backing.read_at(&mut prefix, 0).unwrap();
        assert_eq!(u64::from_be_bytes(prefix), 0, "prefix not yet flushed");

        wal.set_hold_size(false).unwrap();
        backing.read_at(&mut prefix, 0).unwrap();
        assert_eq!(u64::from_be_bytes(prefix), 3);
    }
}
