//! In-memory [`RandomAccessFile`]/[`WalFile`] used by tests: it avoids
//! touching the real filesystem and can be told to fail writes after a
//! fixed number of calls, which is how the commit-atomicity tests drive a
//! simulated crash without actually killing the process.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use crate::error::{IoError, IoResult};
use crate::traits::{FileStat, RandomAccessFile, ReadOutcome, WalFile};

struct Inner {
    data: Vec<u8>,
    writes_remaining_before_failure: Option<u64>,
    cursor: u64,
}

impl Inner {
    fn maybe_fail(&mut self) -> io::Result<()> {
        if let Some(remaining) = self.writes_remaining_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    "simulated crash: write budget exhausted",
                ));
            }
            *remaining -= 1;
        }
        Ok(())
    }
}

/// An in-memory file. Safe for concurrent use from multiple threads.
pub struct MemoryFile {
    inner: Mutex<Inner>,
}

impl Default for MemoryFile {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFile {
    pub fn new() -> Self {
        MemoryFile {
            inner: Mutex::new(Inner {
                data: Vec::new(),
                writes_remaining_before_failure: None,
                cursor: 0,
            }),
        }
    }

    /// Build a file that fails its `n`th subsequent write call (counting
    /// from 0) with an I/O error, and succeeds on every call before it.
    pub fn new_crashing_after(n: u64) -> Self {
        MemoryFile {
            inner: Mutex::new(Inner {
                data: Vec::new(),
                writes_remaining_before_failure: Some(n),
                cursor: 0,
            }),
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().expect("lock poisoned").data.clone()
    }
}

impl RandomAccessFile for MemoryFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> IoResult<ReadOutcome> {
        let inner = self.inner.lock().expect("lock poisoned");
        let offset = offset as usize;
        if offset >= inner.data.len() {
            return Ok(ReadOutcome {
                filled: 0,
                hit_eof: !buf.is_empty(),
            });
        }
        let end = (offset + buf.len()).min(inner.data.len());
        let filled = end - offset;
        buf[..filled].copy_from_slice(&inner.data[offset..end]);
        Ok(ReadOutcome {
            filled,
            hit_eof: filled < buf.len(),
        })
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> IoResult<usize> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.maybe_fail()?;
        let offset = offset as usize;
        let end = offset + buf.len();
        if inner.data.len() < end {
            inner.data.resize(end, 0);
        }
        inner.data[offset..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn truncate(&self, size: u64) -> IoResult<()> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.data.resize(size as usize, 0);
        Ok(())
    }

    fn stat(&self) -> IoResult<FileStat> {
        let inner = self.inner.lock().expect("lock poisoned");
        Ok(FileStat {
            size: inner.data.len() as u64,
        })
    }
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let offset = inner.cursor as usize;
        if offset >= inner.data.len() {
            return Ok(0);
        }
        let end = (offset + buf.len()).min(inner.data.len());
        let filled = end - offset;
        buf[..filled].copy_from_slice(&inner.data[offset..end]);
        inner.cursor += filled as u64;
        Ok(filled)
    }
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.maybe_fail()?;
        let offset = inner.cursor as usize;
        let end = offset + buf.len();
        if inner.data.len() < end {
            inner.data.resize(end, 0);
        }
        inner.data[offset..end].copy_from_slice(buf);
        inner.cursor += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let new_cursor = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::End(delta) => inner.data.len() as i64 + delta,
            SeekFrom::Current(delta) => inner.cursor as i64 + delta,
        };
        if new_cursor < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "negative seek position",
            ));
        }
        inner.cursor = new_cursor as u64;
        Ok(inner.cursor)
    }
}

impl WalFile for MemoryFile {
    fn truncate_stream(&mut self, size: u64) -> IoResult<()> {
        RandomAccessFile::truncate(self, size)?;
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.cursor = inner.cursor.min(size);
        Ok(())
    }
}

impl From<IoError> for io::Error {
    fn from(e: IoError) -> Self {
        match e {
            IoError::Underlying(inner) => inner,
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_your_own_write() {
        let file = MemoryFile::new();
        file.write_at(&[1, 2, 3], 5).unwrap();
        let mut buf = [0u8; 3];
        let outcome = file.read_at(&mut buf, 5).unwrap();
        assert_eq!(outcome.filled, 3);
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn read_past_end_is_all_zero_with_eof() {
        let file = MemoryFile::new();
        file.write_at(&[9], 0).unwrap();
        let mut buf = [0u8; 4];
        let outcome = file.read_at(&mut buf, 0).unwrap();
        assert_eq!(outcome.filled, 1);
        assert!(outcome.hit_eof);
        assert_eq!(buf, [9, 0, 0, 0]);
    }

    #[test]
    fn crashing_file_fails_after_budget_exhausted() {
        let file = MemoryFile::new_crashing_after(2);
        assert!(file.write_at(&[1], 0).is_ok());
        assert!(file.write_at(&[1], 0).is_ok());
        assert!(file.write_at(&[1], 0).is_err());
    }

    #[test]
    fn wal_stream_read_write_seek_round_trip() {
        let mut file = MemoryFile::new();
        file.write_all(b"hello").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut buf = [0u8; 5];
        file.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }
}
