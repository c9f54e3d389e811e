//! `std::fs::File`-backed implementation of [`RandomAccessFile`] and
//! [`WalFile`].
//!
//! Ordinarily this would just be direct calls into the OS, but the trait
//! indirection lets the rest of the crate swap in [`crate::memory::MemoryFile`]
//! for tests that need crash injection.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

#[cfg(unix)]
use std::os::unix::fs::FileExt;

use crate::error::{IoError, IoResult};
use crate::traits::{FileStat, RandomAccessFile, ReadOutcome, WalFile};

/// A positional file on the real filesystem.
pub struct OsFile {
    file: Mutex<File>,
}

impl OsFile {
    pub fn open(path: impl AsRef<Path>) -> IoResult<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(OsFile {
            file: Mutex::new(file),
        })
    }

    pub fn from_file(file: File) -> Self {
        OsFile {
            file: Mutex::new(file),
        }
    }

    fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        #[cfg(unix)]
        {
            let mut total = 0usize;
            while total < buf.len() {
                match file.read_at(&mut buf[total..], offset + total as u64) {
                    Ok(0) => break,
                    Ok(n) => total += n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
            Ok(total)
        }
        #[cfg(not(unix))]
        {
            let mut f = file.try_clone()?;
            f.seek(SeekFrom::Start(offset))?;
            let mut total = 0usize;
            loop {
                match f.read(&mut buf[total..]) {
                    Ok(0) => break,
                    Ok(n) => total += n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
                if total == buf.len() {
                    break;
                }
            }
            Ok(total)
        }
    }

    fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
        #[cfg(unix)]
        {
            file.write_all_at(buf, offset)?;
            Ok(buf.len())
        }
        #[cfg(not(unix))]
        {
            let mut f = file.try_clone()?;
            f.seek(SeekFrom::Start(offset))?;
            f.write_all(buf)?;
            Ok(buf.len())
        }
    }
}

impl RandomAccessFile for OsFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> IoResult<ReadOutcome> {
        let file = self.file.lock().expect("lock poisoned");
        let filled = Self::read_exact_at(&file, buf, offset)?;
        Ok(ReadOutcome {
            filled,
            hit_eof: filled < buf.len(),
        })
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> IoResult<usize> {
        let file = self.file.lock().expect("lock poisoned");
        Ok(Self::write_all_at(&file, buf, offset)?)
    }

    fn truncate(&self, size: u64) -> IoResult<()> {
        let file = self.file.lock().expect("lock poisoned");
        file.set_len(size)?;
        Ok(())
    }

    fn stat(&self) -> IoResult<FileStat> {
        let file = self.file.lock().expect("lock poisoned");
        let meta = file.metadata()?;
        Ok(FileStat { size: meta.len() })
    }
}

/// Wraps an [`OsFile`] handle for use as a WAL target (stream-oriented,
/// cursor-based access rather than positional).
pub struct OsWalFile {
    file: File,
}

impl OsWalFile {
    pub fn open(path: impl AsRef<Path>) -> IoResult<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(OsWalFile { file })
    }
}

impl Read for OsWalFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for OsWalFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for OsWalFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl WalFile for OsWalFile {
    fn truncate_stream(&mut self, size: u64) -> IoResult<()> {
        self.file.set_len(size)?;
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
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let file = OsFile::open(dir.path().join("data")).unwrap();
        file.write_at(b"hello world", 10).unwrap();

        let mut buf = [0u8; 11];
        let outcome = file.read_at(&mut buf, 10).unwrap();
        assert_eq!(outcome.filled, 11);
        assert!(!outcome.hit_eof);
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn read_past_eof_reports_short_fill() {
        let dir = tempfile::tempdir().unwrap();
        let file = OsFile::open(dir.path().join("data")).unwrap();
        file.write_at(b"ab", 0).unwrap();

        let mut buf = [0u8; 10];
        let outcome = file.read_at(&mut buf, 0).unwrap();
        assert_eq!(outcome.filled, 2);
        assert!(outcome.hit_eof);
    }

    #[test]
    fn truncate_shrinks_stat_size() {
        let dir = tempfile::tempdir().unwrap();
        let file = OsFile::open(dir.path().join("data")).unwrap();
        file.write_at(&[0u8; 100], 0).unwrap();
        file.truncate(10).unwrap();
        assert_eq!(file.stat().unwrap().size, 10);
    }
}
