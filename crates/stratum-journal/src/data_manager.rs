//! Binds an [`Allocator`] to a [`JournaledFile`], exposing the
//! alloc/free/usable-size/commit surface the higher layers (block cache,
//! block list, skip list, ring list) are built on.

use std::sync::Arc;

use stratum_alloc::Allocator;
use stratum_io::{FileStat, IoResult, RandomAccessFile, ReadOutcome, WalFile};

use crate::error::JournalResult;
use crate::journaled_file::JournaledFile;

/// A read/write view onto a data manager's file. `Direct` bypasses the
/// overlay; `Rollback` observes uncommitted writes immediately.
pub struct DirectFile<F: RandomAccessFile> {
    inner: Arc<F>,
}

impl<F: RandomAccessFile> RandomAccessFile for DirectFile<F> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> IoResult<ReadOutcome> {
        self.inner.read_at(buf, offset)
    }
    fn write_at(&self, buf: &[u8], offset: u64) -> IoResult<usize> {
        self.inner.write_at(buf, offset)
    }
    fn truncate(&self, size: u64) -> IoResult<()> {
        self.inner.truncate(size)
    }
    fn stat(&self) -> IoResult<FileStat> {
        self.inner.stat()
    }
}

pub struct RollbackFile<F: RandomAccessFile, W: WalFile> {
    inner: Arc<JournaledFile<F, W>>,
}

impl<F: RandomAccessFile, W: WalFile> RandomAccessFile for RollbackFile<F, W> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> IoResult<ReadOutcome> {
        Ok(self.inner.read_at(buf, offset)?)
    }
    fn write_at(&self, buf: &[u8], offset: u64) -> IoResult<usize> {
        Ok(self.inner.write_at(buf, offset)?)
    }
    fn truncate(&self, size: u64) -> IoResult<()> {
        Ok(self.inner.truncate(size)?)
    }
    fn stat(&self) -> IoResult<FileStat> {
        Ok(self.inner.stat()?)
    }
}

/// Adapts an external allocator onto a journaled file.
pub struct DataManager<F: RandomAccessFile, W: WalFile, A: Allocator> {
    journaled: Arc<JournaledFile<F, W>>,
    raw: Arc<F>,
    alloc: A,
}

impl<F: RandomAccessFile, W: WalFile, A: Allocator> DataManager<F, W, A> {
    pub fn new(raw: Arc<F>, journaled: Arc<JournaledFile<F, W>>, alloc: A) -> JournalResult<Self> {
        let dm = DataManager {
            journaled,
            raw,
            alloc,
        };
        // The original package always commits once right after opening, so
        // a freshly-created heap region is durable before any caller can
        // observe it.
        dm.commit()?;
        Ok(dm)
    }

    pub fn alloc(&self, size: u64) -> JournalResult<u64> {
        Ok(self.alloc.alloc(size)?)
    }

    pub fn free(&self, offset: u64) -> JournalResult<()> {
        Ok(self.alloc.free(offset)?)
    }

    pub fn usable_size(&self, offset: u64) -> JournalResult<u64> {
        Ok(self.alloc.usable_size(offset)?)
    }

    pub fn commit(&self) -> JournalResult<()> {
        self.journaled.commit()
    }

    pub fn direct_file(&self) -> DirectFile<F> {
        DirectFile {
            inner: self.raw.clone(),
        }
    }

    pub fn rollback_file(&self) -> RollbackFile<F, W> {
        RollbackFile {
            inner: self.journaled.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_alloc::{AllocatorConfig, SlabAllocator};
    use stratum_io::MemoryFile;
    use stratum_pool::BufferPool;

    fn manager() -> DataManager<MemoryFile, MemoryFile, SlabAllocator<MemoryFile>> {
        let raw = Arc::new(MemoryFile::new());
        let journaled = Arc::new(
            JournaledFile::open(raw.clone(), MemoryFile::new(), BufferPool::new()).unwrap(),
        );
        let alloc = SlabAllocator::open(raw.clone(), AllocatorConfig::default()).unwrap();
        DataManager::new(raw, journaled, alloc).unwrap()
    }

    #[test]
    fn rollback_file_sees_uncommitted_writes_direct_file_does_not() {
        let dm = manager();
        let off = dm.alloc(16).unwrap();
        dm.rollback_file().write_at(b"hi", off).unwrap();

        let mut via_rollback = [0u8; 2];
        dm.rollback_file().read_at(&mut via_rollback, off).unwrap();
        assert_eq!(&via_rollback, b"hi");

        let mut via_direct = [0u8; 2];
        dm.direct_file().read_at(&mut via_direct, off).unwrap();
        assert_eq!(&via_direct, &[0, 0]);

        dm.commit().unwrap();
        let mut via_direct_after = [0u8; 2];
        dm.direct_file()
            .read_at(&mut via_direct_after, off)
            .unwrap();
        assert_eq!(&via_direct_after, b"hi");
    }

    #[test]
    fn alloc_returns_usable_size_at_least_the_request() {
        let dm = manager();
        let off = dm.alloc(100).unwrap();
        assert!(dm.usable_size(off).unwrap() >= 100);
    }

    #[test]
    fn free_then_alloc_same_class_reuses_offset() {
        let dm = manager();
        let off = dm.alloc(10).unwrap();
        dm.free(off).unwrap();
        let off2 = dm.alloc(10).unwrap();
        assert_eq!(off, off2);
    }
}
