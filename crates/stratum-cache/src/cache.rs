//! Offset-keyed LRU of decoded blocks.
//!
//! On a miss, the usable size of the slot is read from the allocator, the
//! bytes are pulled from storage, and a fresh `B` is decoded. On eviction
//! of a dirty entry (read-write mode only), the block is encoded and
//! written back; if the encoded form no longer fits the slot's usable
//! size the write-back is silently dropped (this is logged, not panicked
//! on -- see the crate-level docs).

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use stratum_alloc::Allocator;
use stratum_io::{IoResult, RandomAccessFile, ReadOutcome, WalFile};
use stratum_journal::{DataManager, DirectFile, RollbackFile};
use stratum_pool::BufferPool;

use crate::block::Block;
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};

enum FileView<F: RandomAccessFile, W: WalFile> {
    Direct(DirectFile<F>),
    Rollback(RollbackFile<F, W>),
}

impl<F: RandomAccessFile, W: WalFile> FileView<F, W> {
    fn read_at(&self, buf: &mut [u8], off: u64) -> IoResult<ReadOutcome> {
        match self {
            FileView::Direct(f) => f.read_at(buf, off),
            FileView::Rollback(f) => f.read_at(buf, off),
        }
    }

    fn write_at(&self, buf: &[u8], off: u64) -> IoResult<usize> {
        match self {
            FileView::Direct(f) => f.write_at(buf, off),
            FileView::Rollback(f) => f.write_at(buf, off),
        }
    }
}

pub struct NodeCache<B: Block, F: RandomAccessFile, W: WalFile, A: Allocator> {
    dm: Arc<DataManager<F, W, A>>,
    cache: Mutex<LruCache<u64, B>>,
    readonly: bool,
    pool: BufferPool,
}

impl<B: Block, F: RandomAccessFile, W: WalFile, A: Allocator> NodeCache<B, F, W, A> {
    pub fn new(
        dm: Arc<DataManager<F, W, A>>,
        config: CacheConfig,
        readonly: bool,
        pool: BufferPool,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        NodeCache {
            dm,
            cache: Mutex::new(LruCache::new(capacity)),
            readonly,
            pool,
        }
    }

    fn file(&self) -> FileView<F, W> {
        if self.readonly {
            FileView::Direct(self.dm.direct_file())
        } else {
            FileView::Rollback(self.dm.rollback_file())
        }
    }

    fn write_back(&self, off: u64, block: &mut B) {
        if self.readonly || !block.dirty() {
            return;
        }
        let mut buf = self.pool.acquire(0);
        block.encode(&mut buf);
        let usable = match self.dm.usable_size(off) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(off, error = %e, "could not determine usable size on evict");
                self.pool.release(buf);
                return;
            }
        };
        if buf.len() as u64 > usable {
            tracing::warn!(
                off,
                encoded_len = buf.len(),
                usable,
                "dropping write-back: encoded block exceeds slot's usable size"
            );
            self.pool.release(buf);
            return;
        }
        match self.file().write_at(&buf, off) {
            Ok(_) => block.mark_clean(),
            Err(e) => tracing::warn!(off, error = %e, "write-back failed"),
        }
        self.pool.release(buf);
    }

    fn load(&self, off: u64) -> CacheResult<B> {
        let usable = self.dm.usable_size(off)?;
        let mut buf = self.pool.acquire(usable as usize);
        buf.resize(usable as usize, 0);
        let result = self.file().read_at(&mut buf, off);
        let decoded = result.map_err(CacheError::from).and_then(|_| B::decode(&buf));
        self.pool.release(buf);
        decoded
    }

    /// Look up `off`, loading it from storage on a miss, and run `f` against
    /// the cached (now most-recently-used) value.
    pub fn get<R>(&self, off: u64, f: impl FnOnce(&mut B) -> R) -> CacheResult<R> {
        {
            let mut cache = self.cache.lock().expect("lock poisoned");
            if let Some(block) = cache.get_mut(&off) {
                return Ok(f(block));
            }
        }
        let mut fresh = self.load(off)?;
        let result = f(&mut fresh);
        self.insert(off, fresh);
        Ok(result)
    }

    /// Like `get`, but never performs I/O -- returns `None` on a miss.
    pub fn get_cached<R>(&self, off: u64, f: impl FnOnce(&mut B) -> R) -> Option<R> {
        let mut cache = self.cache.lock().expect("lock poisoned");
        cache.get_mut(&off).map(f)
    }

    fn insert(&self, off: u64, block: B) {
        let evicted = {
            let mut cache = self.cache.lock().expect("lock poisoned");
            cache.put(off, block)
        };
        if let Some((evicted_off, mut evicted_block)) = evicted {
            self.write_back(evicted_off, &mut evicted_block);
        }
    }

    /// Allocate a fresh slot sized `requested_size`, insert `block` as the
    /// cached value for it, and return the new offset.
    pub fn set(&self, requested_size: u64, block: B) -> CacheResult<u64> {
        let off = self.dm.alloc(requested_size)?;
        self.insert(off, block);
        Ok(off)
    }

    /// Insert `block` as the cached value for an already-allocated `off`,
    /// without touching the allocator. Used by callers (block list,
    /// skip list, ring list) that carve their own extents up front and
    /// only need the cache to own write-back for the decoded form.
    pub fn put(&self, off: u64, block: B) -> CacheResult<()> {
        self.insert(off, block);
        Ok(())
    }

    /// Drop `off` from the cache (without writing it back) and free its slot.
    pub fn delete(&self, off: u64) -> CacheResult<()> {
        self.cache.lock().expect("lock poisoned").pop(&off);
        self.dm.free(off)?;
        Ok(())
    }

    /// Write back every dirty entry, then drop the whole cache so the next
    /// `get` of any of these offsets reloads from storage.
    pub fn flush(&self) -> CacheResult<()> {
        let drained: Vec<(u64, B)> = {
            let mut cache = self.cache.lock().expect("lock poisoned");
            let offsets: Vec<u64> = cache.iter().map(|(&off, _)| off).collect();
            offsets
                .into_iter()
                .filter_map(|off| cache.pop(&off).map(|b| (off, b)))
                .collect()
        };
        for (off, mut block) in drained {
            self.write_back(off, &mut block);
        }
        Ok(())
    }

    pub fn commit(&self) -> CacheResult<()> {
        self.flush()?;
        self.dm.commit()?;
        Ok(())
    }
}
