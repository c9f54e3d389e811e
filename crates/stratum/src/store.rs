//! Wires the overlay, journaled file, slab allocator, and data manager
//! together into a single handle, and mints block caches, skip lists,
//! block lists, and rings on top of it.
//!
//! # Design Rules
//!
//! 1. A `Store` owns exactly one [`DataManager`]; every index structure
//!    minted from it shares that data manager, so they all commit
//!    together.
//! 2. Index structures are identified by their head/anchor offset, which
//!    a caller persists wherever it keeps its own root pointers (a
//!    superblock, a second list, etc.) -- the store itself has no
//!    registry of "the" lists living inside it.

use std::path::Path;
use std::sync::Arc;

use stratum_alloc::{AllocatorConfig, SlabAllocator};
use stratum_blocklist::BlockList;
use stratum_cache::CacheConfig;
use stratum_io::{MemoryFile, OsFile, OsWalFile, RandomAccessFile, WalFile};
use stratum_journal::{DataManager, JournaledFile};
use stratum_pool::BufferPool;
use stratum_ring::Ring;
use stratum_skiplist::SkipList;

use crate::error::StratumResult;

/// The data manager type every index structure minted from a `Store`
/// shares.
pub type StoreDataManager<F, W> = DataManager<F, W, SlabAllocator<F>>;

/// A fully wired storage substrate: overlay, journaled file, slab
/// allocator, and data manager over a primary file `F` journaled
/// through a WAL target `W`.
pub struct Store<F: RandomAccessFile, W: WalFile> {
    dm: Arc<StoreDataManager<F, W>>,
    pool: BufferPool,
}

impl<F: RandomAccessFile, W: WalFile> Store<F, W> {
    /// Open a store over `primary`, journaling through `wal`. Recovers
    /// from a non-empty WAL as part of opening, then commits once so a
    /// freshly created heap is durable before any caller observes it.
    pub fn open(
        primary: Arc<F>,
        wal: W,
        pool: BufferPool,
        alloc_config: AllocatorConfig,
    ) -> StratumResult<Self> {
        let journaled = Arc::new(JournaledFile::open(primary.clone(), wal, pool.clone())?);
        let alloc = SlabAllocator::open(primary.clone(), alloc_config)?;
        let dm = Arc::new(DataManager::new(primary, journaled, alloc)?);
        Ok(Store { dm, pool })
    }

    /// Share this store's data manager with a caller that needs to wire
    /// up its own cache or index structure directly.
    pub fn data_manager(&self) -> Arc<StoreDataManager<F, W>> {
        self.dm.clone()
    }

    /// Run the commit protocol: dump the overlay to the WAL, apply it to
    /// the primary file, truncate the WAL, clear the overlay.
    pub fn commit(&self) -> StratumResult<()> {
        self.dm.commit()?;
        Ok(())
    }

    /// Allocate a fresh, empty skip list and return a handle to it.
    pub fn create_skip_list(
        &self,
        cache_config: CacheConfig,
    ) -> StratumResult<SkipList<F, W, SlabAllocator<F>>> {
        Ok(SkipList::create(self.dm.clone(), cache_config, self.pool.clone())?)
    }

    /// Reopen a skip list whose head lives at a known offset (as
    /// returned by a prior `create_skip_list(..).head()`).
    pub fn skip_list_at(
        &self,
        head: u64,
        cache_config: CacheConfig,
    ) -> SkipList<F, W, SlabAllocator<F>> {
        SkipList::open(self.dm.clone(), cache_config, head, self.pool.clone())
    }

    /// Mint a block list handle bound to this store's data manager. Call
    /// [`stratum_blocklist::BlockList::new_list_head`] to allocate a
    /// fresh list, or reuse an offset from a prior run.
    pub fn block_list(&self, cache_config: CacheConfig) -> BlockList<F, W, SlabAllocator<F>> {
        BlockList::new(self.dm.clone(), cache_config, self.pool.clone())
    }

    /// Mint a ring handle bound to this store's data manager. Call
    /// [`stratum_ring::Ring::new_node`] + [`stratum_ring::Ring::init`] to
    /// start a fresh ring, or reuse an anchor offset from a prior run.
    pub fn ring(&self, cache_config: CacheConfig) -> Ring<F, W, SlabAllocator<F>> {
        Ring::new(self.dm.clone(), cache_config, self.pool.clone())
    }
}

impl Store<OsFile, OsWalFile> {
    /// Open a store backed by real files on disk: `path` is the primary
    /// file, `path` with a `.wal` suffix is the write-ahead log.
    pub fn open_on_disk(path: impl AsRef<Path>) -> StratumResult<Self> {
        let primary = Arc::new(OsFile::open(path.as_ref())?);
        let wal_path = wal_sibling_path(path.as_ref());
        let wal = OsWalFile::open(wal_path)?;
        Self::open(
            primary,
            wal,
            BufferPool::new(),
            AllocatorConfig::default(),
        )
    }
}

impl Store<MemoryFile, MemoryFile> {
    /// Open an all-in-memory store, useful for tests and for embedding
    /// applications that don't need durability across restarts.
    pub fn open_in_memory() -> StratumResult<Self> {
        Self::open(
            Arc::new(MemoryFile::new()),
            MemoryFile::new(),
            BufferPool::new(),
            AllocatorConfig::default(),
        )
    }
}

fn wal_sibling_path(primary: &Path) -> std::path::PathBuf {
    let mut name = primary
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".wal");
    primary.with_file_name(name)
}
