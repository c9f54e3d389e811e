//! An embedded, single-process, crash-consistent storage substrate: an
//! overlay/journal pair turning an ordinary random-access file into a
//! transactional heap, a slab allocator of fixed-offset byte regions
//! inside it, a block cache memoizing decoded records, and three
//! offset-linked structures built on top -- a probabilistic ordered map
//! (skip list), a deferred-free work queue (block list), and a circular
//! doubly-linked list (ring).
//!
//! This crate re-exports the whole stack; most applications only need
//! [`Store`] plus whichever index structures they use.
//!
//! # Design Rules
//!
//! 1. Single-writer, single-reader per [`Store`]/data manager. Every
//!    mutation path acquires the caller's own lock before the data
//!    manager's, never the other way around.
//! 2. Nothing here pulls in an async runtime; all I/O is blocking.
//! 3. Offset 0 is reserved as the null offset throughout the stack and
//!    is never a valid allocation.

pub mod error;
pub mod store;

pub use error::{StratumError, StratumResult};
pub use store::{Store, StoreDataManager};

pub use stratum_alloc::{Allocator, AllocatorConfig, SlabAllocator};
pub use stratum_blocklist::{BlockList, BlockListError, Element};
pub use stratum_cache::{Block, CacheConfig, CacheError, NodeCache};
pub use stratum_io::{
    FileStat, InplaceWalFile, IoError, MemoryFile, OsFile, OsWalFile, RandomAccessFile,
    ReadOutcome, WalFile,
};
pub use stratum_journal::{DataManager, DirectFile, JournalError, JournaledFile, RollbackFile};
pub use stratum_overlay::{Overlay, OverlayError};
pub use stratum_pool::BufferPool;
pub use stratum_ring::{Ring, RingError, RingNode};
pub use stratum_skiplist::{SearchResult, SkipList, SkipListError, STEPS};
