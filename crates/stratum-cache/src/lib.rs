//! Offset-keyed LRU of decoded records, memoized between the skip list,
//! block list, and ring list and their backing data manager.
//!
//! # Design Rules
//!
//! 1. The cache is the sole writer to a block's on-disk bytes between
//!    loads -- nothing else should `write_at`/`read_at` a cached offset
//!    directly while the cache might also hold it.
//! 2. Read-only caches never write back; read-write caches write back
//!    dirty entries on eviction, flush, or commit.
//! 3. A write-back whose encoded form no longer fits the slot's usable
//!    size is dropped and logged, never panicked on.

pub mod block;
pub mod cache;
pub mod config;
pub mod error;

pub use block::Block;
pub use cache::NodeCache;
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
