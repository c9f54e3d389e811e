//! Circular doubly-linked list of tagged byte records, built on the
//! block cache exactly as the skip list is, but navigated by stable
//! neighbor pointers instead of ordered search.
//!
//! # Design Rules
//!
//! 1. The anchor is a permanent member of the ring -- `remove` never
//!    frees it, and a ring is never "empty" in the way a block list or
//!    skip list can be: it always has at least the anchor pointing to
//!    itself.
//! 2. Every splice rewrites exactly three nodes' `next`/`prev` fields and
//!    flushes them together before committing.

use std::sync::{Arc, Mutex};

use stratum_alloc::Allocator;
use stratum_cache::{CacheConfig, NodeCache};
use stratum_io::{RandomAccessFile, WalFile};
use stratum_journal::DataManager;
use stratum_pool::BufferPool;

use crate::error::RingResult;
use crate::node::RingNode;

pub struct Ring<F: RandomAccessFile, W: WalFile, A: Allocator> {
    dm: Arc<DataManager<F, W, A>>,
    cache: Arc<NodeCache<RingNode, F, W, A>>,
    lock: Mutex<()>,
}

impl<F: RandomAccessFile, W: WalFile, A: Allocator> Ring<F, W, A> {
    pub fn new(dm: Arc<DataManager<F, W, A>>, cache_config: CacheConfig, pool: BufferPool) -> Self {
        let cache = Arc::new(NodeCache::new(dm.clone(), cache_config, false, pool));
        Ring {
            dm,
            cache,
            lock: Mutex::new(()),
        }
    }

    /// Allocate a fresh, unlinked node. Pass its offset to [`Self::init`]
    /// to start a new ring, or to [`Self::insert_after`]/
    /// [`Self::insert_before`] to splice it into an existing one.
    pub fn new_node(&self, tag: Vec<u8>, content: Vec<u8>) -> RingResult<u64> {
        let node = RingNode::new(tag, content);
        let off = self.cache.set(node.encoded_len(), node)?;
        self.dm.commit()?;
        Ok(off)
    }

    /// Initialize `anchor` as a one-node ring: its own `next`/`prev`
    /// point back at itself.
    pub fn init(&self, anchor: u64) -> RingResult<()> {
        let _guard = self.lock.lock().expect("lock poisoned");
        self.cache.get(anchor, |n| n.point_to_self(anchor))?;
        self.cache.flush()?;
        self.dm.commit()?;
        Ok(())
    }

    /// Splice `other` immediately after `ring`.
    pub fn insert_after(&self, ring: u64, other: u64) -> RingResult<()> {
        let _guard = self.lock.lock().expect("lock poisoned");
        let c = self.cache.get(ring, |n| n.next())?;
        self.cache.get(other, |n| {
            n.set_next(c);
            n.set_prev(ring);
        })?;
        self.cache.get(ring, |n| n.set_next(other))?;
        self.cache.get(c, |n| n.set_prev(other))?;
        self.cache.flush()?;
        self.dm.commit()?;
        Ok(())
    }

    /// Splice `other` immediately before `ring`.
    pub fn insert_before(&self, ring: u64, other: u64) -> RingResult<()> {
        let _guard = self.lock.lock().expect("lock poisoned");
        let a = self.cache.get(ring, |n| n.prev())?;
        self.cache.get(other, |n| {
            n.set_prev(a);
            n.set_next(ring);
        })?;
        self.cache.get(ring, |n| n.set_prev(other))?;
        self.cache.get(a, |n| n.set_next(other))?;
        self.cache.flush()?;
        self.dm.commit()?;
        Ok(())
    }

    /// Remove `node` from whatever ring it belongs to and clear its own
    /// links. Never call this on a ring's anchor.
    pub fn remove(&self, node: u64) -> RingResult<()> {
        let _guard = self.lock.lock().expect("lock poisoned");
        let (a, c) = self.cache.get(node, |n| (n.prev(), n.next()))?;
        self.cache.get(a, |n| n.set_next(c))?;
        self.cache.get(c, |n| n.set_prev(a))?;
        self.cache.get(node, |n| n.clear_links())?;
        self.cache.flush()?;
        self.cache.delete(node)?;
        self.dm.commit()?;
        Ok(())
    }

    /// Resolve `node`'s `next` pointer, returning both the offset and the
    /// decoded node in one round trip.
    pub fn next(&self, node: u64) -> RingResult<(u64, RingNode)> {
        let next_off = self.cache.get(node, |n| n.next())?;
        let decoded = self.cache.get(next_off, |n| n.clone())?;
        Ok((next_off, decoded))
    }

    /// Resolve `node`'s `prev` pointer, returning both the offset and the
    /// decoded node in one round trip.
    pub fn prev(&self, node: u64) -> RingResult<(u64, RingNode)> {
        let prev_off = self.cache.get(node, |n| n.prev())?;
        let decoded = self.cache.get(prev_off, |n| n.clone())?;
        Ok((prev_off, decoded))
    }
}
