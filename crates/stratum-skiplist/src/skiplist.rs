//! Probabilistic ordered map over byte-string keys.
//!
//! # Design Rules
//!
//! 1. A list is identified solely by its head node's offset -- the head
//!    itself is a node with an empty key and an all-null `next` array,
//!    living at a well-known offset just like any other node.
//! 2. Every splice touches levels `0..=L` only; a node never claims a
//!    level above the one it was sampled at.
//! 3. Delete flushes the cache before freeing the victim, so every
//!    splice that bypasses it lands on disk before the slot is reused.

use std::sync::{Arc, Mutex};

use stratum_alloc::Allocator;
use stratum_cache::{CacheConfig, NodeCache};
use stratum_io::{RandomAccessFile, WalFile};
use stratum_journal::DataManager;
use stratum_pool::BufferPool;

use crate::error::{SkipListError, SkipListResult};
use crate::level::sample_level;
use crate::node::{Node, STEPS};

/// Predecessor pointers and forward-hop counters per level, as produced
/// by a single descent from the head.
pub struct SearchResult {
    pub ptrs: [u64; STEPS],
    pub jumps: [u64; STEPS],
}

pub struct SkipList<F: RandomAccessFile, W: WalFile, A: Allocator> {
    dm: Arc<DataManager<F, W, A>>,
    cache: Arc<NodeCache<Node, F, W, A>>,
    head: u64,
    lock: Mutex<()>,
}

impl<F: RandomAccessFile, W: WalFile, A: Allocator> SkipList<F, W, A> {
    /// Allocate a fresh, empty list and return it, head offset included.
    pub fn create(
        dm: Arc<DataManager<F, W, A>>,
        cache_config: CacheConfig,
        pool: BufferPool,
    ) -> SkipListResult<Self> {
        let cache = Arc::new(NodeCache::new(dm.clone(), cache_config, false, pool));
        let head_node = Node::new(Vec::new(), 0);
        let head = cache.set(head_node.encoded_len(), head_node)?;
        dm.commit()?;
        tracing::debug!(head, "created skip list");
        Ok(SkipList {
            dm,
            cache,
            head,
            lock: Mutex::new(()),
        })
    }

    /// Reopen a list whose head lives at a known offset.
    pub fn open(
        dm: Arc<DataManager<F, W, A>>,
        cache_config: CacheConfig,
        head: u64,
        pool: BufferPool,
    ) -> Self {
        let cache = Arc::new(NodeCache::new(dm.clone(), cache_config, false, pool));
        SkipList {
            dm,
            cache,
            head,
            lock: Mutex::new(()),
        }
    }

    /// The offset identifying this list.
    pub fn head(&self) -> u64 {
        self.head
    }

    /// Shared descent used by both search variants: at every level, keep
    /// advancing while the next node's key is strictly less than `key`,
    /// landing on the predecessor. Both the insert and lookup call sites
    /// rely on `ptrs[0].next[0]` naming the exact match when one exists,
    /// which only holds under this comparator -- see `DESIGN.md` for why
    /// the two named variants share one implementation here.
    fn search_predecessor(&self, key: &[u8]) -> SkipListResult<SearchResult> {
        let mut ptrs = [0u64; STEPS];
        let mut jumps = [0u64; STEPS];
        let mut cur = self.head;
        for level in (0..STEPS).rev() {
            loop {
                let next = self.cache.get(cur, |n| n.next_at(level))?;
                if next == 0 {
                    break;
                }
                let next_key = self.cache.get(next, |n| n.key().to_vec())?;
                if next_key.as_slice() < key {
                    cur = next;
                    jumps[level] += 1;
                } else {
                    break;
                }
            }
            ptrs[level] = cur;
        }
        Ok(SearchResult { ptrs, jumps })
    }

    /// The insert-variant descent: drops a level on `>=`, so equal keys
    /// land in the predecessor. Used by [`Self::insert`] and
    /// [`Self::delete`].
    pub fn steps(&self, key: &[u8]) -> SkipListResult<SearchResult> {
        self.search_predecessor(key)
    }

    /// The lookup-variant descent. Named separately per the original
    /// design's two entry points; see [`Self::search_predecessor`] for
    /// why it delegates to the same comparator as [`Self::steps`].
    pub fn steps_find(&self, key: &[u8]) -> SkipListResult<SearchResult> {
        self.search_predecessor(key)
    }

    /// Return the content stored under `key`, or `None` if absent.
    pub fn lookup(&self, key: &[u8]) -> SkipListResult<Option<u64>> {
        let found = self.steps_find(key)?;
        let succ = self.cache.get(found.ptrs[0], |n| n.next_at(0))?;
        if succ == 0 {
            return Ok(None);
        }
        let succ_key = self.cache.get(succ, |n| n.key().to_vec())?;
        if succ_key == key {
            Ok(Some(self.cache.get(succ, |n| n.content())?))
        } else {
            Ok(None)
        }
    }

    /// Insert `key -> content`. Fails with [`SkipListError::Exists`] if
    /// `key` is already present.
    pub fn insert(&self, key: &[u8], content: u64) -> SkipListResult<()> {
        let _guard = self.lock.lock().expect("lock poisoned");
        let found = self.steps(key)?;
        let succ = self.cache.get(found.ptrs[0], |n| n.next_at(0))?;
        if succ != 0 {
            let succ_key = self.cache.get(succ, |n| n.key().to_vec())?;
            if succ_key == key {
                return Err(SkipListError::Exists);
            }
        }

        let level = sample_level();
        let mut node = Node::new(key.to_vec(), content);
        for (i, slot) in found.ptrs.iter().enumerate().take(level + 1) {
            let successor = self.cache.get(*slot, |n| n.next_at(i))?;
            node.set_next_at(i, successor);
        }
        let off = self.cache.set(node.encoded_len(), node)?;

        for (i, slot) in found.ptrs.iter().enumerate().take(level + 1) {
            self.cache.get(*slot, |n| n.set_next_at(i, off))?;
        }
        self.cache.flush()?;
        self.dm.commit()?;
        tracing::debug!(off, level, "inserted skip-list node");
        Ok(())
    }

    /// Remove `key` if present; a no-op if it is absent.
    pub fn delete(&self, key: &[u8]) -> SkipListResult<()> {
        let _guard = self.lock.lock().expect("lock poisoned");
        let found = self.steps(key)?;
        let victim = self.cache.get(found.ptrs[0], |n| n.next_at(0))?;
        if victim == 0 {
            return Ok(());
        }
        let victim_key = self.cache.get(victim, |n| n.key().to_vec())?;
        if victim_key != key {
            return Ok(());
        }

        for level in 0..STEPS {
            let ptr = found.ptrs[level];
            let at_level = self.cache.get(ptr, |n| n.next_at(level))?;
            if at_level == victim {
                let victim_next = self.cache.get(victim, |n| n.next_at(level))?;
                self.cache.get(ptr, |n| n.set_next_at(level, victim_next))?;
            }
        }
        self.cache.flush()?;
        self.cache.delete(victim)?;
        self.dm.commit()?;
        tracing::debug!(victim, "deleted skip-list node");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_alloc::{AllocatorConfig, SlabAllocator};
    use stratum_io::MemoryFile;
    use stratum_journal::JournaledFile;
    use stratum_pool::BufferPool;

    fn list() -> SkipList<MemoryFile, MemoryFile, SlabAllocator<MemoryFile>> {
        let raw = Arc::new(MemoryFile::new());
        let journaled = Arc::new(
            JournaledFile::open(raw.clone(), MemoryFile::new(), BufferPool::new()).unwrap(),
        );
        let alloc = SlabAllocator::open(raw.clone(), AllocatorConfig::default()).unwrap();
        let dm = Arc::new(DataManager::new(raw, journaled, alloc).unwrap());
        SkipList::create(dm, CacheConfig::default(), BufferPool::new()).unwrap()
    }

    #[test]
    fn insert_lookup_delete_round_trip() {
        let l = list();
        l.insert(b"a", 1).unwrap();
        l.insert(b"c", 3).unwrap();
        l.insert(b"b", 2).unwrap();

        assert_eq!(l.lookup(b"b").unwrap(), Some(2));
        assert_eq!(l.lookup(b"d").unwrap(), None);

        l.delete(b"c").unwrap();
        assert_eq!(l.lookup(b"c").unwrap(), None);
        assert_eq!(l.lookup(b"a").unwrap(), Some(1));
    }

    #[test]
    fn duplicate_insert_fails_with_exists() {
        let l = list();
        l.insert(b"a", 1).unwrap();
        assert!(matches!(l.insert(b"a", 2), Err(SkipListError::Exists)));
    }

    #[test]
    fn delete_of_missing_key_is_a_no_op() {
        let l = list();
        l.insert(b"a", 1).unwrap();
        l.delete(b"nope").unwrap();
        assert_eq!(l.lookup(b"a").unwrap(), Some(1));
    }

    #[test]
    fn level_zero_is_strictly_increasing_across_many_inserts() {
        let l = list();
        let mut keys: Vec<u32> = (0..200).collect();
        // Deterministic shuffle so insertion order differs from key order.
        keys.sort_by_key(|k| k.wrapping_mul(2654435761));
        for k in &keys {
            l.insert(&k.to_be_bytes(), *k as u64).unwrap();
        }

        let mut cur = l.head;
        let mut seen = Vec::new();
        let mut guard = 0;
        loop {
            let next = l.cache.get(cur, |n| n.next_at(0)).unwrap();
            if next == 0 {
                break;
            }
            let key = l.cache.get(next, |n| n.key().to_vec()).unwrap();
            seen.push(key);
            cur = next;
            guard += 1;
            assert!(guard <= keys.len() + 1, "cycle guard tripped");
        }
        assert_eq!(seen.len(), keys.len());
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted, "level 0 must be strictly increasing");
    }

    #[test]
    fn every_node_reachable_above_level_zero_is_reachable_at_level_zero() {
        let l = list();
        for k in 0u32..300 {
            l.insert(&k.to_be_bytes(), k as u64).unwrap();
        }

        let mut at_zero = std::collections::HashSet::new();
        let mut cur = l.head;
        loop {
            let next = l.cache.get(cur, |n| n.next_at(0)).unwrap();
            if next == 0 {
                break;
            }
            at_zero.insert(next);
            cur = next;
        }

        for level in 1..STEPS {
            let mut cur = l.head;
            loop {
                let next = l.cache.get(cur, |n| n.next_at(level)).unwrap();
                if next == 0 {
                    break;
                }
                assert!(
                    at_zero.contains(&next),
                    "node at level {level} missing from level 0"
                );
                cur = next;
            }
        }
    }
}
