//! Append-only chain of work items with a two-word `{first, last}` head.
//!
//! # Design Rules
//!
//! 1. Every mutating primitive runs a read phase (under the list lock),
//!    then a write phase (list lock + data-manager lock, the latter held
//!    implicitly by the data manager itself), then a single `commit`.
//! 2. The head record is always the last thing written before commit --
//!    if a crash lands between the element writes and the head write, the
//!    new run is simply unreachable garbage, never a dangling pointer.
//! 3. The final carved extent's capacity is `usable_size - 16`, not the
//!    raw `usable_size` -- the corrected invariant this spec calls for.

use std::sync::{Arc, Mutex};

use stratum_alloc::Allocator;
use stratum_cache::{CacheConfig, NodeCache};
use stratum_io::{RandomAccessFile, WalFile};
use stratum_journal::DataManager;
use stratum_pool::BufferPool;

use crate::element::Element;
use crate::error::BlockListResult;

const HEADER_LEN: u64 = 16;
const CLASS_TOTAL_SIZES: [u64; 4] = [0x80000, 0x40000, 0x20000, 0x10000];

/// A deletable, append-only linked list of free-work records.
///
/// Identified solely by its head offset -- the same convention the skip
/// list uses for its head node.
pub struct BlockList<F: RandomAccessFile, W: WalFile, A: Allocator> {
    dm: Arc<DataManager<F, W, A>>,
    elements: Arc<NodeCache<Element, F, W, A>>,
    lock: Mutex<()>,
}

impl<F: RandomAccessFile, W: WalFile, A: Allocator> BlockList<F, W, A> {
    pub fn new(dm: Arc<DataManager<F, W, A>>, cache_config: CacheConfig, pool: BufferPool) -> Self {
        let elements = Arc::new(NodeCache::new(dm.clone(), cache_config, false, pool));
        BlockList {
            dm,
            elements,
            lock: Mutex::new(()),
        }
    }

    fn read_head(&self, head: u64) -> BlockListResult<(u64, u64)> {
        let mut buf = [0u8; 16];
        self.dm.rollback_file().read_at(&mut buf, head)?;
        let first = u64::from_be_bytes(buf[0..8].try_into().unwrap());
        let last = u64::from_be_bytes(buf[8..16].try_into().unwrap());
        Ok((first, last))
    }

    fn write_head(&self, head: u64, first: u64, last: u64) -> BlockListResult<()> {
        let mut buf = [0u8; 16];
        buf[0..8].copy_from_slice(&first.to_be_bytes());
        buf[8..16].copy_from_slice(&last.to_be_bytes());
        self.dm.rollback_file().write_at(&buf, head)?;
        Ok(())
    }

    /// Allocate a fresh, empty list head and return its offset.
    pub fn new_list_head(&self) -> BlockListResult<u64> {
        let _guard = self.lock.lock().expect("lock poisoned");
        let off = self.dm.alloc(HEADER_LEN)?;
        self.write_head(off, 0, 0)?;
        self.dm.commit()?;
        tracing::debug!(off, "allocated new block-list head");
        Ok(off)
    }

    /// Carve `n_bytes` of payload capacity into a sequence of
    /// `(offset, capacity)` extents, preferring the largest class that
    /// still fits the remainder before falling back to one final
    /// exact-fit extent. Does not link or splice anything; pair with
    /// [`Self::chainify`].
    pub fn allocate_chain(&self, n_bytes: u64) -> BlockListResult<Vec<(u64, u64)>> {
        let mut remaining = n_bytes;
        let mut out = Vec::new();
        while remaining > 0 {
            let class_payload = CLASS_TOTAL_SIZES
                .iter()
                .copied()
                .find(|&class| remaining >= class - HEADER_LEN);
            let request = class_payload
                .map(|class| class - HEADER_LEN)
                .unwrap_or(remaining);
            let off = self.dm.alloc(request)?;
            let usable = self.dm.usable_size(off)?;
            let capacity = usable.saturating_sub(HEADER_LEN);
            tracing::debug!(off, request, usable, capacity, "carved block-list extent");
            out.push((off, capacity));
            remaining = remaining.saturating_sub(capacity);
        }
        Ok(out)
    }

    /// Link `extents` into a new run and splice it at the front of
    /// `head`'s list. If the list was empty, the new run becomes the
    /// whole list and its own tail is flagged last-in-chain; otherwise
    /// the run is prepended and the existing tail pointer is preserved.
    pub fn chainify(&self, head: u64, extents: &[(u64, u64)]) -> BlockListResult<()> {
        if extents.is_empty() {
            return Ok(());
        }
        let _guard = self.lock.lock().expect("lock poisoned");
        let (old_first, old_last) = self.read_head(head)?;

        let n = extents.len();
        for (i, &(off, capacity)) in extents.iter().enumerate() {
            let next = if i + 1 < n { extents[i + 1].0 } else { old_first };
            let mut elem = Element::new(capacity as u32);
            elem.set_next(next);
            elem.set_last_in_chain(i + 1 == n && old_first == 0);
            self.elements.put(off, elem)?;
        }
        self.elements.flush()?;

        let new_first = extents[0].0;
        let new_last = if old_first == 0 {
            extents[n - 1].0
        } else {
            old_last
        };
        self.write_head(head, new_first, new_last)?;
        self.dm.commit()?;
        Ok(())
    }

    /// Concatenate list `b` onto list `a` by pointer surgery and reset
    /// `b`'s head to empty. If `a` is empty, `b`'s head is copied into
    /// `a` outright.
    pub fn append_and_free(&self, head_a: u64, head_b: u64) -> BlockListResult<()> {
        let _guard = self.lock.lock().expect("lock poisoned");
        let (a_first, a_last) = self.read_head(head_a)?;
        let (b_first, b_last) = self.read_head(head_b)?;
        if b_first == 0 {
            return Ok(());
        }

        if a_first == 0 {
            self.write_head(head_a, b_first, b_last)?;
        } else {
            self.elements.get(a_last, |e| {
                e.set_next(b_first);
                e.set_last_in_chain(false);
            })?;
            self.elements.flush()?;
            self.write_head(head_a, a_first, b_last)?;
        }
        self.write_head(head_b, 0, 0)?;
        self.dm.commit()?;
        Ok(())
    }

    /// Read up to `max` element offsets starting at `head.first`,
    /// advancing `head.first` past them. Leaves the elements themselves
    /// in place -- use [`Self::drain_and_free`] to reclaim them too.
    pub fn drain(&self, head: u64, max: usize) -> BlockListResult<Vec<u64>> {
        let _guard = self.lock.lock().expect("lock poisoned");
        let (first, last) = self.read_head(head)?;
        let mut out = Vec::new();
        let mut cur = first;
        while cur != 0 && out.len() < max {
            out.push(cur);
            cur = self.elements.get(cur, |e| e.next())?;
        }
        if !out.is_empty() {
            if cur == 0 {
                self.write_head(head, 0, 0)?;
            } else {
                self.write_head(head, cur, last)?;
            }
            self.dm.commit()?;
        }
        Ok(out)
    }

    /// Like [`Self::drain`], but also frees each drained element through
    /// the allocator and invokes `freed_callback` with the total
    /// `capacity + 16` bytes reclaimed across the whole batch.
    pub fn drain_and_free(
        &self,
        head: u64,
        max: usize,
        freed_callback: impl FnOnce(u64),
    ) -> BlockListResult<Vec<u64>> {
        let _guard = self.lock.lock().expect("lock poisoned");
        let (first, last) = self.read_head(head)?;
        let mut out = Vec::new();
        let mut reclaimed: u64 = 0;
        let mut cur = first;
        while cur != 0 && out.len() < max {
            let (next, capacity) = self.elements.get(cur, |e| (e.next(), e.capacity()))?;
            out.push(cur);
            reclaimed += capacity as u64 + HEADER_LEN;
            cur = next;
        }
        if !out.is_empty() {
            if cur == 0 {
                self.write_head(head, 0, 0)?;
            } else {
                self.write_head(head, cur, last)?;
            }
            for &off in &out {
                self.elements.delete(off)?;
            }
            self.dm.commit()?;
            freed_callback(reclaimed);
        }
        Ok(out)
    }
}
