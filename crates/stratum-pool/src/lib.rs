//! Process-wide pool of reusable scratch buffers.
//!
//! Both the overlay (extent payloads) and the block cache (encode/decode
//! scratch space) draw their working buffers from here instead of
//! allocating fresh `Vec<u8>`s on every write or cache miss. Buffers are
//! bucketed by the next power-of-two at or above their requested length;
//! `acquire` pops from the matching bucket or allocates a new buffer when
//! the bucket is empty, `release` pushes a cleared buffer back.
//!
//! # Design Rules
//!
//! 1. `acquire`/`release` never block and never panic, including when
//!    called reentrantly from within cache eviction.
//! 2. A released buffer is truncated to zero length but keeps its
//!    capacity, so the next acquire of the same class gets a ready-to-use
//!    allocation instead of a fresh heap allocation.
//! 3. The pool has no notion of "this buffer belongs to you" -- callers
//!    that need exclusive ownership across an await point (there are
//!    none in this crate) must not share a pool handle.

use std::sync::Arc;

use crossbeam_queue::SegQueue;

const NUM_CLASSES: usize = 32; // covers 2^0 ..= 2^31 bytes, more than enough for any extent.

/// A single bucket of same-capacity-class buffers.
#[derive(Default)]
struct Bucket {
    queue: SegQueue<Vec<u8>>,
}

/// A process-wide pool of reusable byte buffers.
///
/// Cheaply cloneable; all clones share the same underlying buckets.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<[Bucket; NUM_CLASSES]>,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool {
    pub fn new() -> Self {
        let buckets: Vec<Bucket> = (0..NUM_CLASSES).map(|_| Bucket::default()).collect();
        let buckets: [Bucket; NUM_CLASSES] = buckets
            .try_into()
            .unwrap_or_else(|_| unreachable!("fixed-size collect"));
        BufferPool {
            inner: Arc::new(buckets),
        }
    }

    /// Acquire a buffer with at least `min_len` bytes of capacity, empty (length 0).
    pub fn acquire(&self, min_len: usize) -> Vec<u8> {
        let class = size_class(min_len);
        if let Some(bucket) = self.inner.get(class) {
            if let Some(mut buf) = bucket.queue.pop() {
                buf.clear();
                return buf;
            }
        }
        tracing::debug!(min_len, class, "buffer pool miss, allocating fresh buffer");
        Vec::with_capacity(class_capacity(class).max(min_len))
    }

    /// Return a buffer to the pool for reuse. The buffer is cleared but its
    /// capacity is retained.
    pub fn release(&self, mut buf: Vec<u8>) {
        if buf.capacity() == 0 {
            return;
        }
        buf.clear();
        let class = size_class(buf.capacity());
        if let Some(bucket) = self.inner.get(class) {
            bucket.queue.push(buf);
        }
        // A capacity larger than our largest class is simply dropped -- it
        // would never be reused at that size anyway.
    }
}

fn size_class(len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    (usize::BITS - (len - 1).leading_zeros()) as usize
}

fn class_capacity(class: usize) -> usize {
    1usize << class.min(NUM_CLASSES - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_gives_empty_buffer_with_enough_capacity() {
        let pool = BufferPool::new();
        let buf = pool.acquire(100);
        assert_eq!(buf.len(), 0);
        assert!(buf.capacity() >= 100);
    }

    #[test]
    fn release_then_acquire_reuses_allocation() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire(64);
        buf.extend_from_slice(&[1, 2, 3]);
        let cap = buf.capacity();
        pool.release(buf);

        let reused = pool.acquire(64);
        assert_eq!(reused.len(), 0);
        assert_eq!(reused.capacity(), cap);
    }

    #[test]
    fn size_classes_round_up() {
        assert_eq!(size_class(0), 0);
        assert_eq!(size_class(1), 0);
        assert_eq!(size_class(2), 1);
        assert_eq!(size_class(3), 2);
        assert_eq!(size_class(4), 2);
        assert_eq!(size_class(1000), 10);
    }

    #[test]
    fn release_of_zero_capacity_buffer_is_a_no_op() {
        let pool = BufferPool::new();
        pool.release(Vec::new());
        // Should not panic, and should not show up on a later acquire of size 0.
        let buf = pool.acquire(0);
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn clone_shares_the_same_buckets() {
        let pool = BufferPool::new();
        let clone = pool.clone();
        pool.release(vec![0u8; 16]);
        let reused = clone.acquire(16);
        assert!(reused.capacity() >= 16);
    }
}
