//! A size-classed slab allocator over a random-access file.
//!
//! Requests are rounded up to the smallest configured class that fits;
//! each class keeps its own free list of previously-freed offsets, and new
//! slabs are bump-allocated from the file's current end when a class's
//! free list is empty. A request larger than every configured class is
//! satisfied as an exact-fit allocation that is never pooled.
//!
//! The allocation table -- the bump pointer plus every live and freed
//! offset's class -- lives in a fixed-size header region at the start of
//! the file (offset 0, the same offset every other index structure treats
//! as the reserved null pointer), so a reopened file reconstructs exactly
//! the heap layout a prior run left behind rather than just its length.
//! The header uses the same 8-byte used-length prefix convention as
//! [`stratum_io::InplaceWalFile`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use stratum_io::{IoError, IoResult, RandomAccessFile};

use crate::config::AllocatorConfig;
use crate::traits::Allocator;

const HEADER_OFFSET: u64 = 0;
const HEADER_PREFIX_LEN: u64 = 8;
/// Total size of the reserved header region, prefix included. The heap
/// proper starts immediately after it.
const HEADER_RESERVED_LEN: u64 = 0x10000;

#[derive(Serialize, Deserialize)]
struct SlabTable {
    next_offset: u64,
    /// `(offset, class, allocated)` for every offset the allocator has
    /// ever handed out and not forgotten. `allocated = false` means the
    /// offset sits in that class's free list.
    entries: Vec<(u64, u64, bool)>,
}

pub struct SlabAllocator<F: RandomAccessFile> {
    file: Arc<F>,
    classes: Vec<u64>,
    free_lists: Mutex<HashMap<u64, Vec<u64>>>,
    allocations: Mutex<HashMap<u64, u64>>,
    next_offset: AtomicU64,
}

impl<F: RandomAccessFile> SlabAllocator<F> {
    /// Open an allocator over `file`. If the header region already holds a
    /// persisted table (a non-empty used-length prefix), the heap layout
    /// -- bump pointer, live allocations, and free lists -- is restored
    /// from it exactly; otherwise a fresh table is created with the heap
    /// starting right after the reserved header region.
    pub fn open(file: Arc<F>, config: AllocatorConfig) -> IoResult<Self> {
        let mut classes = config.size_classes;
        classes.sort_unstable();

        let table = read_table(&*file)?;
        let (next_offset, allocations, free_lists) = match table {
            Some(table) => {
                let mut allocations = HashMap::new();
                let mut free_lists: HashMap<u64, Vec<u64>> = HashMap::new();
                for (offset, class, allocated) in table.entries {
                    if allocated {
                        allocations.insert(offset, class);
                    } else {
                        free_lists.entry(class).or_default().push(offset);
                    }
                }
                (table.next_offset, allocations, free_lists)
            }
            None => (HEADER_RESERVED_LEN, HashMap::new(), HashMap::new()),
        };

        let alloc = SlabAllocator {
            file,
            classes,
            free_lists: Mutex::new(free_lists),
            allocations: Mutex::new(allocations),
            next_offset: AtomicU64::new(next_offset),
        };
        alloc.persist_table()?;
        Ok(alloc)
    }

    fn class_for(&self, size: u64) -> u64 {
        self.classes
            .iter()
            .copied()
            .find(|&c| c >= size)
            .unwrap_or(size)
    }

    fn bump(&self, class: u64) -> u64 {
        self.next_offset.fetch_add(class, Ordering::SeqCst)
    }

    /// Serialize the current table and write it into the header region.
    fn persist_table(&self) -> IoResult<()> {
        let allocations = self.allocations.lock().expect("lock poisoned");
        let free_lists = self.free_lists.lock().expect("lock poisoned");
        let mut entries = Vec::with_capacity(allocations.len() + free_lists.values().map(Vec::len).sum::<usize>());
        for (&offset, &class) in allocations.iter() {
            entries.push((offset, class, true));
        }
        for (&class, offsets) in free_lists.iter() {
            for &offset in offsets {
                entries.push((offset, class, false));
            }
        }
        let table = SlabTable {
            next_offset: self.next_offset.load(Ordering::SeqCst),
            entries,
        };
        drop(free_lists);
        drop(allocations);

        let payload = bincode::serialize(&table).map_err(to_io)?;
        let capacity = HEADER_RESERVED_LEN - HEADER_PREFIX_LEN;
        if payload.len() as u64 > capacity {
            return Err(IoError::NoSpace {
                requested: payload.len() as u64,
                capacity,
            });
        }
        self.file
            .write_at(&(payload.len() as u64).to_be_bytes(), HEADER_OFFSET)?;
        self.file
            .write_at(&payload, HEADER_OFFSET + HEADER_PREFIX_LEN)?;
        Ok(())
    }
}

impl<F: RandomAccessFile> Allocator for SlabAllocator<F> {
    fn alloc(&self, size: u64) -> IoResult<u64> {
        let class = self.class_for(size);
        let reused = {
            let mut free_lists = self.free_lists.lock().expect("lock poisoned");
            free_lists.get_mut(&class).and_then(Vec::pop)
        };
        let offset = reused.unwrap_or_else(|| self.bump(class));
        self.allocations
            .lock()
            .expect("lock poisoned")
            .insert(offset, class);
        self.persist_table()?;
        tracing::debug!(offset, size, class, "allocated slab");
        Ok(offset)
    }

    fn free(&self, offset: u64) -> IoResult<()> {
        let class = self
            .allocations
            .lock()
            .expect("lock poisoned")
            .remove(&offset);
        if let Some(class) = class {
            self.free_lists
                .lock()
                .expect("lock poisoned")
                .entry(class)
                .or_default()
                .push(offset);
            self.persist_table()?;
        }
        Ok(())
    }

    fn usable_size(&self, offset: u64) -> IoResult<u64> {
        Ok(self
            .allocations
            .lock()
            .expect("lock poisoned")
            .get(&offset)
            .copied()
            .unwrap_or(0))
    }

    fn close(&self) -> IoResult<()> {
        Ok(())
    }
}

/// Read the header's used-length prefix and, if non-zero, decode the
/// table it names. A fresh (all-zero) region decodes as `None`.
fn read_table<F: RandomAccessFile>(file: &F) -> IoResult<Option<SlabTable>> {
    let size = file.stat()?.size;
    if size < HEADER_OFFSET + HEADER_PREFIX_LEN {
        return Ok(None);
    }
    let mut prefix = [0u8; 8];
    file.read_at(&mut prefix, HEADER_OFFSET)?;
    let used_len = u64::from_be_bytes(prefix);
    if used_len == 0 {
        return Ok(None);
    }
    let mut payload = vec![0u8; used_len as usize];
    file.read_at(&mut payload, HEADER_OFFSET + HEADER_PREFIX_LEN)?;
    let table: SlabTable = bincode::deserialize(&payload).map_err(to_io)?;
    Ok(Some(table))
}

fn to_io(e: bincode::Error) -> IoError {
    IoError::Underlying(std::io::Error::new(std::io::ErrorKind::Other, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_io::MemoryFile;

    fn allocator() -> SlabAllocator<MemoryFile> {
        SlabAllocator::open(Arc::new(MemoryFile::new()), AllocatorConfig::default()).unwrap()
    }

    #[test]
    fn alloc_never_returns_offset_zero() {
        let alloc = allocator();
        for _ in 0..4 {
            assert_ne!(alloc.alloc(10).unwrap(), 0);
        }
    }

    #[test]
    fn usable_size_rounds_up_to_class() {
        let alloc = allocator();
        let off = alloc.alloc(100).unwrap();
        assert_eq!(alloc.usable_size(off).unwrap(), 0x10000);
    }

    #[test]
    fn freed_offset_is_reused_by_next_same_class_alloc() {
        let alloc = allocator();
        let a = alloc.alloc(10).unwrap();
        alloc.free(a).unwrap();
        let b = alloc.alloc(10).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn oversized_request_gets_exact_fit_and_is_never_pooled() {
        let alloc = allocator();
        let huge = 0x80000 * 4;
        let a = alloc.alloc(huge).unwrap();
        assert_eq!(alloc.usable_size(a).unwrap(), huge);
        alloc.free(a).unwrap();
        let b = alloc.alloc(huge).unwrap();
        assert_ne!(a, b, "exact-fit allocations are not pooled");
    }

    #[test]
    fn distinct_classes_do_not_share_free_offsets() {
        let alloc = allocator();
        let small = alloc.alloc(10).unwrap();
        alloc.free(small).unwrap();
        let big = alloc.alloc(0x20000).unwrap();
        assert_ne!(small, big);
    }

    #[test]
    fn reopening_the_file_restores_the_heap_layout() {
        let file = Arc::new(MemoryFile::new());
        let (a, b) = {
            let alloc = SlabAllocator::open(file.clone(), AllocatorConfig::default()).unwrap();
            let a = alloc.alloc(10).unwrap();
            let b = alloc.alloc(10).unwrap();
            alloc.free(a).unwrap();
            (a, b)
        };

        let reopened = SlabAllocator::open(file.clone(), AllocatorConfig::default()).unwrap();
        assert_eq!(
            reopened.usable_size(b).unwrap(),
            0x10000,
            "still-live allocation must resolve to the same class after reopen"
        );
        let reused = reopened.alloc(10).unwrap();
        assert_eq!(reused, a, "the freed offset must still be reusable after reopen");

        let fresh = reopened.alloc(10).unwrap();
        assert!(
            fresh != a && fresh != b,
            "bump pointer must not replay offsets already handed out before the restart"
        );
    }

    #[test]
    fn heap_starts_after_the_reserved_header_region() {
        let alloc = allocator();
        let off = alloc.alloc(10).unwrap();
        assert!(off >= HEADER_RESERVED_LEN);
    }
}
