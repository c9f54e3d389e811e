/// Tunables for [`crate::slab::SlabAllocator`].
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// Size classes the allocator rounds requests up to, ascending.
    /// Matches the block list's own ladder by default: a request larger
    /// than every configured class falls back to an exact-fit allocation
    /// that is never returned to a free list.
    pub size_classes: Vec<u64>,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        AllocatorConfig {
            size_classes: vec![0x10000, 0x20000, 0x40000, 0x80000],
        }
    }
}
