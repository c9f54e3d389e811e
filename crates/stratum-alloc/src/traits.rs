use stratum_io::IoResult;

/// Contract every data manager expects from its allocator.
///
/// `usable_size` may exceed the size passed to `alloc` -- callers that
/// need to know exactly how much room they have (the block cache, the
/// block list) always ask `usable_size` rather than remembering their own
/// request.
pub trait Allocator: Send + Sync {
    fn alloc(&self, size: u64) -> IoResult<u64>;
    fn free(&self, offset: u64) -> IoResult<()>;
    fn usable_size(&self, offset: u64) -> IoResult<u64>;
    fn close(&self) -> IoResult<()>;
}
