use crate::error::CacheResult;

/// The capability set a type must offer to live inside a [`crate::cache::NodeCache`].
///
/// Implementors track their own dirty bit: it starts clear on `decode`,
/// flips to set whenever the caller mutates the value (via whatever
/// domain-specific setters the type exposes), and is cleared again by
/// `mark_clean`, which the cache calls immediately after a successful
/// write-back or `flush`.
pub trait Block: Send + 'static {
    /// Decode a fresh value from bytes just read from storage.
    fn decode(buf: &[u8]) -> CacheResult<Self>
    where
        Self: Sized;

    /// Encode the value's current state into `buf` (which is cleared
    /// first).
    fn encode(&self, buf: &mut Vec<u8>);

    /// Whether this value has changed since the last decode/encode.
    fn dirty(&self) -> bool;

    /// Clear the dirty bit after a successful write-back.
    fn mark_clean(&mut self);
}
