//! In-memory sorted-extent write buffer.
//!
//! An [`Overlay`] buffers every write as a non-overlapping, ascending-order
//! set of byte extents plus an optional truncation sentinel. It never
//! touches a file itself beyond `apply_to`; everything else is pure
//! in-memory bookkeeping, which is what makes it possible to serialize the
//! whole thing into a write-ahead log and replay it later.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use stratum_io::RandomAccessFile;
use stratum_pool::BufferPool;

use crate::error::{OverlayError, OverlayResult};

#[derive(Serialize, Deserialize)]
struct Header {
    truncate_requested: bool,
    truncated_size: i64,
}

#[derive(Serialize, Deserialize)]
struct ExtentRecord {
    present: bool,
    offset: i64,
    bytes: Vec<u8>,
}

/// A sparse, sorted set of pending writes plus a truncation sentinel.
pub struct Overlay {
    extents: BTreeMap<u64, Vec<u8>>,
    truncate_requested: bool,
    truncated_size: u64,
    pool: BufferPool,
}

impl Default for Overlay {
    fn default() -> Self {
        Self::new(BufferPool::new())
    }
}

impl Overlay {
    pub fn new(pool: BufferPool) -> Self {
        Overlay {
            extents: BTreeMap::new(),
            truncate_requested: false,
            truncated_size: 0,
            pool,
        }
    }

    fn pooled(&self, src: &[u8]) -> Vec<u8> {
        let mut buf = self.pool.acquire(src.len());
        buf.extend_from_slice(src);
        buf
    }

    /// Buffer a write of `data` at `offset`, splicing it against any
    /// existing extents.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut off = offset;
        let mut remaining = data;

        // Pass 1: the single predecessor extent, if it overlaps.
        if let Some((&pred_off, pred_bytes)) = self.extents.range_mut(..=off).next_back() {
            let pred_end = pred_off + pred_bytes.len() as u64;
            if off < pred_end {
                let start = (off - pred_off) as usize;
                let n = ((pred_end - off) as usize).min(remaining.len());
                pred_bytes[start..start + n].copy_from_slice(&remaining[..n]);
                off += n as u64;
                remaining = &remaining[n..];
            }
        }
        if remaining.is_empty() {
            return;
        }

        // Pass 2: walk forward extents in ascending order, filling gaps and
        // overwriting overlapping prefixes.
        let keys: Vec<u64> = self.extents.range(off..).map(|(&k, _)| k).collect();
        let mut fresh: Vec<(u64, Vec<u8>)> = Vec::new();
        let mut cursor = off;
        for key in keys {
            if remaining.is_empty() {
                break;
            }
            assert!(
                key >= cursor,
                "overlay invariant violated: extent at {key} precedes write cursor {cursor}"
            );
            if key > cursor {
                let gap = ((key - cursor) as usize).min(remaining.len());
                fresh.push((cursor, self.pooled(&remaining[..gap])));
                cursor += gap as u64;
                remaining = &remaining[gap..];
                if remaining.is_empty() {
                    break;
                }
            }
            let ext_len = self.extents.get(&key).expect("key from range scan").len();
            let n = ext_len.min(remaining.len());
            let ext = self.extents.get_mut(&key).expect("key from range scan");
            ext[..n].copy_from_slice(&remaining[..n]);
            cursor += n as u64;
            remaining = &remaining[n..];
        }

        // Pass 3: whatever is left becomes a fresh tail extent.
        if !remaining.is_empty() {
            fresh.push((cursor, self.pooled(remaining)));
        }
        for (k, v) in fresh {
            self.extents.insert(k, v);
        }
    }

    /// Record a truncation to `size`, dropping or clipping extents above it.
    pub fn truncate(&mut self, size: u64) {
        let new_size = if self.truncate_requested {
            self.truncated_size.min(size)
        } else {
            size
        };
        self.truncate_requested = true;
        self.truncated_size = new_size;

        let dropped: Vec<u64> = self.extents.range(new_size..).map(|(&k, _)| k).collect();
        for k in dropped {
            if let Some(v) = self.extents.remove(&k) {
                self.pool.release(v);
            }
        }
        if let Some((&pk, pv)) = self.extents.range_mut(..new_size).next_back() {
            let pend = pk + pv.len() as u64;
            if pend > new_size {
                pv.truncate((new_size - pk) as usize);
            }
        }
    }

    /// Fill `buf` with whatever part of `[off, off + buf.len())` is covered
    /// by pending extents or implicit truncation zeros. Returns the
    /// highest filled index + 1.
    pub fn read_over_at(&self, buf: &mut [u8], off: u64) -> usize {
        let end = off + buf.len() as u64;
        let mut covered = 0usize;

        if self.truncate_requested && end > self.truncated_size {
            let zero_start = self.truncated_size.max(off);
            let rel_start = (zero_start - off) as usize;
            for b in &mut buf[rel_start..] {
                *b = 0;
            }
            covered = covered.max(buf.len());
        }

        for (&k, v) in self.extents.range(..end) {
            let vend = k + v.len() as u64;
            if vend <= off {
                continue;
            }
            let ov_start = k.max(off);
            let ov_end = vend.min(end);
            if ov_start >= ov_end {
                continue;
            }
            let rel_start = (ov_start - off) as usize;
            let rel_end = (ov_end - off) as usize;
            buf[rel_start..rel_end]
                .copy_from_slice(&v[(ov_start - k) as usize..(ov_end - k) as usize]);
            covered = covered.max(rel_end);
        }
        covered
    }

    /// Write every pending extent (and the truncation, if any) to `target`.
    pub fn apply_to<F: RandomAccessFile>(&self, target: &F) -> OverlayResult<()> {
        if self.truncate_requested {
            target.truncate(self.truncated_size)?;
        }
        for (&off, bytes) in &self.extents {
            target.write_at(bytes, off)?;
        }
        Ok(())
    }

    /// `-1` if nothing has ever forced a size; otherwise the maximum of the
    /// truncation sentinel (if set) and the highest extent end.
    pub fn current_size(&self) -> i64 {
        let mut size: i64 = -1;
        if self.truncate_requested {
            size = self.truncated_size as i64;
        }
        if let Some((&k, v)) = self.extents.iter().next_back() {
            size = size.max((k + v.len() as u64) as i64);
        }
        size
    }

    /// Serialize the overlay into the write-ahead log: a header followed by
    /// `(present, offset, bytes)` records terminated by `present = false`.
    pub fn dump_journal<W: Write>(&self, writer: &mut W) -> OverlayResult<()> {
        bincode::serialize_into(
            &mut *writer,
            &Header {
                truncate_requested: self.truncate_requested,
                truncated_size: self.truncated_size as i64,
            },
        )?;
        for (&offset, bytes) in &self.extents {
            bincode::serialize_into(
                &mut *writer,
                &ExtentRecord {
                    present: true,
                    offset: offset as i64,
                    bytes: bytes.clone(),
                },
            )?;
        }
        bincode::serialize_into(
            &mut *writer,
            &ExtentRecord {
                present: false,
                offset: 0,
                bytes: Vec::new(),
            },
        )?;
        Ok(())
    }

    /// Replace the overlay's contents with what `reader` decodes to. This
    /// is the exact inverse of `dump_journal`.
    pub fn load_journal<R: Read>(&mut self, reader: &mut R) -> OverlayResult<()> {
        for v in self.extents.drain().map(|(_, v)| v) {
            self.pool.release(v);
        }
        self.truncate_requested = false;
        self.truncated_size = 0;

        let header: Header = bincode::deserialize_from(&mut *reader)?;
        self.truncate_requested = header.truncate_requested;
        self.truncated_size = header.truncated_size.max(0) as u64;

        loop {
            let record: ExtentRecord = bincode::deserialize_from(&mut *reader)?;
            if !record.present {
                break;
            }
            let bytes = self.pooled(&record.bytes);
            self.extents.insert(record.offset.max(0) as u64, bytes);
        }
        Ok(())
    }

    /// Discard every pending extent and the truncation sentinel, returning
    /// all buffers to the pool.
    pub fn clear_journal(&mut self) {
        for v in self.extents.drain().map(|(_, v)| v) {
            self.pool.release(v);
        }
        self.truncate_requested = false;
        self.truncated_size = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.extents.is_empty() && !self.truncate_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::any;
    use stratum_io::MemoryFile;

    fn overlay() -> Overlay {
        Overlay::new(BufferPool::new())
    }

    // --- write_at splicing ---

    #[test]
    fn write_into_empty_overlay_creates_one_extent() {
        let mut o = overlay();
        o.write_at(10, b"abc");
        let mut buf = [0u8; 8];
        let filled = o.read_over_at(&mut buf, 8);
        assert_eq!(filled, 5);
        assert_eq!(&buf, &[0, 0, b'a', b'b', b'c', 0, 0, 0]);
    }

    #[test]
    fn overlapping_write_overwrites_in_place() {
        let mut o = overlay();
        o.write_at(0, &[b'A'; 4]);
        o.write_at(1, &[b'B'; 2]);
        let mut buf = [0u8; 4];
        o.read_over_at(&mut buf, 0);
        assert_eq!(&buf, b"ABBA");
    }

    #[test]
    fn write_fills_gap_between_two_extents() {
        let mut o = overlay();
        o.write_at(10, b"ABC");
        o.write_at(14, b"XY");
        let mut buf = [0u8; 8];
        let filled = o.read_over_at(&mut buf, 8);
        assert_eq!(filled, 8);
        assert_eq!(&buf, &[0, 0, b'A', b'B', b'C', 0, b'X', b'Y']);
    }

    #[test]
    fn write_spanning_multiple_extents_merges_them() {
        let mut o = overlay();
        o.write_at(0, b"11");
        o.write_at(4, b"22");
        o.write_at(0, b"aaaaaa");
        let mut buf = [0u8; 6];
        o.read_over_at(&mut buf, 0);
        assert_eq!(&buf, b"aaaaaa");
    }

    // --- truncate ---

    #[test]
    fn truncate_drops_extents_entirely_above_size() {
        let mut o = overlay();
        o.write_at(100, b"xyz");
        o.truncate(10);
        let mut buf = [1u8; 3];
        let filled = o.read_over_at(&mut buf, 100);
        assert_eq!(filled, 3, "truncated region reads as covered zeros");
        assert_eq!(&buf, &[0, 0, 0]);
    }

    #[test]
    fn truncate_clips_boundary_crossing_extent() {
        let mut o = overlay();
        o.write_at(0, b"abcdef");
        o.truncate(3);
        let mut buf = [9u8; 6];
        o.read_over_at(&mut buf, 0);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(&buf[3..], &[0, 0, 0]);
    }

    #[test]
    fn repeated_truncate_keeps_the_smaller_size() {
        let mut o = overlay();
        o.truncate(100);
        o.truncate(10);
        assert_eq!(o.current_size(), 10);
    }

    // --- current_size ---

    #[test]
    fn current_size_is_negative_one_when_untouched() {
        assert_eq!(overlay().current_size(), -1);
    }

    #[test]
    fn current_size_tracks_highest_extent_end() {
        let mut o = overlay();
        o.write_at(10, b"abcde");
        assert_eq!(o.current_size(), 15);
    }

    // --- journal round trip ---

    #[test]
    fn dump_then_load_round_trips_byte_for_byte() {
        let mut o = overlay();
        o.write_at(5, b"hello");
        o.write_at(40, b"world");
        o.truncate(1000);

        let mut wal = MemoryFile::new();
        o.dump_journal(&mut wal).unwrap();

        let mut reloaded = overlay();
        let mut cursor = std::io::Cursor::new(wal.contents());
        reloaded.load_journal(&mut cursor).unwrap();

        assert_eq!(o.current_size(), reloaded.current_size());
        let mut a = [0u8; 5];
        let mut b = [0u8; 5];
        o.read_over_at(&mut a, 5);
        reloaded.read_over_at(&mut b, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn load_journal_clears_prior_contents_first() {
        let mut o = overlay();
        o.write_at(0, b"stale");

        let mut fresh = overlay();
        fresh.write_at(100, b"fresh");
        let mut wal = MemoryFile::new();
        fresh.dump_journal(&mut wal).unwrap();

        let mut cursor = std::io::Cursor::new(wal.contents());
        o.load_journal(&mut cursor).unwrap();

        let mut buf = [0u8; 5];
        o.read_over_at(&mut buf, 0);
        assert_eq!(&buf, &[0, 0, 0, 0, 0], "stale write at 0 must be gone");
    }

    // --- apply_to ---

    #[test]
    fn apply_to_writes_extents_and_truncates_first() {
        let mut o = overlay();
        o.write_at(0, b"hello");
        o.truncate(3);

        let file = MemoryFile::new();
        file.write_at(b"XXXXXXXXXX", 0).unwrap();
        o.apply_to(&file).unwrap();

        assert_eq!(file.contents(), b"hel");
    }

    #[test]
    fn clear_journal_empties_the_overlay() {
        let mut o = overlay();
        o.write_at(0, b"data");
        o.truncate(2);
        o.clear_journal();
        assert!(o.is_empty());
        assert_eq!(o.current_size(), -1);
    }

    // --- property-based ---

    proptest::proptest! {
        #[test]
        fn non_overlapping_after_arbitrary_writes(
            writes in proptest::collection::vec((0u64..200, proptest::collection::vec(any::<u8>(), 1..20)), 0..30)
        ) {
            let mut o = overlay();
            for (off, bytes) in &writes {
                o.write_at(*off, bytes);
            }
            let mut prev_end: Option<u64> = None;
            for (&k, v) in o.extents.iter() {
                if let Some(pe) = prev_end {
                    proptest::prop_assert!(k >= pe);
                }
                prev_end = Some(k + v.len() as u64);
            }
        }
    }
}
