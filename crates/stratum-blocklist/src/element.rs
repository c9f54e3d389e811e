//! The on-disk element record: `{next, capacity, length_and_flag}` header
//! followed by `capacity` payload bytes.

use stratum_cache::{Block, CacheError, CacheResult};

const HEADER_LEN: usize = 16;

/// A single work item in a block-list run.
#[derive(Clone)]
pub struct Element {
    next: u64,
    capacity: u32,
    length: u32,
    last_in_chain: bool,
    payload: Vec<u8>,
    dirty: bool,
}

impl Element {
    /// A freshly carved element, zero-filled, not yet linked.
    pub fn new(capacity: u32) -> Self {
        Element {
            next: 0,
            capacity,
            length: 0,
            last_in_chain: false,
            payload: vec![0u8; capacity as usize],
            dirty: true,
        }
    }

    pub fn next(&self) -> u64 {
        self.next
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn set_next(&mut self, next: u64) {
        if self.next != next {
            self.next = next;
            self.dirty = true;
        }
    }

    pub fn set_last_in_chain(&mut self, last: bool) {
        if self.last_in_chain != last {
            self.last_in_chain = last;
            self.dirty = true;
        }
    }
}

impl Block for Element {
    fn decode(buf: &[u8]) -> CacheResult<Self> {
        if buf.len() < HEADER_LEN {
            return Err(CacheError::Decode {
                offset: 0,
                reason: "block-list element shorter than its 16-byte header".into(),
            });
        }
        let next = u64::from_be_bytes(buf[0..8].try_into().unwrap());
        let capacity = u32::from_be_bytes(buf[8..12].try_into().unwrap());
        let packed = u32::from_be_bytes(buf[12..16].try_into().unwrap());
        let last_in_chain = packed & 1 != 0;
        let length = packed >> 1;
        let payload_end = HEADER_LEN + capacity as usize;
        if buf.len() < payload_end {
            return Err(CacheError::Decode {
                offset: 0,
                reason: "block-list element payload truncated".into(),
            });
        }
        Ok(Element {
            next,
            capacity,
            length,
            last_in_chain,
            payload: buf[HEADER_LEN..payload_end].to_vec(),
            dirty: false,
        })
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.clear();
        buf.extend_from_slice(&self.next.to_be_bytes());
        buf.extend_from_slice(&self.capacity.to_be_bytes());
        let packed = (self.length << 1) | (self.last_in_chain as u32);
        buf.extend_from_slice(&packed.to_be_bytes());
        buf.extend_from_slice(&self.payload);
    }

    fn dirty(&self) -> bool {
        self.dirty
    }

    fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let mut e = Element::new(8);
        e.set_next(42);
        e.set_last_in_chain(true);
        let mut buf = Vec::new();
        e.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_LEN + 8);

        let decoded = Element::decode(&buf).unwrap();
        assert_eq!(decoded.next(), 42);
        assert_eq!(decoded.capacity(), 8);
        assert!(decoded.last_in_chain);
        assert!(!decoded.dirty());
    }

    #[test]
    fn decode_rejects_truncated_header() {
        assert!(Element::decode(&[0u8; 4]).is_err());
    }
}
