//! The on-disk ring node record: `next`, `prev`, `tag_len`, `content_len`
//! followed by the tag and content byte strings.

use stratum_cache::{Block, CacheError, CacheResult};

const HEADER_LEN: usize = 8 + 8 + 4 + 4;

/// A single node in a circular doubly-linked ring.
#[derive(Clone)]
pub struct RingNode {
    next: u64,
    prev: u64,
    tag: Vec<u8>,
    content: Vec<u8>,
    dirty: bool,
}

impl RingNode {
    /// A node not yet part of any ring -- `next`/`prev` are both null
    /// until [`Self::point_to_self`] or a splice sets them.
    pub fn new(tag: Vec<u8>, content: Vec<u8>) -> Self {
        RingNode {
            next: 0,
            prev: 0,
            tag,
            content,
            dirty: true,
        }
    }

    pub fn next(&self) -> u64 {
        self.next
    }

    pub fn prev(&self) -> u64 {
        self.prev
    }

    pub fn tag(&self) -> &[u8] {
        &self.tag
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn set_next(&mut self, next: u64) {
        if self.next != next {
            self.next = next;
            self.dirty = true;
        }
    }

    pub fn set_prev(&mut self, prev: u64) {
        if self.prev != prev {
            self.prev = prev;
            self.dirty = true;
        }
    }

    /// Point both `next` and `prev` at `self_off` -- the anchor
    /// convention for a freshly initialized, single-node ring.
    pub fn point_to_self(&mut self, self_off: u64) {
        self.set_next(self_off);
        self.set_prev(self_off);
    }

    /// Zero both pointers -- a removed node is not part of any ring
    /// until it is spliced back in.
    pub fn clear_links(&mut self) {
        self.set_next(0);
        self.set_prev(0);
    }

    /// The byte length this node will encode to.
    pub fn encoded_len(&self) -> u64 {
        HEADER_LEN as u64 + self.tag.len() as u64 + self.content.len() as u64
    }
}

impl Block for RingNode {
    fn decode(buf: &[u8]) -> CacheResult<Self> {
        if buf.len() < HEADER_LEN {
            return Err(CacheError::Decode {
                offset: 0,
                reason: "ring node shorter than its fixed header".into(),
            });
        }
        let next = u64::from_be_bytes(buf[0..8].try_into().unwrap());
        let prev = u64::from_be_bytes(buf[8..16].try_into().unwrap());
        let tag_len = u32::from_be_bytes(buf[16..20].try_into().unwrap()) as usize;
        let content_len = u32::from_be_bytes(buf[20..24].try_into().unwrap()) as usize;
        let tag_end = HEADER_LEN + tag_len;
        let content_end = tag_end + content_len;
        if buf.len() < content_end {
            return Err(CacheError::Decode {
                offset: 0,
                reason: "ring node tag/content truncated".into(),
            });
        }
        Ok(RingNode {
            next,
            prev,
            tag: buf[HEADER_LEN..tag_end].to_vec(),
            content: buf[tag_end..content_end].to_vec(),
            dirty: false,
        })
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.clear();
        buf.extend_from_slice(&self.next.to_be_bytes());
        buf.extend_from_slice(&self.prev.to_be_bytes());
        buf.extend_from_slice(&(self.tag.len() as u32).to_be_bytes());
        buf.extend_from_slice(&(self.content.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.tag);
        buf.extend_from_slice(&self.content);
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
        let mut n = RingNode::new(b"tag".to_vec(), b"payload".to_vec());
        n.set_next(5);
        n.set_prev(9);
        let mut buf = Vec::new();
        n.encode(&mut buf);
        assert_eq!(buf.len() as u64, n.encoded_len());

        let decoded = RingNode::decode(&buf).unwrap();
        assert_eq!(decoded.next(), 5);
        assert_eq!(decoded.prev(), 9);
        assert_eq!(decoded.tag(), b"tag");
        assert_eq!(decoded.content(), b"payload");
        assert!(!decoded.dirty());
    }

    #[test]
    fn point_to_self_sets_both_pointers() {
        let mut n = RingNode::new(Vec::new(), Vec::new());
        n.point_to_self(77);
        assert_eq!(n.next(), 77);
        assert_eq!(n.prev(), 77);
    }
}
