//! The on-disk node record: `STEPS` next-pointers, a content word, and a
//! length-prefixed key.

use stratum_cache::{Block, CacheError, CacheResult};

/// Maximum number of forward-pointer levels per node.
pub const STEPS: usize = 20;

const HEADER_LEN: usize = STEPS * 8 + 8 + 4;

/// A single skip-list node: `next[STEPS]`, `content`, and a byte-string key.
#[derive(Clone)]
pub struct Node {
    next: [u64; STEPS],
    content: u64,
    key: Vec<u8>,
    dirty: bool,
}

impl Node {
    /// A freshly allocated node, unlinked at every level.
    pub fn new(key: Vec<u8>, content: u64) -> Self {
        Node {
            next: [0u64; STEPS],
            content,
            key,
            dirty: true,
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn content(&self) -> u64 {
        self.content
    }

    pub fn set_content(&mut self, content: u64) {
        if self.content != content {
            self.content = content;
            self.dirty = true;
        }
    }

    pub fn next_at(&self, level: usize) -> u64 {
        self.next[level]
    }

    pub fn set_next_at(&mut self, level: usize, off: u64) {
        if self.next[level] != off {
            self.next[level] = off;
            self.dirty = true;
        }
    }

    /// The byte length this node will encode to.
    pub fn encoded_len(&self) -> u64 {
        HEADER_LEN as u64 + self.key.len() as u64
    }
}

impl Block for Node {
    fn decode(buf: &[u8]) -> CacheResult<Self> {
        if buf.len() < HEADER_LEN {
            return Err(CacheError::Decode {
                offset: 0,
                reason: "skip-list node shorter than its fixed header".into(),
            });
        }
        let mut next = [0u64; STEPS];
        for (i, slot) in next.iter_mut().enumerate() {
            let start = i * 8;
            *slot = u64::from_be_bytes(buf[start..start + 8].try_into().unwrap());
        }
        let content_off = STEPS * 8;
        let content = u64::from_be_bytes(buf[content_off..content_off + 8].try_into().unwrap());
        let key_len_off = content_off + 8;
        let key_len =
            u32::from_be_bytes(buf[key_len_off..key_len_off + 4].try_into().unwrap()) as usize;
        let key_end = HEADER_LEN + key_len;
        if buf.len() < key_end {
            return Err(CacheError::Decode {
                offset: 0,
                reason: "skip-list node key truncated".into(),
            });
        }
        Ok(Node {
            next,
            content,
            key: buf[HEADER_LEN..key_end].to_vec(),
            dirty: false,
        })
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.clear();
        for slot in &self.next {
            buf.extend_from_slice(&slot.to_be_bytes());
        }
        buf.extend_from_slice(&self.content.to_be_bytes());
        buf.extend_from_slice(&(self.key.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.key);
    }

    fn dirty(&self) -> bool {
        self.dirty
    }

    fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
