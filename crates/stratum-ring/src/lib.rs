//! Circular doubly-linked list of tagged byte records, built on the same
//! block cache the skip list uses, for structures that need stable-offset
//! neighbor links instead of ordered search.
//!
//! # Design Rules
//!
//! 1. A ring always has at least its anchor, which `remove` never frees.
//! 2. All navigation goes through the cache so splices participate in
//!    commit, exactly as the skip list requires.

pub mod error;
pub mod node;
pub mod ring;

pub use error::{RingError, RingResult};
pub use node::RingNode;
pub use ring::Ring;
