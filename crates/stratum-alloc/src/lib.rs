//! Allocator contract and a size-classed slab allocator reference
//! implementation.
//!
//! # Design Rules
//!
//! 1. Offset 0 is never allocated; it is the reserved null offset used
//!    throughout this workspace.
//! 2. `usable_size` is the allocator's own truth about a slot's capacity
//!    -- never reconstruct it from the originally requested size.

pub mod config;
pub mod slab;
pub mod traits;

pub use config::AllocatorConfig;
pub use slab::SlabAllocator;
pub use traits::Allocator;
