//! Random-access file and WAL-target contracts, with reference
//! implementations: an OS-file backend, an in-memory backend usable for
//! tests and crash-injection, and an in-place WAL that reuses a region of
//! an existing file instead of requiring a second file descriptor.
//!
//! # Design Rules
//!
//! 1. `RandomAccessFile` is positional -- every call carries its own
//!    offset, so callers never share a cursor.
//! 2. `WalFile` is a stream -- the overlay codec always rewinds before a
//!    dump or load, so read/write/seek/truncate is all it needs.
//! 3. Offset 0 is reserved as the null offset throughout this workspace;
//!    this crate does not itself enforce that (it has no notion of
//!    "allocations"), but every consumer does.

pub mod error;
pub mod inplace_wal;
pub mod memory;
pub mod os_file;
pub mod traits;

pub use error::{IoError, IoResult};
pub use inplace_wal::InplaceWalFile;
pub use memory::MemoryFile;
pub use os_file::{OsFile, OsWalFile};
pub use traits::{FileStat, RandomAccessFile, ReadOutcome, WalFile};
