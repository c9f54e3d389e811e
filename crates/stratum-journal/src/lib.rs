//! Journaled random-access file and the data manager built on top of it.
//!
//! # Design Rules
//!
//! 1. A commit is: dump overlay to WAL, apply overlay to the primary
//!    file, truncate the WAL, clear the overlay -- in that order, and
//!    never partially.
//! 2. `DirectFile` bypasses the overlay entirely; `RollbackFile` always
//!    observes uncommitted writes. Never confuse the two inside the same
//!    read path.
//! 3. Lock order is always the caller's own lock before the data
//!    manager's -- see the workspace-level concurrency notes in `stratum`.

pub mod data_manager;
pub mod error;
pub mod journaled_file;

pub use data_manager::{DataManager, DirectFile, RollbackFile};
pub use error::{JournalError, JournalResult};
pub use journaled_file::JournaledFile;
