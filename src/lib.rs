//! # Filewarden
//!
//! Crash-safe cross-process file access arbitration.
//!
//! Filewarden makes read/modify/write sequences over shared files safe
//! against concurrent mutation and crashed holders, on ordinary filesystems
//! and on network filesystems where POSIX advisory locks cannot be trusted.
//! A [`ProtectedFile`] scope acquires a sidecar lockfile (with a
//! double-check against racing acquirers), stages writes on a shadow copy,
//! and at [`close`](ProtectedFile::close) either publishes the result
//! atomically or restores the original. Holders that declared a
//! `max_lock_time` and then crashed are reclaimed by the next acquirer.
//!
//! ```no_run
//! use filewarden::{AccessMode, ProtectedFile};
//! use std::io::{Read, Seek, SeekFrom, Write};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut scope = ProtectedFile::open("shared/state.json", AccessMode::ReadWrite)?;
//! let mut contents = String::new();
//! scope.read_to_string(&mut contents)?;
//! // ... compute the new document ...
//! scope.stream().set_len(0)?;
//! scope.seek(SeekFrom::Start(0))?;
//! scope.write_all(b"{\"v\": 2}")?;
//! scope.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **scope**: the protected scope itself — acquisition loop, shadow and
//!   backup staging, exit protocol, nested stale-lock reclaim
//! - **lock**: holder identity, the persisted lockfile record, ownership
//!   validation
//! - **fs**: the path backend abstraction and the shared scratch directory
//! - **hash**: chunked content hashing for corruption detection
//! - **registry**: process-global scope registry behind [`drain`]
//! - **time_source**: real and simulated clocks for expiry handling
//! - **dataset**: protected JSON document helpers

pub mod common;
pub mod dataset;
pub mod error;
pub mod fs;
pub mod hash;
pub mod lock;
pub mod registry;
pub mod scope;
pub mod time_source;

// Re-export the types most callers need
pub use error::{ProtectError, Result};
pub use fs::{LocalPath, ProtectedPath};
pub use registry::drain;
pub use scope::{AccessMode, ExitOutcome, ProtectOptions, ProtectedFile};

#[cfg(feature = "testing-support")]
pub use scope::testing;
