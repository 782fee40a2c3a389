//! Protocol constants and default values for filewarden.
//!
//! This module contains the lockfile protocol limits, nested-reclaim timings,
//! and on-disk artifact naming used throughout the crate.

use std::time::Duration;

// # Lockfile Protocol
// Limits for the nested-reclaim protocol

/// Maximum number of lockfiles that may exist simultaneously for one target
/// (the recursion ceiling when a scope locks a lockfile).
pub const MAX_NESTING: usize = 5;

/// Expiry written into a nested scope's lockfile so a crashed reclaimer
/// frees itself quickly.
pub const NESTED_MAX_LOCK_TIME: Duration = Duration::from_secs(10);

/// Retry delay for nested scopes. Much shorter than caller scopes: the
/// lockfile-of-a-lockfile is only ever held for a parse and an unlink.
pub const NESTED_WAIT: Duration = Duration::from_millis(100);

// # Acquisition Defaults

/// Base delay between acquisition attempts when the lock is held.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(1);

/// Jitter band applied to every acquisition sleep. The spread keeps racing
/// processes from re-colliding on each retry.
pub const JITTER_LOW: f64 = 0.6;
pub const JITTER_HIGH: f64 = 1.4;

/// Sentinel value of `free_after` meaning the lock never expires.
pub const NO_EXPIRY: f64 = -1.0;

// # Integrity Check

/// Chunk size for hashing target contents.
pub const HASH_CHUNK_BYTES: usize = 128 * 1024;

// # On-Disk Artifacts

/// Suffix appended to the target file name to form the lockfile name.
pub const LOCK_SUFFIX: &str = ".lock";

/// Suffix appended to the target file name to form the backup name.
pub const BACKUP_SUFFIX: &str = ".backup";

/// Extension of the sidecar file preserving a scope's writes when the target
/// could not be published. The full name is `<target>.__<timestamp>.result`.
pub const RESULT_SUFFIX: &str = ".result";

/// Length of the random suffix that makes shadow-file names unique.
pub const TEMP_SUFFIX_LEN: usize = 8;
