//! Lockfile primitives: holder identity, the persisted record, and
//! ownership validation.
//!
//! A lockfile is a sidecar `<target>.lock` whose existence signals a held
//! scope and whose JSON contents identify the holder. Existence alone is not
//! enough to claim ownership: on filesystems without reliable
//! create-exclusive semantics two racing processes can both "create" the
//! file, so every acquisition re-reads the record after a jittered delay and
//! only proceeds if the full identity matches. The acquisition loop itself
//! lives in [`scope`](crate::scope); this module provides the pieces it
//! validates against.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};

use rand::Rng;

use crate::common::constants::NO_EXPIRY;
use crate::fs::ProtectedPath;
use crate::time_source;

/// Unique identity of one scope within one process on one host.
///
/// `pid` and `machine` identify the process; `ran` disambiguates lockfiles
/// left behind by earlier, crashed scopes of the same process (PIDs get
/// recycled, nonces do not).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeIdentity {
    pub pid: u32,
    pub ran: u64,
    pub machine: String,
}

impl ScopeIdentity {
    /// Generate the identity for a new scope.
    pub fn generate() -> Self {
        Self {
            pid: std::process::id(),
            ran: rand::thread_rng().r#gen::<u64>(),
            machine: gethostname::gethostname().to_string_lossy().into_owned(),
        }
    }
}

/// The persisted lockfile payload.
///
/// `free_after` is `-1` for "no expiry", otherwise an absolute epoch-seconds
/// deadline after which any acquirer may preempt the lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockRecord {
    pub pid: u32,
    pub ran: u64,
    pub machine: String,
    pub free_after: f64,
}

impl LockRecord {
    pub fn new(identity: &ScopeIdentity, max_lock_time: Option<f64>) -> Self {
        let free_after = match max_lock_time {
            Some(secs) => time_source::now_secs() + secs,
            None => NO_EXPIRY,
        };
        Self {
            pid: identity.pid,
            ran: identity.ran,
            machine: identity.machine.clone(),
            free_after,
        }
    }

    /// Whether this record was written by `identity`.
    pub fn matches(&self, identity: &ScopeIdentity) -> bool {
        self.pid == identity.pid && self.ran == identity.ran && self.machine == identity.machine
    }

    /// Whether the holder's declared deadline has passed.
    pub fn expired(&self, now_secs: f64) -> bool {
        self.free_after > 0.0 && self.free_after < now_secs
    }
}

/// Open `lockpath` with create-exclusive semantics.
///
/// `AlreadyExists` means another holder (or a stale lockfile) is present;
/// `PermissionDenied` may trigger the elevated-credentials fallback.
pub fn create_exclusive(lockpath: &dyn ProtectedPath) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    lockpath.open(&options)
}

/// Serialize `record` into an already-open lockfile handle.
pub fn write_record(file: &mut File, record: &LockRecord) -> io::Result<()> {
    serde_json::to_writer(&mut *file, record).map_err(io::Error::other)?;
    file.flush()
}

/// Read and parse the record held in `lockpath`.
///
/// Any failure (missing file, half-written JSON, wrong shape) returns
/// `None`: a record we cannot parse is a record that is not ours, and the
/// caller retries.
pub fn read_record(lockpath: &dyn ProtectedPath) -> Option<LockRecord> {
    let mut options = OpenOptions::new();
    options.read(true);
    let file = lockpath.open(&options).ok()?;
    serde_json::from_reader(file).ok()
}

/// Validate that `lockpath` still holds `identity`'s record.
///
/// Logs a warning when the record is ours but its deadline has elapsed:
/// the scope overran its declared `max_lock_time` and survived only because
/// nobody preempted it in the meantime.
pub fn lock_is_ours(lockpath: &dyn ProtectedPath, identity: &ScopeIdentity) -> bool {
    let Some(record) = read_record(lockpath) else {
        return false;
    };
    if !record.matches(identity) {
        return false;
    }
    let now = time_source::now_secs();
    if record.expired(now) {
        log::warn!(
            "scope on {} ran {:.0}s past its declared max lock time without being preempted",
            lockpath.as_path().display(),
            now - record.free_after,
        );
    }
    true
}

/// Remove the lockfile if it is present.
///
/// Tolerant of absence: the reclaim protocol may already have deleted an
/// expired lockfile out from under us.
pub fn release_lock(lockpath: &dyn ProtectedPath) {
    if lockpath.is_file() {
        if let Err(e) = lockpath.unlink() {
            log::warn!(
                "failed to remove lockfile {}: {}",
                lockpath.as_path().display(),
                e
            );
        }
    }
}
