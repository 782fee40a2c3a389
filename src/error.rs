//! Error types for the protection protocol.
//!
//! Only conditions that abort a scope before it is usable surface as errors.
//! Conditions detected at exit time (lost ownership, external mutation) are
//! recovered from and reported as [`ExitOutcome`](crate::scope::ExitOutcome)
//! variants instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtectError>;

#[derive(Debug, Error)]
pub enum ProtectError {
    /// A read-mode scope was requested on a file that does not exist.
    /// Raised before any lockfile work.
    #[error("target file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// An exclusive-create scope was requested on a file that already
    /// exists. Raised before any lockfile work.
    #[error("target file already exists: {}", .0.display())]
    FileExists(PathBuf),

    /// The target is a directory or a symbolic link; only regular files
    /// can be protected.
    #[error("cannot protect directories or symlinks: {}", .0.display())]
    UnsupportedTarget(PathBuf),

    /// The lockfile could not be created or read and the path backend
    /// offers no elevated-credentials fallback.
    #[error("cannot access lockfile {}: permission denied", .path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The nested-reclaim recursion exceeded the protocol ceiling. Almost
    /// always means a chain of crashed reclaimers left lockfiles behind
    /// faster than they expire.
    #[error("too many nested lockfiles (depth {0})")]
    TooManyLocks(usize),

    /// An I/O failure outside the retry loop (shadow copy, backup copy,
    /// stream open, publish).
    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ProtectError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
