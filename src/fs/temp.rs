//! Process-wide scratch directory for shadow files.
//!
//! Every scope stages its writes in one shared temporary directory, created
//! lazily on first use and removed when the embedding application calls
//! [`drain`](crate::drain) at shutdown. Scope-level cleanup removes the
//! individual shadow files much earlier; the directory sweep only matters
//! for scopes that never got to run their exit path.

use once_cell::sync::Lazy;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

static SCRATCH: Lazy<Mutex<Option<TempDir>>> = Lazy::new(|| Mutex::new(None));

/// Path of the shared scratch directory, creating it if needed.
pub fn scratch_path() -> io::Result<PathBuf> {
    let mut guard = SCRATCH.lock().unwrap();
    if guard.is_none() {
        *guard = Some(TempDir::with_prefix("filewarden-")?);
    }
    Ok(guard.as_ref().unwrap().path().to_path_buf())
}

/// Remove the scratch directory and everything left inside it.
///
/// A later [`scratch_path`] call starts a fresh directory, so this is safe
/// to invoke from `drain` even if more scopes are opened afterwards.
pub fn cleanup() {
    if let Some(dir) = SCRATCH.lock().unwrap().take() {
        let _ = dir.close();
    }
}
