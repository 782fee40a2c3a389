//! Process-global registry of live scopes.
//!
//! Every acquired scope registers the on-disk artifacts it is responsible
//! for (lockfile, shadow, backup) under its canonical target path, and
//! deregisters when it releases. The embedding application calls [`drain`]
//! once at shutdown to sweep whatever is still registered — scopes that were
//! leaked or whose exit path never ran — so lockfiles from a cleanly
//! terminating process never outlive it. Crashed processes are covered by
//! the lock-expiry mechanism instead, not by this registry.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::fs::{self, ProtectedPath};

/// The artifact paths a scope would clean up in its own release step.
pub(crate) struct CleanupTicket {
    pub lockpath: Arc<dyn ProtectedPath>,
    pub temppath: Option<PathBuf>,
    pub backuppath: Option<Arc<dyn ProtectedPath>>,
    pub keep_backup: bool,
}

impl CleanupTicket {
    fn sweep(self) {
        if let Some(temp) = &self.temppath {
            if temp.is_file() {
                let _ = std::fs::remove_file(temp);
            }
        }
        if !self.keep_backup {
            if let Some(backup) = &self.backuppath {
                if backup.is_file() {
                    let _ = backup.unlink();
                }
            }
        }
        if self.lockpath.is_file() {
            let _ = self.lockpath.unlink();
        }
    }
}

static PROTECTED_OPEN: Lazy<Mutex<HashMap<PathBuf, CleanupTicket>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub(crate) fn register(target: PathBuf, ticket: CleanupTicket) {
    PROTECTED_OPEN.lock().unwrap().insert(target, ticket);
}

pub(crate) fn deregister(target: &Path) {
    PROTECTED_OPEN.lock().unwrap().remove(target);
}

/// Release every still-registered scope and drop the scratch directory.
///
/// Call once at application shutdown. Idempotent, never panics, and safe to
/// call with scopes still alive elsewhere — their own release step tolerates
/// files that were already swept.
pub fn drain() {
    let tickets: Vec<CleanupTicket> = {
        let mut map = PROTECTED_OPEN.lock().unwrap();
        map.drain().map(|(_, t)| t).collect()
    };
    for ticket in tickets {
        ticket.sweep();
    }
    fs::temp::cleanup();
}
