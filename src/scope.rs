//! The protected scope: acquisition, shadowing, backup, and the exit
//! protocol.
//!
//! A [`ProtectedFile`] wraps a byte stream on a target file with a lockfile
//! and optional backups. While the scope is live the holder has exclusive
//! semantic ownership of the target across processes; writes are staged on a
//! shadow copy and only published at [`close`](ProtectedFile::close).
//!
//! Read access is locked too, deliberately: a reader that computes on a file
//! while a writer replaces it would publish results derived from a stale
//! version. The whole read/modify/write sequence must sit inside one scope.
//!
//! A caveat carried over from the underlying stream semantics: after reading
//! a file in `ReadWrite` mode the stream position is at the end, so a
//! rewrite must `seek(0)` and truncate first or the new content will be
//! appended.

use std::fs::OpenOptions;
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::common::constants::{
    BACKUP_SUFFIX, DEFAULT_WAIT, LOCK_SUFFIX, MAX_NESTING, NESTED_MAX_LOCK_TIME, NESTED_WAIT,
    RESULT_SUFFIX, TEMP_SUFFIX_LEN,
};
use crate::common::utils::{jittered, random_suffix};
use crate::error::{ProtectError, Result};
use crate::fs::{self, LocalPath, ProtectedPath};
use crate::hash::file_hash;
use crate::lock::{self, LockRecord, ScopeIdentity};
use crate::registry::{self, CleanupTicket};
use crate::time_source;

/// How the caller wants to use the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read-only; the target must exist.
    Read,
    /// Read and write in place; the target must exist.
    ReadWrite,
    /// Write from scratch, truncating any previous content.
    Write,
    /// Append to the end.
    Append,
    /// Create the target, failing if it already exists.
    CreateNew,
}

impl AccessMode {
    fn readonly(self) -> bool {
        matches!(self, AccessMode::Read)
    }

    fn requires_existing(self) -> bool {
        matches!(self, AccessMode::Read | AccessMode::ReadWrite)
    }

    fn forbids_existing(self) -> bool {
        matches!(self, AccessMode::CreateNew)
    }

    /// Translate to open options for the file the stream actually lands on
    /// (the shadow when shadowing, the target otherwise).
    fn open_options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            AccessMode::Read => {
                options.read(true);
            }
            AccessMode::ReadWrite => {
                options.read(true).write(true);
            }
            AccessMode::Write => {
                options.write(true).create(true).truncate(true);
            }
            AccessMode::Append => {
                options.append(true).create(true);
            }
            AccessMode::CreateNew => {
                options.write(true).create_new(true);
            }
        }
        options
    }
}

/// What happened when a scope exited.
#[derive(Debug)]
pub enum ExitOutcome {
    /// The scope's writes were published to the target.
    Published,
    /// Read-only scope; the target was left untouched.
    ReadOnly,
    /// The target changed under the lock. The pre-scope content was
    /// restored (when a backup existed) and the scope's writes were saved
    /// to the timestamped `result` sidecar.
    Restored { result: Option<PathBuf> },
    /// The lockfile no longer held this scope's record at exit. Nothing was
    /// published; restore and cleanup ran.
    OwnershipLost,
}

/// Builder for a [`ProtectedFile`].
///
/// Setting `backup(true)` implies taking the snapshot in the first place.
/// Disabling the shadow (`use_temporary(false)`) on a writable scope makes
/// the stream write through to the target; combine that with
/// `check_hash(false)`, since the integrity check cannot tell the scope's
/// own in-place writes from external mutation.
#[derive(Debug, Clone)]
pub struct ProtectOptions {
    wait: Duration,
    use_temporary: bool,
    backup_during_lock: bool,
    backup: bool,
    backup_if_readonly: bool,
    check_hash: bool,
    max_lock_time: Option<Duration>,
    nesting_level: usize,
}

impl Default for ProtectOptions {
    fn default() -> Self {
        Self {
            wait: DEFAULT_WAIT,
            use_temporary: true,
            backup_during_lock: false,
            backup: false,
            backup_if_readonly: false,
            check_hash: true,
            max_lock_time: None,
            nesting_level: 0,
        }
    }
}

impl ProtectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base delay between acquisition retries while the lock is held.
    /// Every sleep is jittered by ±40% to break up lockstep retries.
    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Stage writes on a shadow copy (default). Ignored for read-only
    /// scopes.
    pub fn use_temporary(mut self, yes: bool) -> Self {
        self.use_temporary = yes;
        self
    }

    /// Snapshot the target before the scope, restoring it if the scope
    /// detects corruption. The snapshot is removed at exit.
    pub fn backup_during_lock(mut self, yes: bool) -> Self {
        self.backup_during_lock = yes;
        self
    }

    /// Keep the snapshot after the scope exits. Implies
    /// [`backup_during_lock`](Self::backup_during_lock).
    pub fn backup(mut self, yes: bool) -> Self {
        self.backup = yes;
        self
    }

    /// Take the snapshot even for read-only scopes.
    pub fn backup_if_readonly(mut self, yes: bool) -> Self {
        self.backup_if_readonly = yes;
        self
    }

    /// Hash the target at entry and verify it at exit (default). A mismatch
    /// means something bypassed the protocol and mutated the target; the
    /// scope then restores rather than publishing over it.
    pub fn check_hash(mut self, yes: bool) -> Self {
        self.check_hash = yes;
        self
    }

    /// Declare the scope's maximum runtime. The deadline is written into
    /// the lockfile; once it passes, other acquirers may treat the lock as
    /// abandoned and preempt it. Without this, a crashed holder locks the
    /// target forever.
    pub fn max_lock_time(mut self, limit: Duration) -> Self {
        self.max_lock_time = Some(limit);
        self
    }

    /// Options for a scope taken on a lockfile during reclaim: no shadow,
    /// no backup, no hashing, short timings.
    pub(crate) fn nested(level: usize) -> Self {
        Self {
            wait: NESTED_WAIT,
            use_temporary: false,
            backup_during_lock: false,
            backup: false,
            backup_if_readonly: false,
            check_hash: false,
            max_lock_time: Some(nested_max_lock_time()),
            nesting_level: level,
        }
    }

    /// Enter a protected scope on a local file.
    pub fn open(self, path: impl AsRef<Path>, mode: AccessMode) -> Result<ProtectedFile> {
        let resolved = LocalPath::new(path.as_ref()).resolve();
        self.open_with_backend(Arc::new(LocalPath::new(resolved)), mode)
    }

    /// Enter a protected scope on a caller-supplied path backend.
    pub fn open_with_backend(
        self,
        target: Arc<dyn ProtectedPath>,
        mode: AccessMode,
    ) -> Result<ProtectedFile> {
        ProtectedFile::enter(self, target, mode)
    }
}

#[derive(Debug)]
struct Baseline {
    size: u64,
    hash: String,
}

/// A live protected scope over one target file.
///
/// Obtained from [`ProtectedFile::open`] or a [`ProtectOptions`] builder.
/// The handle implements `Read`, `Write`, and `Seek`, forwarding to the
/// underlying stream. Call [`close`](Self::close) to publish; a handle that
/// is dropped without `close` rolls back: the shadow is discarded, the
/// target stays untouched, and all sidecar files are removed.
#[derive(Debug)]
pub struct ProtectedFile {
    target: Arc<dyn ProtectedPath>,
    resolved: PathBuf,
    lockpath: Arc<dyn ProtectedPath>,
    temppath: PathBuf,
    backuppath: Option<Arc<dyn ProtectedPath>>,
    stream: Option<std::fs::File>,
    identity: ScopeIdentity,
    baseline: Option<Baseline>,
    readonly: bool,
    use_shadow: bool,
    do_backup: bool,
    keep_backup: bool,
    check_hash: bool,
    wait: Duration,
    max_lock_time: Option<Duration>,
    nesting_level: usize,
    acquired: bool,
    exists: bool,
    closed: bool,
}

impl ProtectedFile {
    /// Enter a protected scope on `path` with default options.
    pub fn open(path: impl AsRef<Path>, mode: AccessMode) -> Result<Self> {
        ProtectOptions::new().open(path, mode)
    }

    fn enter(
        options: ProtectOptions,
        target: Arc<dyn ProtectedPath>,
        mode: AccessMode,
    ) -> Result<Self> {
        let resolved = target.resolve();
        let name = resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());

        // Fail fast, before any lockfile work: mode/existence conflicts and
        // unsupported target kinds cost nothing to detect.
        if target.is_symlink() || target.is_dir() {
            return Err(ProtectError::UnsupportedTarget(resolved));
        }
        let exists = target.is_file();
        let readonly = mode.readonly();
        if mode.requires_existing() && !exists {
            return Err(ProtectError::FileNotFound(resolved));
        }
        if mode.forbids_existing() && exists {
            return Err(ProtectError::FileExists(resolved));
        }

        let mut use_shadow = options.use_temporary && !readonly;
        let mut do_backup = options.backup_during_lock || options.backup;
        let keep_backup = options.backup;
        let mut check_hash = options.check_hash;
        let mut wait = options.wait;
        let mut max_lock_time = options.max_lock_time;
        let nesting_level = options.nesting_level;

        if readonly && !options.backup_if_readonly {
            do_backup = false;
        }

        // A scope taken on a lockfile runs the bare protocol: the full
        // machinery recursing onto itself would never terminate.
        if nesting_level > 0 {
            use_shadow = false;
            do_backup = false;
            check_hash = false;
            max_lock_time = Some(nested_max_lock_time());
            wait = NESTED_WAIT;
        }

        if max_lock_time.is_some() && !readonly && nesting_level == 0 {
            log::warn!(
                "max_lock_time on a writable scope for {}: if the limit is \
                 shorter than the actual runtime, another process may preempt \
                 the lock mid-write and corrupt the file",
                resolved.display()
            );
        }

        let lockpath = target.sibling(&format!("{name}{LOCK_SUFFIX}"));
        let temppath = fs::temp::scratch_path()
            .map_err(|e| ProtectError::io(&resolved, e))?
            .join(format!("{name}{}", random_suffix(TEMP_SUFFIX_LEN)));

        let mut scope = Self {
            target,
            resolved,
            lockpath,
            temppath,
            backuppath: None,
            stream: None,
            identity: ScopeIdentity::generate(),
            baseline: None,
            readonly,
            use_shadow,
            do_backup,
            keep_backup,
            check_hash,
            wait,
            max_lock_time,
            nesting_level,
            acquired: false,
            exists,
            closed: false,
        };

        scope.acquire()?;

        // Anything failing between acquisition and the registry insert must
        // not strand the lockfile.
        match scope.stage(mode) {
            Ok(()) => {
                registry::register(
                    scope.resolved.clone(),
                    CleanupTicket {
                        lockpath: scope.lockpath.clone(),
                        temppath: scope.use_shadow.then(|| scope.temppath.clone()),
                        backuppath: scope.backuppath.clone(),
                        keep_backup: scope.keep_backup,
                    },
                );
                Ok(scope)
            }
            Err(e) => {
                scope.release();
                scope.closed = true;
                Err(e)
            }
        }
    }

    /// Post-acquisition setup: snapshot, baseline hash, shadow copy, stream.
    fn stage(&mut self, mode: AccessMode) -> Result<()> {
        if self.do_backup && self.exists {
            let name = self.file_name();
            let backup = self.target.sibling(&format!("{name}{BACKUP_SUFFIX}"));
            self.target
                .copy_to(backup.as_path())
                .map_err(|e| ProtectError::io(backup.as_path(), e))?;
            self.backuppath = Some(backup);
        }

        if self.nesting_level == 0 && self.check_hash && self.exists {
            let size = self
                .target
                .size()
                .map_err(|e| ProtectError::io(&self.resolved, e))?;
            let hash =
                file_hash(self.target.as_path()).map_err(|e| ProtectError::io(&self.resolved, e))?;
            self.baseline = Some(Baseline { size, hash });
        }

        let stream = if self.use_shadow {
            if self.exists {
                self.target
                    .copy_to(&self.temppath)
                    .map_err(|e| ProtectError::io(&self.temppath, e))?;
            }
            mode.open_options()
                .open(&self.temppath)
                .map_err(|e| ProtectError::io(&self.temppath, e))?
        } else {
            self.target
                .open(&mode.open_options())
                .map_err(|e| ProtectError::io(&self.resolved, e))?
        };
        self.stream = Some(stream);
        Ok(())
    }

    /// The lockfile acquisition loop.
    ///
    /// Create-exclusive alone is not trusted: on filesystems with loose
    /// create semantics two processes can both believe they created the
    /// lockfile. After writing our record we sleep a jittered interval and
    /// re-read; whichever record survived the race wins, and the loser
    /// backs off and retries.
    fn acquire(&mut self) -> Result<()> {
        let max_secs = self.max_lock_time.map(|d| d.as_secs_f64());
        loop {
            match lock::create_exclusive(self.lockpath.as_ref()) {
                Ok(mut file) => {
                    let record = LockRecord::new(&self.identity, max_secs);
                    if lock::write_record(&mut file, &record).is_err() {
                        drop(file);
                        time_source::sleep(jittered(self.wait));
                        continue;
                    }
                    drop(file);
                    time_source::sleep(jittered(self.wait));
                    if lock::lock_is_ours(self.lockpath.as_ref(), &self.identity) {
                        self.acquired = true;
                        return Ok(());
                    }
                    // Another writer overwrote our claim in the window.
                    time_source::sleep(jittered(self.wait));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    time_source::sleep(jittered(self.wait));
                    if self.max_lock_time.is_some() {
                        if self.nesting_level >= MAX_NESTING {
                            return Err(ProtectError::TooManyLocks(self.nesting_level));
                        }
                        self.try_reclaim()?;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                    if !self.target.supports_elevated_access() {
                        return Err(ProtectError::PermissionDenied {
                            path: self.lockpath.as_path().to_path_buf(),
                            source: e,
                        });
                    }
                    if self.acquire_elevated(max_secs)? {
                        self.acquired = true;
                        return Ok(());
                    }
                }
                Err(e) => {
                    return Err(ProtectError::io(self.lockpath.as_path(), e));
                }
            }
        }
    }

    /// Attempt to free a stale lockfile by locking the lockfile itself.
    ///
    /// The nested scope guarantees nobody else is concurrently inspecting
    /// the record while we decide. Freeing an expired lock does not grant
    /// it to us; the outer loop goes back to competing with every other
    /// waiter.
    fn try_reclaim(&self) -> Result<()> {
        let nested = ProtectOptions::nested(self.nesting_level + 1)
            .open_with_backend(self.lockpath.clone(), AccessMode::ReadWrite);
        let mut nested = match nested {
            Ok(scope) => scope,
            // The lockfile vanished while we were waiting: the holder
            // finished. The outer loop retries immediately.
            Err(ProtectError::FileNotFound(_)) => return Ok(()),
            Err(ProtectError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        // A record we cannot parse might be mid-write; leave it alone.
        let record: Option<LockRecord> = serde_json::from_reader(nested.stream()).ok();
        if let Some(record) = record {
            if record.expired(time_source::now_secs()) {
                match self.lockpath.unlink() {
                    Ok(()) => log::warn!(
                        "freed stale lockfile {} (holder pid {} on {} exceeded its max lock time)",
                        self.lockpath.as_path().display(),
                        record.pid,
                        record.machine,
                    ),
                    Err(e) => log::debug!(
                        "stale lockfile {} disappeared before we freed it: {}",
                        self.lockpath.as_path().display(),
                        e
                    ),
                }
            }
        }
        let _ = nested.close();
        Ok(())
    }

    /// Lockfile acquisition through the backend's out-of-band credentials.
    ///
    /// Used when a direct create is denied but the backend can still touch
    /// and move files (remote stores whose direct-permission grants expire
    /// while the side channel keeps working). The record is staged in a
    /// local sidecar, moved onto the lockfile through the backend, and
    /// verified by copying it back.
    ///
    /// Returns `Ok(true)` once the lockfile verifiably holds our record,
    /// `Ok(false)` to signal the caller to keep looping.
    fn acquire_elevated(&self, max_secs: Option<f64>) -> Result<bool> {
        let denied = |source: io::Error| ProtectError::PermissionDenied {
            path: self.lockpath.as_path().to_path_buf(),
            source,
        };

        // If the lockfile already exists we queue up like everyone else.
        if self.lockpath.is_file() {
            time_source::sleep(jittered(self.wait));
            return Ok(false);
        }

        let result: io::Result<bool> = (|| {
            self.lockpath.touch_with_elevated_credentials()?;

            let scratch = fs::temp::scratch_path()?;
            let sidecar = scratch.join(format!("{}{LOCK_SUFFIX}", self.file_name()));
            if sidecar.exists() {
                std::fs::remove_file(&sidecar)?;
            }
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&sidecar)?;
            lock::write_record(&mut file, &LockRecord::new(&self.identity, max_secs))?;
            drop(file);

            self.lockpath.move_into_from(&sidecar)?;
            if sidecar.exists() {
                // A move that duplicates instead of moving would let two
                // holders each believe their record is in place.
                return Err(io::Error::other(
                    "backend move left the local lockfile behind",
                ));
            }

            time_source::sleep(jittered(self.wait));

            let verify = scratch.join(format!(
                "{}{LOCK_SUFFIX}.{}",
                self.file_name(),
                random_suffix(TEMP_SUFFIX_LEN)
            ));
            self.lockpath.copy_to(&verify)?;
            let ours = lock::lock_is_ours(&LocalPath::new(&verify), &self.identity);
            let _ = std::fs::remove_file(&verify);
            Ok(ours)
        })();

        match result {
            Ok(ours) => {
                if !ours {
                    time_source::sleep(jittered(self.wait));
                }
                Ok(ours)
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Err(denied(e)),
            Err(e) if e.kind() == io::ErrorKind::Unsupported => Err(denied(e)),
            Err(e) => Err(ProtectError::io(self.lockpath.as_path(), e)),
        }
    }

    /// Exit the scope: verify, publish or restore, clean up.
    ///
    /// Exit prefers recovery over propagation — loss of lock ownership and
    /// detected corruption come back as [`ExitOutcome`] variants with the
    /// diagnostics logged, not as errors.
    pub fn close(mut self) -> Result<ExitOutcome> {
        let outcome = self.exit_protocol();
        self.closed = true;
        outcome
    }

    fn exit_protocol(&mut self) -> Result<ExitOutcome> {
        self.stream = None;

        if !lock::lock_is_ours(self.lockpath.as_ref(), &self.identity) {
            log::error!(
                "lockfile {} is not ours anymore; discarding writes and restoring",
                self.lockpath.as_path().display()
            );
            self.restore();
            self.release();
            return Ok(ExitOutcome::OwnershipLost);
        }

        let mut corrupted = false;
        if let Some(baseline) = &self.baseline {
            match file_hash(self.target.as_path()) {
                Ok(ref new_hash) if *new_hash == baseline.hash => {}
                Ok(_) => {
                    let new_size = self.target.size().unwrap_or(0);
                    log::error!(
                        "target {} changed during lock (size {} -> {}); restoring previous state",
                        self.resolved.display(),
                        baseline.size,
                        new_size,
                    );
                    corrupted = true;
                }
                Err(e) => {
                    log::error!(
                        "target {} could not be rehashed at exit ({}); restoring previous state",
                        self.resolved.display(),
                        e
                    );
                    corrupted = true;
                }
            }
        }

        if corrupted {
            let result = self.restore();
            self.release();
            return Ok(ExitOutcome::Restored { result });
        }

        if let Err(e) = self.publish() {
            self.release();
            return Err(e);
        }
        self.release();
        Ok(if self.readonly {
            ExitOutcome::ReadOnly
        } else {
            ExitOutcome::Published
        })
    }

    /// Copy the shadow back over the target and drop the shadow.
    fn publish(&mut self) -> Result<()> {
        if !self.use_shadow {
            return Ok(());
        }
        self.target
            .copy_into_from(&self.temppath)
            .map_err(|e| ProtectError::io(&self.resolved, e))?;
        let _ = std::fs::remove_file(&self.temppath);
        Ok(())
    }

    /// Put the target back to its pre-scope state and save the scope's
    /// writes to a timestamped sidecar so the computation is not lost.
    fn restore(&mut self) -> Option<PathBuf> {
        if self.do_backup {
            if let Some(backup) = &self.backuppath {
                if backup.is_file() {
                    match backup.rename_to(self.target.as_path()) {
                        Ok(()) => log::warn!(
                            "restored {} from its pre-scope snapshot",
                            self.resolved.display()
                        ),
                        Err(e) => log::error!(
                            "could not restore {} from {}: {}",
                            self.resolved.display(),
                            backup.as_path().display(),
                            e
                        ),
                    }
                }
            }
        }

        if self.use_shadow && self.temppath.is_file() {
            let stamp = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f");
            let sidecar = self
                .target
                .sibling(&format!("{}.__{stamp}{RESULT_SUFFIX}", self.file_name()));
            match sidecar.copy_into_from(&self.temppath) {
                Ok(()) => {
                    let _ = std::fs::remove_file(&self.temppath);
                    log::warn!(
                        "saved this scope's writes to {}",
                        sidecar.as_path().display()
                    );
                    return Some(sidecar.as_path().to_path_buf());
                }
                Err(e) => log::error!(
                    "could not save this scope's writes to {}: {}",
                    sidecar.as_path().display(),
                    e
                ),
            }
        }
        None
    }

    /// Idempotent cleanup of every artifact this scope may have created.
    ///
    /// Each step checks its own precondition so a partially-staged scope
    /// releases whatever it actually holds, and nothing here ever fails the
    /// caller.
    fn release(&mut self) {
        if !self.acquired {
            return;
        }
        if let Some(stream) = self.stream.take() {
            drop(stream);
        }
        if self.temppath.is_file() {
            let _ = std::fs::remove_file(&self.temppath);
        }
        if self.do_backup && !self.keep_backup {
            if let Some(backup) = &self.backuppath {
                if backup.is_file() {
                    let _ = backup.unlink();
                }
            }
        }
        lock::release_lock(self.lockpath.as_ref());
        registry::deregister(&self.resolved);
        self.acquired = false;
    }

    fn file_name(&self) -> String {
        self.resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string())
    }

    /// The open byte stream. Points at the shadow for shadowed scopes, at
    /// the target otherwise.
    pub fn stream(&mut self) -> &mut std::fs::File {
        self.stream
            .as_mut()
            .expect("stream is open for the lifetime of the handle")
    }

    /// Canonical path of the protected target.
    pub fn path(&self) -> &Path {
        &self.resolved
    }

    /// Path of the sidecar lockfile.
    pub fn lockfile(&self) -> &Path {
        self.lockpath.as_path()
    }

    /// Path of the shadow file, when this scope stages writes on one.
    pub fn tempfile(&self) -> Option<&Path> {
        self.use_shadow.then_some(self.temppath.as_path())
    }

    /// Path of the backup snapshot, when one was taken.
    pub fn backupfile(&self) -> Option<&Path> {
        self.backuppath.as_deref().map(ProtectedPath::as_path)
    }
}

impl Drop for ProtectedFile {
    fn drop(&mut self) {
        // An abandoned handle (panic, early return) rolls back: no publish,
        // artifacts removed, lock released.
        if !self.closed {
            self.release();
        }
    }
}

impl Read for ProtectedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream().read(buf)
    }
}

impl Write for ProtectedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream().flush()
    }
}

impl Seek for ProtectedFile {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        self.stream().seek(pos)
    }
}

fn nested_max_lock_time() -> Duration {
    #[cfg(feature = "testing-support")]
    {
        let millis = testing::NESTED_MAX_LOCK_MILLIS.load(std::sync::atomic::Ordering::Relaxed);
        if millis > 0 {
            return Duration::from_millis(millis);
        }
    }
    NESTED_MAX_LOCK_TIME
}

/// Test hooks, compiled only with the `testing-support` feature.
#[cfg(feature = "testing-support")]
pub mod testing {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    pub(super) static NESTED_MAX_LOCK_MILLIS: AtomicU64 = AtomicU64::new(0);

    /// Override the expiry written into nested-scope lockfiles so reclaim
    /// chains can be exercised without waiting out the real deadline.
    /// `None` restores the default.
    pub fn set_nested_max_lock_time(limit: Option<Duration>) {
        let millis = limit.map(|d| d.as_millis() as u64).unwrap_or(0);
        NESTED_MAX_LOCK_MILLIS.store(millis, Ordering::Relaxed);
    }
}
