//! Path backend abstraction.
//!
//! The protection protocol never touches `std::fs` directly for the target
//! and its sidecar files; it goes through [`ProtectedPath`] so that targets
//! on storage backends with unusual permission behavior (remote object
//! stores reached through out-of-band credentials) can participate. The
//! crate ships [`LocalPath`] for ordinary filesystems; embedders provide
//! their own implementations for anything else.

pub mod temp;

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Filesystem operations the protection protocol requires of a target path.
///
/// `copy_to`, `move_to`, and `rename_to` take plain destination paths; a
/// backend maps them onto its own namespace (for a remote store, a local
/// destination means "download" and a remote one means "server-side copy").
pub trait ProtectedPath: fmt::Debug + Send + Sync {
    /// The path as handed to the backend.
    fn as_path(&self) -> &Path;

    /// Canonical absolute form of the path. Must work for paths that do not
    /// exist yet (the target of an exclusive-create scope).
    fn resolve(&self) -> PathBuf;

    fn exists(&self) -> bool;
    fn is_file(&self) -> bool;
    fn is_dir(&self) -> bool;
    fn is_symlink(&self) -> bool;

    fn metadata(&self) -> io::Result<fs::Metadata>;

    /// Size of the file in bytes.
    fn size(&self) -> io::Result<u64> {
        self.metadata().map(|m| m.len())
    }

    fn copy_to(&self, dst: &Path) -> io::Result<()>;

    /// Move the file to `dst`. After a successful move the source must no
    /// longer exist; a backend that duplicates instead of moving violates
    /// the lockfile handoff protocol.
    fn move_to(&self, dst: &Path) -> io::Result<()>;

    /// Rename within the same directory (used to restore a backup over its
    /// target).
    fn rename_to(&self, dst: &Path) -> io::Result<()>;

    /// Copy a local file's bytes onto this path. The inbound counterpart of
    /// `copy_to`; remote backends override it with a credential-tolerant
    /// upload.
    fn copy_into_from(&self, src: &Path) -> io::Result<()> {
        fs::copy(src, self.as_path()).map(|_| ())
    }

    /// Move a local file onto this path. After success the source must no
    /// longer exist.
    fn move_into_from(&self, src: &Path) -> io::Result<()> {
        match fs::rename(src, self.as_path()) {
            Ok(()) => Ok(()),
            Err(_) => {
                fs::copy(src, self.as_path())?;
                fs::remove_file(src)
            }
        }
    }

    /// Remove the file. Callers treat absence as already-removed.
    fn unlink(&self) -> io::Result<()>;

    /// Create the file empty if it does not exist.
    fn touch(&self) -> io::Result<()>;

    /// Open a byte stream on the file with the given options.
    fn open(&self, options: &OpenOptions) -> io::Result<File>;

    /// A path to `file_name` in the same directory, on the same backend.
    fn sibling(&self, file_name: &str) -> Arc<dyn ProtectedPath>;

    /// Whether lockfile creation may fall back to out-of-band credentials
    /// when a direct create is denied.
    fn supports_elevated_access(&self) -> bool {
        false
    }

    /// Create the file through the backend's out-of-band credentials.
    fn touch_with_elevated_credentials(&self) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "backend does not support elevated access",
        ))
    }
}

/// [`ProtectedPath`] implementation for ordinary local filesystems.
#[derive(Debug, Clone)]
pub struct LocalPath {
    path: PathBuf,
}

impl LocalPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProtectedPath for LocalPath {
    fn as_path(&self) -> &Path {
        &self.path
    }

    fn resolve(&self) -> PathBuf {
        if let Ok(canonical) = self.path.canonicalize() {
            return canonical;
        }
        // Nonexistent file: canonicalize the parent and re-attach the name,
        // so lock and backup siblings land next to the real target.
        if let (Some(parent), Some(name)) = (self.path.parent(), self.path.file_name()) {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            if let Ok(canonical_parent) = parent.canonicalize() {
                return canonical_parent.join(name);
            }
        }
        std::env::current_dir()
            .map(|cwd| cwd.join(&self.path))
            .unwrap_or_else(|_| self.path.clone())
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn is_file(&self) -> bool {
        self.path.is_file()
    }

    fn is_dir(&self) -> bool {
        self.path.is_dir()
    }

    fn is_symlink(&self) -> bool {
        fs::symlink_metadata(&self.path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }

    fn metadata(&self) -> io::Result<fs::Metadata> {
        fs::metadata(&self.path)
    }

    fn copy_to(&self, dst: &Path) -> io::Result<()> {
        fs::copy(&self.path, dst).map(|_| ())
    }

    fn move_to(&self, dst: &Path) -> io::Result<()> {
        match fs::rename(&self.path, dst) {
            Ok(()) => Ok(()),
            // Rename cannot cross filesystems; the scratch dir often lives
            // on one of its own.
            Err(_) => {
                fs::copy(&self.path, dst)?;
                fs::remove_file(&self.path)
            }
        }
    }

    fn rename_to(&self, dst: &Path) -> io::Result<()> {
        fs::rename(&self.path, dst)
    }

    fn unlink(&self) -> io::Result<()> {
        fs::remove_file(&self.path)
    }

    fn touch(&self) -> io::Result<()> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map(|_| ())
    }

    fn open(&self, options: &OpenOptions) -> io::Result<File> {
        options.open(&self.path)
    }

    fn sibling(&self, file_name: &str) -> Arc<dyn ProtectedPath> {
        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Arc::new(LocalPath::new(dir.join(file_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolve_works_for_missing_files() {
        let dir = tempdir().unwrap();
        let path = LocalPath::new(dir.path().join("not-yet-created.json"));
        let resolved = path.resolve();
        assert!(resolved.is_absolute());
        assert_eq!(resolved.file_name().unwrap(), "not-yet-created.json");
    }

    #[test]
    fn sibling_lands_in_same_directory() {
        let dir = tempdir().unwrap();
        let target = LocalPath::new(dir.path().join("data.json"));
        let lock = target.sibling("data.json.lock");
        assert_eq!(lock.as_path().parent(), target.as_path().parent());
    }

    #[test]
    fn move_to_removes_the_source() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a");
        let dst = dir.path().join("b");
        fs::write(&src, b"payload").unwrap();

        LocalPath::new(&src).move_to(&dst).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).unwrap(), b"payload");
    }

    #[test]
    fn touch_creates_and_preserves() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("touched");
        let local = LocalPath::new(&path);

        local.touch().unwrap();
        assert!(path.exists());

        fs::write(&path, b"kept").unwrap();
        local.touch().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"kept");
    }

    #[test]
    fn elevated_access_is_off_by_default() {
        let local = LocalPath::new("/tmp/whatever");
        assert!(!local.supports_elevated_access());
        assert!(local.touch_with_elevated_credentials().is_err());
    }
}
