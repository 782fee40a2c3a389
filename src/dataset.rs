//! Protected JSON dataset helpers.
//!
//! Thin convenience wrappers for the common case of a JSON document shared
//! between processes (job registries, parameter tables, accumulated
//! results). Each helper runs a full protected scope, so a
//! read-modify-write through [`update_json`] is safe against concurrent
//! updaters without the caller touching the locking machinery.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{ProtectError, Result};
use crate::scope::{AccessMode, ProtectOptions, ProtectedFile};

fn invalid_json(path: &Path, e: serde_json::Error) -> ProtectError {
    ProtectError::io(path, io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Read a JSON document under a protected read scope.
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let mut scope = ProtectedFile::open(path, AccessMode::Read)?;
    let mut buf = String::new();
    scope
        .read_to_string(&mut buf)
        .map_err(|e| ProtectError::io(path, e))?;
    let value = serde_json::from_str(&buf).map_err(|e| invalid_json(path, e))?;
    scope.close()?;
    Ok(value)
}

/// Apply `update` to a JSON document under one protected read/write scope
/// and publish the result. Returns the updated value.
pub fn update_json<T, F>(path: impl AsRef<Path>, update: F) -> Result<T>
where
    T: DeserializeOwned + Serialize,
    F: FnOnce(&mut T),
{
    update_json_with(ProtectOptions::new(), path, update)
}

/// Like [`update_json`] with caller-supplied scope options (retry delay,
/// backup, expiry).
pub fn update_json_with<T, F>(options: ProtectOptions, path: impl AsRef<Path>, update: F) -> Result<T>
where
    T: DeserializeOwned + Serialize,
    F: FnOnce(&mut T),
{
    let path = path.as_ref();
    let mut scope = options.open(path, AccessMode::ReadWrite)?;

    let mut buf = String::new();
    scope
        .read_to_string(&mut buf)
        .map_err(|e| ProtectError::io(path, e))?;
    let mut value: T = serde_json::from_str(&buf).map_err(|e| invalid_json(path, e))?;
    update(&mut value);

    // The stream position sits at the end after the read; rewind and wipe
    // or the new document would be appended to the old one.
    let serialized =
        serde_json::to_string_pretty(&value).map_err(|e| invalid_json(path, e))?;
    scope
        .stream()
        .set_len(0)
        .map_err(|e| ProtectError::io(path, e))?;
    scope
        .seek(SeekFrom::Start(0))
        .map_err(|e| ProtectError::io(path, e))?;
    scope
        .write_all(serialized.as_bytes())
        .map_err(|e| ProtectError::io(path, e))?;

    scope.close()?;
    Ok(value)
}
