//! End-to-end scenarios for protected scopes on a real filesystem.

use serial_test::serial;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::time::Duration;
use tempfile::tempdir;

use filewarden::{AccessMode, ExitOutcome, ProtectError, ProtectOptions};

/// Short retry delay so contended tests stay fast; the protocol jitters it.
/// Also hooks the crate's `log` output up to the test harness (visible with
/// `RUST_LOG=filewarden=debug`).
fn fast() -> ProtectOptions {
    let _ = env_logger::builder().is_test(true).try_init();
    ProtectOptions::new().wait(Duration::from_millis(20))
}

/// Names of everything in `dir`, for artifact-hygiene assertions.
fn dir_entries(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
#[serial]
fn read_modify_write_json_happy_path() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("info.json");
    fs::write(&target, br#"{"v":1}"#).unwrap();

    let mut scope = fast().open(&target, AccessMode::ReadWrite).unwrap();
    let mut text = String::new();
    scope.read_to_string(&mut text).unwrap();
    assert_eq!(text, r#"{"v":1}"#);

    scope.stream().set_len(0).unwrap();
    scope.seek(SeekFrom::Start(0)).unwrap();
    scope.write_all(br#"{"v":2}"#).unwrap();

    let outcome = scope.close().unwrap();
    assert!(matches!(outcome, ExitOutcome::Published));

    assert_eq!(fs::read_to_string(&target).unwrap(), r#"{"v":2}"#);
    // No lockfile, no backup, no result sidecar: just the target.
    assert_eq!(dir_entries(dir.path()), vec!["info.json"]);
}

#[test]
#[serial]
fn read_only_scope_leaves_target_byte_identical() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("immutable.bin");
    let content: Vec<u8> = (0..=255).collect();
    fs::write(&target, &content).unwrap();

    let mut scope = fast().open(&target, AccessMode::Read).unwrap();
    let mut read_back = Vec::new();
    scope.read_to_end(&mut read_back).unwrap();
    assert_eq!(read_back, content);

    let outcome = scope.close().unwrap();
    assert!(matches!(outcome, ExitOutcome::ReadOnly));

    assert_eq!(fs::read(&target).unwrap(), content);
    assert_eq!(dir_entries(dir.path()), vec!["immutable.bin"]);
}

#[test]
#[serial]
fn create_new_scope_publishes_a_fresh_target() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("fresh.json");

    let mut scope = fast().open(&target, AccessMode::CreateNew).unwrap();
    scope.write_all(br#"{"created": true}"#).unwrap();
    scope.close().unwrap();

    assert_eq!(fs::read_to_string(&target).unwrap(), r#"{"created": true}"#);
    assert_eq!(dir_entries(dir.path()), vec!["fresh.json"]);
}

#[test]
#[serial]
fn append_scope_keeps_existing_content() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("log.txt");
    fs::write(&target, b"line 1\n").unwrap();

    let mut scope = fast().open(&target, AccessMode::Append).unwrap();
    scope.write_all(b"line 2\n").unwrap();
    scope.close().unwrap();

    assert_eq!(fs::read_to_string(&target).unwrap(), "line 1\nline 2\n");
}

#[test]
#[serial]
fn read_of_missing_target_never_creates_a_lockfile() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("nowhere.json");

    let err = fast().open(&target, AccessMode::Read).unwrap_err();
    assert!(matches!(err, ProtectError::FileNotFound(_)));
    assert!(dir_entries(dir.path()).is_empty());
}

#[test]
#[serial]
fn create_new_on_existing_target_never_creates_a_lockfile() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("taken.json");
    fs::write(&target, b"{}").unwrap();

    let err = fast().open(&target, AccessMode::CreateNew).unwrap_err();
    assert!(matches!(err, ProtectError::FileExists(_)));
    assert_eq!(dir_entries(dir.path()), vec!["taken.json"]);
}

#[test]
#[serial]
fn external_mutation_restores_backup_and_saves_result() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("data.bin");
    let original = vec![7u8; 100];
    fs::write(&target, &original).unwrap();

    let mut scope = fast()
        .backup_during_lock(true)
        .open(&target, AccessMode::ReadWrite)
        .unwrap();
    scope.stream().set_len(0).unwrap();
    scope.seek(SeekFrom::Start(0)).unwrap();
    scope.write_all(b"computed result").unwrap();
    scope.stream().flush().unwrap();

    // A non-protocol writer truncates the target mid-scope.
    fs::write(&target, b"").unwrap();

    let outcome = scope.close().unwrap();
    let result = match outcome {
        ExitOutcome::Restored { result: Some(path) } => path,
        other => panic!("expected a restore with a result sidecar, got {other:?}"),
    };

    // The pre-scope bytes are back, and the scope's computation survived
    // in the sidecar.
    assert_eq!(fs::read(&target).unwrap(), original);
    assert_eq!(fs::read(&result).unwrap(), b"computed result");
    let name = result.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("data.bin.__") && name.ends_with(".result"));

    // The backup was consumed by the restore and the lockfile is gone.
    assert!(!dir.path().join("data.bin.lock").exists());
    assert!(!dir.path().join("data.bin.backup").exists());
}

#[test]
#[serial]
fn external_mutation_without_backup_still_saves_result() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("nobackup.bin");
    fs::write(&target, b"original").unwrap();

    let mut scope = fast().open(&target, AccessMode::ReadWrite).unwrap();
    scope.stream().set_len(0).unwrap();
    scope.seek(SeekFrom::Start(0)).unwrap();
    scope.write_all(b"new bytes").unwrap();
    scope.stream().flush().unwrap();

    fs::write(&target, b"clobbered").unwrap();

    let outcome = scope.close().unwrap();
    let result = match outcome {
        ExitOutcome::Restored { result: Some(path) } => path,
        other => panic!("expected a restore outcome, got {other:?}"),
    };

    // Without a snapshot there is nothing to roll the target back to, but
    // the scope refuses to publish over the foreign write and the caller's
    // bytes are preserved.
    assert_eq!(fs::read(&target).unwrap(), b"clobbered");
    assert_eq!(fs::read(&result).unwrap(), b"new bytes");
    assert!(!dir.path().join("nobackup.bin.lock").exists());
}

#[test]
#[serial]
fn kept_backup_survives_a_clean_scope() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("precious.json");
    fs::write(&target, br#"{"v":1}"#).unwrap();

    let mut scope = fast()
        .backup(true)
        .open(&target, AccessMode::ReadWrite)
        .unwrap();
    scope.stream().set_len(0).unwrap();
    scope.seek(SeekFrom::Start(0)).unwrap();
    scope.write_all(br#"{"v":2}"#).unwrap();
    scope.close().unwrap();

    assert_eq!(fs::read_to_string(&target).unwrap(), r#"{"v":2}"#);
    // The snapshot of the pre-scope state was kept.
    assert_eq!(
        fs::read_to_string(dir.path().join("precious.json.backup")).unwrap(),
        r#"{"v":1}"#
    );
    assert!(!dir.path().join("precious.json.lock").exists());
}

#[test]
#[serial]
fn lockfile_wire_format_is_json_with_holder_identity() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("wire.json");
    fs::write(&target, b"{}").unwrap();

    let scope = fast()
        .max_lock_time(Duration::from_secs(60))
        .open(&target, AccessMode::Read)
        .unwrap();

    let raw = fs::read_to_string(scope.lockfile()).unwrap();
    let record: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(record["pid"].as_u64().unwrap(), u64::from(std::process::id()));
    assert!(record["ran"].as_u64().is_some());
    assert!(record["machine"].as_str().is_some());
    // With an expiry the deadline is absolute epoch seconds in the future.
    assert!(record["free_after"].as_f64().unwrap() > 1_577_836_800.0);

    scope.close().unwrap();
}

#[test]
#[serial]
fn lockfile_without_expiry_encodes_minus_one() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("noexpiry.json");
    fs::write(&target, b"{}").unwrap();

    let scope = fast().open(&target, AccessMode::Read).unwrap();
    let record: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(scope.lockfile()).unwrap()).unwrap();
    assert_eq!(record["free_after"].as_f64().unwrap(), -1.0);
    scope.close().unwrap();
}

#[test]
#[serial]
fn drain_sweeps_scopes_that_never_released() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("leaked.json");
    fs::write(&target, b"{}").unwrap();

    let scope = fast().open(&target, AccessMode::ReadWrite).unwrap();
    let lockfile = scope.lockfile().to_path_buf();
    // Simulate a scope whose exit path never runs (no close, no drop).
    std::mem::forget(scope);
    assert!(lockfile.exists());

    filewarden::drain();

    assert!(!lockfile.exists());
    // The target itself is untouched and can be protected again.
    let scope = fast().open(&target, AccessMode::ReadWrite).unwrap();
    scope.close().unwrap();
}
