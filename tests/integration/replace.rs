//! The replacement protocol against the real filesystem.

use selfswap::apply::{
    ApplyError, OsFs, ReplaceFs, Replacer, StagedPaths, apply, clean_staged, recover,
};
use std::io::{self, Cursor, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Fails every rename into the target path.
struct LockedTarget {
    renames_into_target: AtomicUsize,
}

impl ReplaceFs for LockedTarget {
    fn write_synced(&self, path: &Path, content: &mut dyn Read, mode: u32) -> io::Result<u64> {
        OsFs.write_synced(path, content, mode)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if to.file_name().is_some_and(|name| name == "app") {
            self.renames_into_target.fetch_add(1, Ordering::SeqCst);
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "target is locked"));
        }
        OsFs.rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        OsFs.remove(path)
    }

    fn hide(&self, path: &Path) -> io::Result<()> {
        OsFs.hide(path)
    }
}

#[test]
fn test_repeated_updates() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("app");
    std::fs::write(&target, b"v1").unwrap();

    for version in [b"v2", b"v3", b"v4"] {
        apply(&mut Cursor::new(version.to_vec()), Some(&target), Some(0o755)).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), version);
    }

    let mut names: Vec<String> = std::fs::read_dir(temp.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["app".to_string()]);
}

#[test]
fn test_unrecoverable_then_manual_recovery() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("app");
    std::fs::write(&target, b"version A").unwrap();
    let staged = StagedPaths::for_target(&target);

    let replacer = Replacer::with_fs(LockedTarget {
        renames_into_target: AtomicUsize::new(0),
    });
    let err = replacer
        .apply(&mut Cursor::new(b"version B".to_vec()), Some(&target), Some(0o755))
        .unwrap_err();

    assert!(err.is_unrecoverable());
    assert_eq!(err.commit_error().unwrap().kind(), io::ErrorKind::PermissionDenied);
    assert_eq!(err.rollback_error().unwrap().to_string(), "target is locked");
    assert!(matches!(&err, ApplyError::Unrecoverable { old_path, .. } if old_path == &staged.old));

    // Both the commit and the rollback were attempted.
    assert!(!target.exists());
    assert_eq!(std::fs::read(&staged.old).unwrap(), b"version A");
    assert_eq!(std::fs::read(&staged.new).unwrap(), b"version B");

    // Cleaning must not delete the only copy of the previous executable.
    assert_eq!(clean_staged(&target), vec![staged.new.clone()]);
    assert!(staged.old.exists());

    assert!(recover(&target).unwrap());
    assert_eq!(std::fs::read(&target).unwrap(), b"version A");
    assert!(clean_staged(&target).is_empty());
}

#[test]
fn test_orphaned_new_file_is_replaced() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("app");
    std::fs::write(&target, b"current").unwrap();
    let staged = StagedPaths::for_target(&target);
    std::fs::write(&staged.new, b"orphan from an interrupted run").unwrap();

    apply(&mut Cursor::new(b"fresh".to_vec()), Some(&target), Some(0o700)).unwrap();

    assert_eq!(std::fs::read(&target).unwrap(), b"fresh");
    assert!(!staged.new.exists());
}

#[test]
fn test_target_in_missing_directory() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("nope").join("app");

    let err = apply(&mut Cursor::new(b"x".to_vec()), Some(&target), Some(0o755)).unwrap_err();
    assert!(matches!(err, ApplyError::Write { .. }));
}
