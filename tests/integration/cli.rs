//! Smoke tests for the `selfswap` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use selfswap::apply::StagedPaths;
use selfswap::test_utils::{ArchiveEntry, FeedFixture, tar_gz_archive};
use std::path::Path;
use tempfile::TempDir;

/// The binary with an isolated environment: no user config, no feed from the
/// environment, default logging.
fn selfswap(temp: &Path) -> Command {
    let mut cmd = Command::cargo_bin("selfswap").unwrap();
    cmd.env("SELFSWAP_CONFIG", temp.join("no-config.toml"))
        .env_remove("SELFSWAP_FEED")
        .env_remove("RUST_LOG");
    cmd
}

fn feed_with_releases() -> FeedFixture {
    let one = tar_gz_archive(&[ArchiveEntry::file("app", b"one")]);
    let three = tar_gz_archive(&[ArchiveEntry::file("app", b"three")]);
    let mut fixture = FeedFixture::new().unwrap();
    fixture.release("1.0.0", &[("app-any.tar.gz", &one)]).unwrap();
    fixture.release("1.3.0", &[("app-any.tar.gz", &three)]).unwrap();
    fixture
}

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().unwrap();
    selfswap(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("recover"))
        .stdout(predicate::str::contains("clean"));
}

#[test]
fn test_check_reports_available_update() {
    let temp = TempDir::new().unwrap();
    let fixture = feed_with_releases();

    selfswap(temp.path())
        .arg("check")
        .arg("--feed")
        .arg(fixture.index_path())
        .args(["--asset-pattern", "app-*", "--current", "1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Update available: 1.0.0 -> 1.3.0"));

    selfswap(temp.path())
        .arg("check")
        .arg("--feed")
        .arg(fixture.index_path())
        .args(["--asset-pattern", "app-*", "--current", "v1.3.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("You are on the latest version"));
}

#[test]
fn test_check_without_feed_fails() {
    let temp = TempDir::new().unwrap();
    selfswap(temp.path())
        .arg("check")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("No release feed configured"));
}

#[test]
fn test_update_installs_latest() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("app");
    std::fs::write(&target, b"zero").unwrap();
    let fixture = feed_with_releases();

    selfswap(temp.path())
        .arg("update")
        .arg("--feed")
        .arg(fixture.index_path())
        .arg("--target")
        .arg(&target)
        .args(["--asset-pattern", "*.tar.gz", "--current", "0.1.0", "--mode", "755"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Successfully updated to 1.3.0"));

    assert_eq!(std::fs::read(&target).unwrap(), b"three");
}

#[test]
fn test_update_with_relative_feed_path() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("app");
    std::fs::write(&target, b"zero").unwrap();
    let fixture = feed_with_releases();
    let feed_parent = fixture.path().parent().unwrap();
    let relative_index = Path::new(fixture.path().file_name().unwrap()).join("releases.toml");

    selfswap(temp.path())
        .current_dir(feed_parent)
        .arg("update")
        .arg("--feed")
        .arg(&relative_index)
        .arg("--target")
        .arg(&target)
        .args(["--asset-pattern", "*.tar.gz", "--current", "0.1.0"])
        .assert()
        .success();

    assert_eq!(std::fs::read(&target).unwrap(), b"three");
}

#[test]
fn test_update_skips_when_current() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("app");
    std::fs::write(&target, b"already three").unwrap();
    let fixture = feed_with_releases();

    selfswap(temp.path())
        .arg("update")
        .arg("--feed")
        .arg(fixture.index_path())
        .arg("--target")
        .arg(&target)
        .args(["--asset-pattern", "*.tar.gz", "--current", "1.3.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("latest version"));

    assert_eq!(std::fs::read(&target).unwrap(), b"already three");
}

#[test]
fn test_update_uses_config_file() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("app");
    std::fs::write(&target, b"zero").unwrap();
    let fixture = feed_with_releases();

    let config = temp.path().join("config.toml");
    std::fs::write(
        &config,
        format!(
            "feed = {:?}\ntarget = {:?}\nasset_pattern = \"app-*\"\n",
            fixture.index_path().display().to_string(),
            target.display().to_string()
        ),
    )
    .unwrap();

    selfswap(temp.path())
        .arg("--config")
        .arg(&config)
        .args(["update", "--current", "1.0.0"])
        .assert()
        .success();

    assert_eq!(std::fs::read(&target).unwrap(), b"three");
}

#[test]
fn test_invalid_config_reports_parse_error() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("config.toml");
    std::fs::write(&config, "max_releases = [").unwrap();

    selfswap(temp.path())
        .arg("--config")
        .arg(&config)
        .arg("clean")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config"))
        .stderr(predicate::str::contains("suggestion"));
}

#[test]
fn test_apply_archive_and_raw() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("tool");
    std::fs::write(&target, b"before").unwrap();

    let archive = temp.path().join("bundle.tgz");
    let bundle = tar_gz_archive(&[ArchiveEntry::file("pkg/tool", b"from archive")]);
    std::fs::write(&archive, bundle).unwrap();

    selfswap(temp.path())
        .arg("apply")
        .arg(&archive)
        .arg("--target")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed bundle.tgz"));
    assert_eq!(std::fs::read(&target).unwrap(), b"from archive");

    selfswap(temp.path())
        .arg("apply")
        .arg(&archive)
        .arg("--target")
        .arg(&target)
        .arg("--raw")
        .assert()
        .success();
    assert_eq!(std::fs::read(&target).unwrap(), std::fs::read(&archive).unwrap());
}

#[test]
fn test_apply_reports_missing_binary() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("tool");
    std::fs::write(&target, b"before").unwrap();

    let archive = temp.path().join("bundle.tar.gz");
    std::fs::write(&archive, tar_gz_archive(&[ArchiveEntry::file("other", b"x")])).unwrap();

    selfswap(temp.path())
        .arg("apply")
        .arg(&archive)
        .arg("--target")
        .arg(&target)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unable to find binary tool"));
    assert_eq!(std::fs::read(&target).unwrap(), b"before");
}

#[test]
fn test_recover_and_clean() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("app");
    let staged = StagedPaths::for_target(&target);
    std::fs::write(&staged.old, b"previous").unwrap();
    std::fs::write(&staged.new, b"orphan").unwrap();

    selfswap(temp.path())
        .arg("recover")
        .arg("--target")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored"));
    assert_eq!(std::fs::read(&target).unwrap(), b"previous");

    selfswap(temp.path())
        .arg("clean")
        .arg("--target")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleaned 1 staging file(s)"));
    assert!(!staged.new.exists());

    selfswap(temp.path())
        .arg("recover")
        .arg("--target")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to recover"));
}
