//! Full self-update pipeline against a local feed.

use selfswap::apply::StagedPaths;
use selfswap::archive::{BinaryFilter, EntryInfo, ExtractError, Extractor};
use selfswap::config::{Channel, UpdaterConfig};
use selfswap::core::UpdateError;
use selfswap::release::{ReleaseLister, SelectError};
use selfswap::test_utils::{
    ArchiveEntry, FeedFixture, init_test_logging, tar_archive, tar_gz_archive,
};
use selfswap::updater::{CancelToken, Updater};
use std::io::{Cursor, Read};
use std::path::PathBuf;
use tempfile::TempDir;

fn app_archive(content: &[u8]) -> Vec<u8> {
    tar_gz_archive(&[
        ArchiveEntry::file("readme.txt", b"release notes"),
        ArchiveEntry::dir("lib/"),
        ArchiveEntry::file("app", content),
    ])
}

fn install_dir(content: &[u8]) -> (TempDir, PathBuf) {
    init_test_logging(None);
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("app");
    std::fs::write(&target, content).unwrap();
    (temp, target)
}

#[test]
fn test_update_to_latest_stable_release() {
    let (_install, target) = install_dir(b"app 1.0.0");

    let mut fixture = FeedFixture::new().unwrap();
    fixture.release("1.0.0", &[("app-linux.tar.gz", &app_archive(b"app 1.0.0"))]).unwrap();
    let beta = app_archive(b"app 2.0.0-beta");
    fixture
        .release_with_flags("2.0.0-beta", false, true, &[("app-linux.tar.gz", &beta)])
        .unwrap();
    fixture.release("1.5.2", &[("app-linux.tar.gz", &app_archive(b"app 1.5.2"))]).unwrap();
    fixture.release("not-a-version", &[("app-linux.tar.gz", &app_archive(b"junk"))]).unwrap();
    let feed = fixture.open().unwrap();

    let updater = Updater::new(feed.clone())
        .with_asset_filter(|asset: &str| asset.contains("linux"))
        .with_target(&target, Some(0o755));
    let installed = updater.self_update_to_latest(&feed).unwrap();

    assert_eq!(installed.name, "1.5.2");
    assert_eq!(installed.asset, "app-linux.tar.gz");
    assert_eq!(std::fs::read(&target).unwrap(), b"app 1.5.2");

    let staged = StagedPaths::for_target(&target);
    assert!(!staged.new.exists());
    assert!(!staged.old.exists());
}

#[test]
fn test_update_from_config() {
    let (_install, target) = install_dir(b"old");

    let mut fixture = FeedFixture::new().unwrap();
    let stable = tar_archive(&[ArchiveEntry::file("bin/app", b"stable")]);
    let candidate = tar_archive(&[ArchiveEntry::file("bin/app", b"candidate")]);
    fixture.release("1.0.0", &[("app-1.0.0.tar", &stable)]).unwrap();
    fixture
        .release_with_flags("1.1.0-rc.1", false, true, &[("app-1.1.0-rc.1.tar", &candidate)])
        .unwrap();
    let feed = fixture.open().unwrap();

    let config = UpdaterConfig {
        channel: Channel::Prerelease,
        asset_pattern: Some("app-*.tar".to_string()),
        target: Some(target.clone()),
        ..UpdaterConfig::default()
    };
    let updater = Updater::from_config(feed.clone(), &config).unwrap();

    let installed = updater.self_update_to_latest(&feed).unwrap();
    assert_eq!(installed.name, "1.1.0-rc.1");
    assert_eq!(std::fs::read(&target).unwrap(), b"candidate");
}

#[test]
fn test_missing_binary_leaves_target_untouched() {
    let (_install, target) = install_dir(b"current");

    let archive = tar_gz_archive(&[ArchiveEntry::file("other", b"x"), ArchiveEntry::dir("app/")]);
    let mut fixture = FeedFixture::new().unwrap();
    fixture.release("3.0.0", &[("app.tgz", &archive)]).unwrap();
    let feed = fixture.open().unwrap();

    let updater = Updater::new(feed.clone())
        .with_asset_filter(|_: &str| true)
        .with_target(&target, None);
    let err = updater.self_update_to_latest(&feed).unwrap_err();

    assert_eq!(err.release().unwrap().name, "3.0.0");
    assert!(matches!(
        err.root(),
        UpdateError::BinaryNotFound {
            source: ExtractError::NotFound,
            ..
        }
    ));
    assert!(!err.is_unrecoverable());
    assert_eq!(std::fs::read(&target).unwrap(), b"current");
    assert!(!StagedPaths::for_target(&target).new.exists());
}

#[test]
fn test_corrupt_gzip_is_decompression_error() {
    let (_install, target) = install_dir(b"current");

    let mut fixture = FeedFixture::new().unwrap();
    fixture.release("1.0.0", &[("app.tar.gz", b"this is not gzip data")]).unwrap();
    let feed = fixture.open().unwrap();

    let updater = Updater::new(feed.clone())
        .with_asset_filter(|_: &str| true)
        .with_target(&target, None);
    let err = updater.self_update_to_latest(&feed).unwrap_err();

    assert!(matches!(
        err.root(),
        UpdateError::BinaryNotFound {
            source: ExtractError::Decompression(_),
            ..
        }
    ));
    assert_eq!(std::fs::read(&target).unwrap(), b"current");
}

#[test]
fn test_no_acceptable_release() {
    let mut fixture = FeedFixture::new().unwrap();
    fixture.release("1.0.0", &[("app-windows.zip", b"PK")]).unwrap();
    let feed = fixture.open().unwrap();

    let updater =
        Updater::new(feed.clone()).with_asset_filter(|asset: &str| asset.contains("linux"));
    let err = updater.latest(&feed).unwrap_err();

    assert!(matches!(err, UpdateError::Select(SelectError::NoValidVersion { considered: 0 })));
}

#[test]
fn test_cancelled_update_touches_nothing() {
    let (_install, target) = install_dir(b"current");

    let mut fixture = FeedFixture::new().unwrap();
    fixture.release("9.9.9", &[("app.tar.gz", &app_archive(b"new"))]).unwrap();
    let feed = fixture.open().unwrap();

    let cancel = CancelToken::new();
    let updater = Updater::new(feed.clone())
        .with_asset_filter(|_: &str| true)
        .with_target(&target, None)
        .with_cancel_token(cancel.clone());

    assert_eq!(updater.latest(&feed).unwrap().name, "9.9.9");
    cancel.cancel();

    let err = updater.self_update_to_latest(&feed).unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(std::fs::read(&target).unwrap(), b"current");
}

#[test]
fn test_listing_is_capped() {
    let mut fixture = FeedFixture::new().unwrap();
    for minor in 0..5 {
        fixture.release(&format!("1.{minor}.0"), &[("app.tar", b"x")]).unwrap();
    }
    let feed = fixture.open().unwrap();
    assert_eq!(feed.list_releases(3).unwrap().len(), 3);

    let updater = Updater::new(feed.clone()).with_asset_filter(|_: &str| true).with_max_releases(3);
    assert_eq!(updater.latest(&feed).unwrap().name, "1.2.0");
}

/// Single-file "archives" whose payload is a header line followed by the binary.
struct Headered;

impl Extractor for Headered {
    fn matches(&self, filename: &str) -> bool {
        filename.ends_with(".hdr")
    }

    fn locate(
        &self,
        input: &mut dyn Read,
        is_binary: &dyn BinaryFilter,
    ) -> Result<Box<dyn Read + Send>, ExtractError> {
        let mut content = Vec::new();
        input.read_to_end(&mut content)?;
        let split = content.iter().position(|b| *b == b'\n').ok_or(ExtractError::NotFound)?;
        let name = String::from_utf8_lossy(&content[..split]).into_owned();

        if !is_binary.accept(&EntryInfo::new(name, false)) {
            return Err(ExtractError::NotFound);
        }
        Ok(Box::new(Cursor::new(content[split + 1..].to_vec())))
    }
}

#[test]
fn test_custom_format_plugs_in() {
    let (_install, target) = install_dir(b"current");

    let mut fixture = FeedFixture::new().unwrap();
    fixture.release("2.0.0", &[("app.hdr", b"app\nheadered payload")]).unwrap();
    let feed = fixture.open().unwrap();

    let mut updater = Updater::new(feed.clone())
        .with_asset_filter(|_: &str| true)
        .with_target(&target, None);
    assert!(updater.registry_mut().register("Headered", Headered));
    assert!(!updater.registry_mut().register("Headered", Headered));

    updater.self_update_to_latest(&feed).unwrap();
    assert_eq!(std::fs::read(&target).unwrap(), b"headered payload");
}
