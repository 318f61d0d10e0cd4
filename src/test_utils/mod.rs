//! Test utilities for selfswap
//!
//! Helpers shared by unit tests and the integration suite (enabled there
//! through the `test-utils` feature):
//! - [`init_test_logging`] - one-time tracing setup
//! - [`tar_archive`] / [`tar_gz_archive`] - in-memory archives built from
//!   [`ArchiveEntry`] lists
//! - [`FeedFixture`] - a temporary local release feed with asset files

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` if given, otherwise `RUST_LOG`. With neither, tests run
/// without a subscriber.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// One entry of a synthetic archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEntry {
    File { path: String, content: Vec<u8> },
    Dir { path: String },
}

impl ArchiveEntry {
    pub fn file(path: impl Into<String>, content: &[u8]) -> Self {
        Self::File {
            path: path.into(),
            content: content.to_vec(),
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self::Dir { path: path.into() }
    }
}

/// Builds an uncompressed tar archive holding `entries` in order.
///
/// # Panics
///
/// Panics if an entry path is not representable in a tar header.
pub fn tar_archive(entries: &[ArchiveEntry]) -> Vec<u8> {
    write_tar(Vec::new(), entries).expect("failed to build tar archive")
}

/// Builds a gzip-compressed tar archive holding `entries` in order.
///
/// # Panics
///
/// Panics if an entry path is not representable in a tar header.
pub fn tar_gz_archive(entries: &[ArchiveEntry]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    write_tar(encoder, entries)
        .and_then(GzEncoder::finish)
        .expect("failed to build tar.gz archive")
}

fn write_tar<W: Write>(writer: W, entries: &[ArchiveEntry]) -> io::Result<W> {
    let mut builder = tar::Builder::new(writer);

    for entry in entries {
        let mut header = tar::Header::new_gnu();
        header.set_mode(0o755);
        match entry {
            ArchiveEntry::File { path, content } => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_size(content.len() as u64);
                builder.append_data(&mut header, path, content.as_slice())?;
            }
            ArchiveEntry::Dir { path } => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_size(0);
                builder.append_data(&mut header, path, io::empty())?;
            }
        }
    }

    builder.into_inner()
}

/// A local release feed in a temporary directory.
///
/// Every added release rewrites `releases.toml`; asset files are stored under
/// `<release name>/<asset name>`.
///
/// ```rust,no_run
/// use selfswap::test_utils::FeedFixture;
///
/// let mut fixture = FeedFixture::new().unwrap();
/// fixture.release("1.0.0", &[("app.tar", b"bytes")]).unwrap();
/// let feed = fixture.open().unwrap();
/// ```
pub struct FeedFixture {
    dir: TempDir,
    index: String,
}

impl FeedFixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new().context("Failed to create feed directory")?,
            index: String::new(),
        })
    }

    /// Adds a stable release.
    pub fn release(&mut self, name: &str, assets: &[(&str, &[u8])]) -> Result<&mut Self> {
        self.release_with_flags(name, false, false, assets)
    }

    pub fn release_with_flags(
        &mut self,
        name: &str,
        draft: bool,
        prerelease: bool,
        assets: &[(&str, &[u8])],
    ) -> Result<&mut Self> {
        let _ = write!(
            self.index,
            "[[release]]\nname = \"{name}\"\ndraft = {draft}\nprerelease = {prerelease}\n\n"
        );

        for (asset, content) in assets {
            let relative = format!("{name}/{asset}");
            let path = self.dir.path().join(&relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;

            let _ = write!(
                self.index,
                "[[release.asset]]\nname = \"{asset}\"\npath = \"{relative}\"\n\n"
            );
        }

        std::fs::write(self.index_path(), &self.index).context("Failed to write feed index")?;
        Ok(self)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.path().join("releases.toml")
    }

    pub fn open(&self) -> Result<crate::release::LocalFeed> {
        crate::release::LocalFeed::open(&self.index_path())
    }
}
