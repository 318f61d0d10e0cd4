//! File-backed release feed.
//!
//! A local feed is a TOML index describing releases whose assets are files on
//! disk. It implements both [`ReleaseLister`] and [`ReleaseFetcher`], which makes
//! it usable for air-gapped installs, mirrors synced by other tooling, and
//! tests.
//!
//! # Index format
//!
//! ```toml
//! [[release]]
//! name = "1.2.0"
//! draft = false        # optional, defaults to false
//! prerelease = false   # optional, defaults to false
//!
//! [[release.asset]]
//! name = "app-x86_64-unknown-linux-gnu.tar.gz"
//! path = "1.2.0/app-x86_64-unknown-linux-gnu.tar.gz"
//! ```
//!
//! Relative asset paths are resolved against the directory holding the index.

use super::{ListedRelease, Release, ReleaseAsset, ReleaseFetcher, ReleaseLister};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct FeedIndex {
    #[serde(default, rename = "release")]
    releases: Vec<FeedRelease>,
}

#[derive(Debug, Clone, Deserialize)]
struct FeedRelease {
    name: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
    #[serde(default, rename = "asset")]
    assets: Vec<FeedAsset>,
}

#[derive(Debug, Clone, Deserialize)]
struct FeedAsset {
    name: String,
    path: PathBuf,
}

/// Release feed read from a TOML index on disk.
#[derive(Debug, Clone)]
pub struct LocalFeed {
    root: PathBuf,
    releases: Vec<FeedRelease>,
}

impl LocalFeed {
    /// Reads and parses the index at `index`.
    pub fn open(index: &Path) -> Result<Self> {
        let content = fs::read_to_string(index)
            .with_context(|| format!("Failed to read release feed {}", index.display()))?;
        let root = index.parent().map(Path::to_path_buf).unwrap_or_default();

        Self::parse(root, &content)
            .with_context(|| format!("Failed to parse release feed {}", index.display()))
    }

    /// Parses index `content`, resolving relative asset paths against `root`.
    pub fn parse(root: impl Into<PathBuf>, content: &str) -> Result<Self> {
        let index: FeedIndex = toml::from_str(content)?;
        let root = root.into();
        debug!("Loaded {} release(s) from feed at {}", index.releases.len(), root.display());

        Ok(Self {
            root,
            releases: index.releases,
        })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl ReleaseLister for LocalFeed {
    fn list_releases(&self, max: usize) -> Result<Vec<ListedRelease>> {
        Ok(self
            .releases
            .iter()
            .take(max)
            .map(|release| ListedRelease {
                name: release.name.clone(),
                draft: release.draft,
                prerelease: release.prerelease,
                assets: release
                    .assets
                    .iter()
                    .map(|asset| ReleaseAsset {
                        name: asset.name.clone(),
                        location: self.resolve(&asset.path).to_string_lossy().into_owned(),
                    })
                    .collect(),
            })
            .collect())
    }
}

impl ReleaseFetcher for LocalFeed {
    fn fetch(&self, release: &Release) -> Result<Box<dyn Read + Send>> {
        // Listed locations are already resolved against the index directory.
        let path = Path::new(&release.location);
        debug!("Opening release {} asset {}", release.name, path.display());

        let file = fs::File::open(path)
            .with_context(|| format!("Failed to open release asset {}", path.display()))?;
        Ok(Box::new(BufReader::new(file)))
    }
}
