//! Release model, filters and the collaborator traits around them.
//!
//! A release feed is reached through two collaborators that the core never
//! implements against a specific hosting API:
//!
//! - [`ReleaseLister`] returns the raw [`ListedRelease`] candidates
//! - [`ReleaseFetcher`] turns a chosen [`Release`] into a byte stream
//!
//! [`select::select_latest`] sits between the two and narrows the listing down
//! to the one release to install, using a [`ReleaseFilter`] (channel policy)
//! and an [`AssetFilter`] (platform policy).
//!
//! [`feed::LocalFeed`] is a file-backed implementation of both collaborators.

pub mod feed;
pub mod select;

pub use feed::LocalFeed;
pub use select::{SelectError, is_newer, parse_version, select_latest};

use anyhow::Result;
use std::io::Read;

/// One published version chosen for installation, paired with the asset to
/// download for this platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Release name, normally a semantic version.
    pub name: String,
    /// Filename of the artifact to download.
    pub asset: String,
    /// Opaque location resolved by the [`ReleaseFetcher`].
    pub location: String,
}

/// A downloadable artifact attached to a listed release.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReleaseAsset {
    pub name: String,
    pub location: String,
}

impl ReleaseAsset {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }
}

/// A release as reported by a [`ReleaseLister`], before any filtering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListedRelease {
    pub name: String,
    pub draft: bool,
    pub prerelease: bool,
    /// Assets in the order the feed reports them.
    pub assets: Vec<ReleaseAsset>,
}

impl ListedRelease {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn draft(mut self, draft: bool) -> Self {
        self.draft = draft;
        self
    }

    pub fn prerelease(mut self, prerelease: bool) -> Self {
        self.prerelease = prerelease;
        self
    }

    pub fn asset(mut self, name: impl Into<String>, location: impl Into<String>) -> Self {
        self.assets.push(ReleaseAsset::new(name, location));
        self
    }
}

/// Source of candidate releases.
///
/// Any order is acceptable; the selector does not assume the listing is sorted,
/// but it does need every candidate up to `max`.
pub trait ReleaseLister {
    fn list_releases(&self, max: usize) -> Result<Vec<ListedRelease>>;
}

/// Opens the byte stream of a chosen release's asset.
pub trait ReleaseFetcher {
    fn fetch(&self, release: &Release) -> Result<Box<dyn Read + Send>>;
}

/// Channel policy over `(name, draft, prerelease)`.
pub trait ReleaseFilter {
    fn accept(&self, name: &str, draft: bool, prerelease: bool) -> bool;
}

impl<F> ReleaseFilter for F
where
    F: Fn(&str, bool, bool) -> bool,
{
    fn accept(&self, name: &str, draft: bool, prerelease: bool) -> bool {
        self(name, draft, prerelease)
    }
}

/// Platform policy over an asset filename.
pub trait AssetFilter {
    fn accept(&self, asset: &str) -> bool;
}

impl<F> AssetFilter for F
where
    F: Fn(&str) -> bool,
{
    fn accept(&self, asset: &str) -> bool {
        self(asset)
    }
}

/// Rejects drafts and prereleases.
#[derive(Debug, Clone, Copy, Default)]
pub struct StableRelease;

impl ReleaseFilter for StableRelease {
    fn accept(&self, _name: &str, draft: bool, prerelease: bool) -> bool {
        !draft && !prerelease
    }
}

/// Accepts every release.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyRelease;

impl ReleaseFilter for AnyRelease {
    fn accept(&self, _name: &str, _draft: bool, _prerelease: bool) -> bool {
        true
    }
}

/// Rejects drafts only; prereleases are accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonDraft;

impl ReleaseFilter for NonDraft {
    fn accept(&self, _name: &str, draft: bool, _prerelease: bool) -> bool {
        !draft
    }
}

/// Accepts assets whose name mentions both the operating system and the CPU
/// architecture, allowing the usual spellings of each (`darwin` for macOS,
/// `amd64` for x86_64, `arm64` for aarch64, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformAsset {
    os: Vec<String>,
    arch: Vec<String>,
}

impl PlatformAsset {
    /// Filter for the platform this binary was compiled for.
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn new(os: &str, arch: &str) -> Self {
        let os = match os {
            "macos" => aliases(&["macos", "darwin", "apple"]),
            "windows" => aliases(&["windows", "win64"]),
            other => aliases(&[other]),
        };
        let arch = match arch {
            "x86_64" => aliases(&["x86_64", "amd64", "x64"]),
            "aarch64" => aliases(&["aarch64", "arm64"]),
            "x86" => aliases(&["i686", "i386", "x86"]),
            "arm" => aliases(&["armv7", "arm"]),
            other => aliases(&[other]),
        };
        Self { os, arch }
    }
}

fn aliases(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_lowercase()).collect()
}

impl AssetFilter for PlatformAsset {
    fn accept(&self, asset: &str) -> bool {
        let asset = asset.to_lowercase();
        self.os.iter().any(|os| asset.contains(os))
            && self.arch.iter().any(|arch| asset.contains(arch))
    }
}

/// Accepts asset names matching a glob pattern, ignoring case.
#[derive(Debug, Clone)]
pub struct AssetPattern {
    pattern: glob::Pattern,
}

impl AssetPattern {
    pub fn new(pattern: &str) -> Result<Self, glob::PatternError> {
        Ok(Self {
            pattern: glob::Pattern::new(pattern)?,
        })
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl AssetFilter for AssetPattern {
    fn accept(&self, asset: &str) -> bool {
        let options = glob::MatchOptions {
            case_sensitive: false,
            ..glob::MatchOptions::new()
        };
        self.pattern.matches_with(asset, options)
    }
}
