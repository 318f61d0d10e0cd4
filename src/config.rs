//! Updater configuration.
//!
//! Settings are read from a TOML file, by default `~/.selfswap/config.toml`
//! (`%LOCALAPPDATA%\selfswap\config.toml` on Windows). The location can be
//! overridden with the `SELFSWAP_CONFIG` environment variable. A missing file
//! is not an error; every key has a default.
//!
//! ```toml
//! max_releases = 50
//! channel = "stable"                 # or "prerelease"
//! asset_pattern = "app-*-linux-*.tar.gz"
//! target = "/usr/local/bin/app"
//! mode = 0o755
//! feed = "/srv/releases/releases.toml"
//! ```
//!
//! Command-line flags take precedence over file values.

use crate::release::{
    AssetFilter, AssetPattern, NonDraft, PlatformAsset, ReleaseFilter, StableRelease,
};
use crate::updater::DEFAULT_MAX_RELEASES;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "SELFSWAP_CONFIG";

/// Which releases are eligible for installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Published releases only, no drafts or prereleases.
    #[default]
    Stable,
    /// Prereleases as well; drafts are still skipped.
    Prerelease,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdaterConfig {
    /// Cap on the number of releases requested from the lister.
    #[serde(default = "default_max_releases")]
    pub max_releases: usize,

    #[serde(default)]
    pub channel: Channel,

    /// Glob for asset names. Without it assets are matched against the
    /// current OS and architecture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_pattern: Option<String>,

    /// File to replace instead of the running executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<PathBuf>,

    /// Permission bits for the installed file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,

    /// Local release feed index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed: Option<PathBuf>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            max_releases: default_max_releases(),
            channel: Channel::default(),
            asset_pattern: None,
            target: None,
            mode: None,
            feed: None,
        }
    }
}

fn default_max_releases() -> usize {
    DEFAULT_MAX_RELEASES
}

impl UpdaterConfig {
    /// Loads the config from `path`, or from [`default_path`](Self::default_path)
    /// when `path` is `None`. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if path.exists() {
            Self::load_from(&path)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("selfswap")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".selfswap")
        };

        Ok(config_dir.join("config.toml"))
    }

    pub fn release_filter(&self) -> Box<dyn ReleaseFilter> {
        match self.channel {
            Channel::Stable => Box::new(StableRelease),
            Channel::Prerelease => Box::new(NonDraft),
        }
    }

    pub fn asset_filter(&self) -> Result<Box<dyn AssetFilter>> {
        match &self.asset_pattern {
            Some(pattern) => {
                let pattern = AssetPattern::new(pattern)
                    .with_context(|| format!("Invalid asset pattern '{pattern}'"))?;
                Ok(Box::new(pattern))
            }
            None => Ok(Box::new(PlatformAsset::current())),
        }
    }
}
