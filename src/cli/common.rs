//! Arguments and helpers shared by several commands.

use crate::config::{Channel, UpdaterConfig};
use crate::release::LocalFeed;
use anyhow::{Context, Result, anyhow};
use clap::Args;
use std::path::{Path, PathBuf};

/// Where releases come from and which of them are eligible.
#[derive(Args, Debug, Clone, Default)]
pub struct FeedArgs {
    /// Local release feed index (releases.toml)
    #[arg(long, value_name = "PATH", env = "SELFSWAP_FEED")]
    pub feed: Option<PathBuf>,

    /// Consider prereleases as well as stable releases
    #[arg(long)]
    pub prerelease: bool,

    /// Glob matched against asset names instead of the current platform
    #[arg(long, value_name = "GLOB")]
    pub asset_pattern: Option<String>,

    /// Maximum number of releases to list
    #[arg(long, value_name = "N")]
    pub max_releases: Option<usize>,
}

impl FeedArgs {
    /// Layers the flags over the file configuration.
    pub fn merge_into(&self, config: &UpdaterConfig) -> UpdaterConfig {
        let mut merged = config.clone();
        if let Some(feed) = &self.feed {
            merged.feed = Some(feed.clone());
        }
        if self.prerelease {
            merged.channel = Channel::Prerelease;
        }
        if let Some(pattern) = &self.asset_pattern {
            merged.asset_pattern = Some(pattern.clone());
        }
        if let Some(max) = self.max_releases {
            merged.max_releases = max;
        }
        merged
    }
}

/// The file being replaced.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// File to replace instead of the running executable
    #[arg(long, value_name = "PATH")]
    pub target: Option<PathBuf>,
}

impl TargetArgs {
    /// The flag, else the configured target, else the running executable.
    pub fn resolve(&self, config: &UpdaterConfig) -> Result<PathBuf> {
        if let Some(target) = self.target.as_ref().or(config.target.as_ref()) {
            return Ok(target.clone());
        }
        std::env::current_exe().context("Failed to get current executable path")
    }
}

/// Opens the feed named in `config`.
pub fn open_feed(config: &UpdaterConfig) -> Result<LocalFeed> {
    let index = config.feed.as_deref().ok_or_else(|| {
        anyhow!("No release feed configured; pass --feed or set 'feed' in the config file")
    })?;
    LocalFeed::open(index)
}

/// Parses permission bits written in octal, with or without a `0o` or `0`
/// prefix (`755`, `0755`, `0o755`).
pub fn parse_mode(value: &str) -> Result<u32, String> {
    let digits = value.strip_prefix("0o").unwrap_or(value);
    let mode = u32::from_str_radix(digits, 8)
        .map_err(|e| format!("invalid octal mode '{value}': {e}"))?;
    if mode > 0o7777 {
        return Err(format!("mode '{value}' is out of range"));
    }
    Ok(mode)
}

/// File name used in messages.
pub fn display_name(path: &Path) -> String {
    path.file_name().unwrap_or(path.as_os_str()).to_string_lossy().into_owned()
}
