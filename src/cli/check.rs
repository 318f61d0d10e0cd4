//! Report whether a newer release is available, without installing it.
//!
//! ```bash
//! selfswap check --feed /srv/releases/releases.toml
//! selfswap check --feed ./releases.toml --current 1.4.0 --prerelease
//! ```

use super::common::{FeedArgs, open_feed};
use crate::config::UpdaterConfig;
use crate::release::is_newer;
use crate::updater::Updater;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct CheckCommand {
    #[command(flatten)]
    pub feed: FeedArgs,

    /// Version to compare against (defaults to this build's version)
    #[arg(long, value_name = "VERSION")]
    pub current: Option<String>,
}

impl CheckCommand {
    pub fn execute(self, config: &UpdaterConfig) -> Result<()> {
        let config = self.feed.merge_into(config);
        let feed = open_feed(&config)?;
        let updater = Updater::from_config(feed.clone(), &config)?;

        let current = self.current.unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
        let latest = updater.latest(&feed).context("Failed to check for updates")?;

        if is_newer(&current, &latest.name) {
            println!("{}", format!("Update available: {} -> {}", current, latest.name).green());
            println!("Asset: {}", latest.asset);
        } else {
            println!("{}", format!("You are on the latest version ({current})").green());
        }

        Ok(())
    }
}
