//! Install the latest release over the target executable.
//!
//! The release is only installed when it is newer than `--current` (this
//! build's version by default); `--force` installs it regardless.
//!
//! ```bash
//! selfswap update --feed /srv/releases/releases.toml
//! selfswap update --feed ./releases.toml --target ./bin/app --current 1.0.0
//! ```

use super::common::{FeedArgs, TargetArgs, open_feed, parse_mode};
use crate::config::UpdaterConfig;
use crate::core::UpdateError;
use crate::release::is_newer;
use crate::updater::Updater;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::debug;

#[derive(Args, Debug)]
pub struct UpdateCommand {
    #[command(flatten)]
    pub feed: FeedArgs,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Permission bits for the installed file, in octal
    #[arg(long, value_name = "MODE", value_parser = parse_mode)]
    pub mode: Option<u32>,

    /// Version currently installed at the target (defaults to this build's version)
    #[arg(long, value_name = "VERSION")]
    pub current: Option<String>,

    /// Install even if the latest release is not newer
    #[arg(short, long)]
    pub force: bool,
}

impl UpdateCommand {
    pub fn execute(self, config: &UpdaterConfig) -> Result<()> {
        let mut config = self.feed.merge_into(config);
        config.target = Some(self.target.resolve(&config)?);
        if self.mode.is_some() {
            config.mode = self.mode;
        }

        let feed = open_feed(&config)?;
        let updater = Updater::from_config(feed.clone(), &config)?;

        println!("{}", "Checking for updates...".cyan());
        let release = updater.latest(&feed).context("Failed to check for updates")?;

        let current = self.current.unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
        if !self.force && !is_newer(&current, &release.name) {
            println!("{}", format!("You are on the latest version ({current})").green());
            return Ok(());
        }
        debug!("Installing {} over {}", release.name, current);

        println!("Installing {} ({})", release.name, release.asset);
        updater.self_update(&release).map_err(|source| UpdateError::Install {
            release: Box::new(release.clone()),
            source: Box::new(source),
        })?;

        println!("{}", format!("Successfully updated to {}", release.name).green());
        Ok(())
    }
}
