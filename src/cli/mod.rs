//! Command-line interface for selfswap.
//!
//! # Commands
//!
//! - `check` - report whether a newer release is available
//! - `update` - install the latest release from a feed
//! - `apply` - install a payload file already on disk
//! - `recover` - restore the previous executable after a failed swap
//! - `clean` - remove orphaned staging files
//!
//! # Global Options
//!
//! - `--verbose` / `-v` - debug logging
//! - `--quiet` / `-q` - no logging
//! - `--config` / `-c` - config file (see [`crate::config`])
//!
//! `RUST_LOG` takes precedence over both logging flags.

mod apply;
mod check;
pub mod common;
mod staging;
mod update;

use crate::config::UpdaterConfig;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Settings derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// `None` disables logging.
    pub log_level: Option<String>,

    pub config_path: Option<PathBuf>,
}

#[derive(Parser)]
#[command(
    name = "selfswap",
    about = "Crash-safe self-update for executables",
    version,
    long_about = "selfswap selects the newest release from a feed, extracts the executable \
                  from its archive and swaps it into place so that a working executable \
                  always exists on disk."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Disable logging
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the config file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a newer release is available
    Check(check::CheckCommand),

    /// Install the latest release
    Update(update::UpdateCommand),

    /// Install a payload file over the target
    Apply(apply::ApplyCommand),

    /// Restore the previous executable after a failed update
    Recover(staging::RecoverCommand),

    /// Remove leftover staging files
    Clean(staging::CleanCommand),
}

impl Cli {
    pub fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config)
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("info".to_string())
        };

        CliConfig {
            log_level,
            config_path: self.config.clone(),
        }
    }

    pub fn execute_with_config(self, config: CliConfig) -> Result<()> {
        init_logging(config.log_level.as_deref());
        let settings = UpdaterConfig::load(config.config_path.as_deref())?;

        match self.command {
            Commands::Check(cmd) => cmd.execute(&settings),
            Commands::Update(cmd) => cmd.execute(&settings),
            Commands::Apply(cmd) => cmd.execute(&settings),
            Commands::Recover(cmd) => cmd.execute(&settings),
            Commands::Clean(cmd) => cmd.execute(&settings),
        }
    }
}

fn init_logging(level: Option<&str>) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if let Some(level) = level {
        EnvFilter::new(level)
    } else {
        return;
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
