//! Manual fix-ups for the `.<name>.new` / `.<name>.old` staging files.
//!
//! `recover` puts the previous executable back after a replacement that could
//! not be rolled back. `clean` deletes orphaned staging files.

use super::common::TargetArgs;
use crate::apply::{StagedPaths, clean_staged, recover};
use crate::config::UpdaterConfig;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct RecoverCommand {
    #[command(flatten)]
    pub target: TargetArgs,
}

impl RecoverCommand {
    pub fn execute(self, config: &UpdaterConfig) -> Result<()> {
        let target = self.target.resolve(config)?;

        if recover(&target)? {
            let staged = StagedPaths::for_target(&target);
            println!(
                "{}",
                format!("Restored {} from {}", target.display(), staged.old.display()).green()
            );
        } else {
            println!("Nothing to recover for {}", target.display());
        }

        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct CleanCommand {
    #[command(flatten)]
    pub target: TargetArgs,
}

impl CleanCommand {
    pub fn execute(self, config: &UpdaterConfig) -> Result<()> {
        let target = self.target.resolve(config)?;
        let removed = clean_staged(&target);

        if removed.is_empty() {
            println!("No staging files found next to {}", target.display());
        } else {
            for path in &removed {
                println!("Removed {}", path.display());
            }
            println!("{}", format!("Cleaned {} staging file(s)", removed.len()).green());
        }

        Ok(())
    }
}
