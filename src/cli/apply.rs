//! Install a payload file that is already on disk.
//!
//! If the file name (or `--asset-name`) has a known archive extension the
//! executable is extracted from it first. Otherwise, or with `--raw`, the file
//! is installed as is.
//!
//! ```bash
//! selfswap apply ./app-1.2.0-linux-x86_64.tar.gz --target /usr/local/bin/app
//! selfswap apply ./app.bin --target ./app --mode 755
//! selfswap apply ./download.tmp --asset-name app.tgz --binary app
//! ```

use super::common::{TargetArgs, display_name, parse_mode};
use crate::apply::Replacer;
use crate::archive::{ExtractorRegistry, NamedBinary};
use crate::config::UpdaterConfig;
use crate::core::UpdateError;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use tracing::debug;

#[derive(Args, Debug)]
pub struct ApplyCommand {
    /// Payload to install: an archive or the executable itself
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Permission bits for the installed file, in octal
    #[arg(long, value_name = "MODE", value_parser = parse_mode)]
    pub mode: Option<u32>,

    /// Name used to detect the archive format instead of FILE's name
    #[arg(long, value_name = "NAME")]
    pub asset_name: Option<String>,

    /// Archive entry to install (defaults to the target's file name)
    #[arg(long, value_name = "NAME")]
    pub binary: Option<String>,

    /// Install FILE verbatim, without extraction
    #[arg(long, conflicts_with_all = ["asset_name", "binary"])]
    pub raw: bool,
}

impl ApplyCommand {
    pub fn execute(self, config: &UpdaterConfig) -> Result<()> {
        let target = self.target.resolve(config)?;
        let mode = self.mode.or(config.mode);

        let file = File::open(&self.file)
            .with_context(|| format!("Failed to open payload {}", self.file.display()))?;
        let mut input = BufReader::new(file);

        let asset = self.asset_name.clone().unwrap_or_else(|| display_name(&self.file));
        let registry = ExtractorRegistry::with_builtin_formats();

        let mut payload: Box<dyn Read> = match registry.find_match(&asset) {
            Some((format, extractor)) if !self.raw => {
                let binary = match &self.binary {
                    Some(name) => NamedBinary::new(name.as_str()),
                    None => NamedBinary::for_path(&target),
                };
                debug!("Extracting {} from {} as {}", binary.name(), asset, format);

                extractor.locate(&mut input, &binary).map_err(|source| UpdateError::BinaryNotFound {
                    binary: binary.name().to_string(),
                    asset: asset.clone(),
                    source,
                })?
            }
            _ => Box::new(input),
        };

        Replacer::new().apply(&mut payload, Some(&target), mode)?;

        let installed = format!("Installed {} to {}", display_name(&self.file), target.display());
        println!("{}", installed.green());
        Ok(())
    }
}
