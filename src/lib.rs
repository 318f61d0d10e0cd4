//! selfswap - crash-safe self-update for executables
//!
//! A running program replaces its own executable with a newer release without
//! ever leaving the host without a working executable on disk.
//!
//! # Architecture Overview
//!
//! An update runs as a pipeline, leaves first:
//!
//! 1. a [`release::ReleaseLister`] reports candidate releases
//! 2. [`release::select_latest`] picks the newest one that passes the channel
//!    and platform filters
//! 3. a [`release::ReleaseFetcher`] opens the chosen asset as a byte stream
//! 4. the [`archive::ExtractorRegistry`] finds a format handler for the asset
//!    name, which locates the executable inside the archive
//! 5. [`apply::Replacer`] swaps the new bytes into place with a rename
//!    sequence that can always be rolled back or recovered by hand
//!
//! [`updater::Updater`] composes these steps. Listing and fetching are traits
//! so any release host can be plugged in; [`release::LocalFeed`] is the
//! bundled file-backed implementation.
//!
//! # Core Modules
//!
//! - [`apply`] - atomic replacement protocol and staging-file fix-ups
//! - [`archive`] - pluggable archive extractors (`.tar`, `.tar.gz`)
//! - [`release`] - release model, filters, version selection and the local feed
//! - [`updater`] - end-to-end orchestration with cancellation
//!
//! ## Supporting Modules
//!
//! - [`config`] - `~/.selfswap/config.toml` settings
//! - [`core`] - error taxonomy and user-facing error rendering
//! - [`cli`] - the `selfswap` command-line interface
//!
//! # Example
//!
//! ```rust,no_run
//! use selfswap::release::LocalFeed;
//! use selfswap::updater::Updater;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let feed = LocalFeed::open(Path::new("/srv/releases/releases.toml"))?;
//! let updater = Updater::new(feed.clone()).with_target("/usr/local/bin/app", None);
//!
//! match updater.self_update_to_latest(&feed) {
//!     Ok(release) => println!("Updated to {}", release.name),
//!     Err(e) if e.is_unrecoverable() => eprintln!("Manual recovery needed: {e}"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod apply;
pub mod archive;
pub mod cli;
pub mod config;
pub mod core;
pub mod release;
pub mod updater;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
