//! End-to-end self-update.
//!
//! [`Updater`] composes the pieces of the crate into one pipeline:
//!
//! ```text
//! ReleaseLister ──► select_latest ──► ReleaseFetcher ──► ExtractorRegistry ──► Replacer
//!   (list)           (filters)          (byte stream)      (locate binary)      (swap)
//! ```
//!
//! Everything runs synchronously on the calling thread. A [`CancelToken`] can
//! stop an attempt before listing, before fetching and before the replacement
//! starts; once the replacement has begun it always runs to completion or
//! rollback.

use crate::apply::{self, Replacer};
use crate::archive::{ExtractorRegistry, NamedBinary};
use crate::config::UpdaterConfig;
use crate::core::UpdateError;
use crate::release::{
    AssetFilter, PlatformAsset, Release, ReleaseFetcher, ReleaseFilter, ReleaseLister,
    StableRelease, select_latest,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Number of releases requested from the lister unless configured otherwise.
pub const DEFAULT_MAX_RELEASES: usize = 50;

/// Shared flag for cancelling an update from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Self-update orchestrator.
///
/// # Examples
///
/// ```rust,no_run
/// use selfswap::release::LocalFeed;
/// use selfswap::updater::Updater;
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// let feed = LocalFeed::open(Path::new("/srv/releases/releases.toml"))?;
/// let updater = Updater::new(feed.clone());
///
/// let installed = updater.self_update_to_latest(&feed)?;
/// println!("Installed {}", installed.name);
/// # Ok(())
/// # }
/// ```
pub struct Updater {
    registry: ExtractorRegistry,
    fetcher: Box<dyn ReleaseFetcher>,
    release_filter: Box<dyn ReleaseFilter>,
    asset_filter: Box<dyn AssetFilter>,
    max_releases: usize,
    target: Option<PathBuf>,
    mode: Option<u32>,
    cancel: CancelToken,
}

impl Updater {
    /// Updater with the built-in archive formats, the stable channel and
    /// assets matched against the current platform.
    pub fn new(fetcher: impl ReleaseFetcher + 'static) -> Self {
        Self {
            registry: ExtractorRegistry::with_builtin_formats(),
            fetcher: Box::new(fetcher),
            release_filter: Box::new(StableRelease),
            asset_filter: Box::new(PlatformAsset::current()),
            max_releases: DEFAULT_MAX_RELEASES,
            target: None,
            mode: None,
            cancel: CancelToken::new(),
        }
    }

    /// Updater with channel, asset pattern, target and listing cap taken from
    /// `config`.
    pub fn from_config(
        fetcher: impl ReleaseFetcher + 'static,
        config: &UpdaterConfig,
    ) -> anyhow::Result<Self> {
        let mut updater = Self::new(fetcher)
            .with_max_releases(config.max_releases)
            .with_boxed_release_filter(config.release_filter())
            .with_boxed_asset_filter(config.asset_filter()?);
        updater.target = config.target.clone();
        updater.mode = config.mode;
        Ok(updater)
    }

    /// Replaces `target` instead of the running executable. `mode` defaults to
    /// the target's current permission bits.
    pub fn with_target(mut self, target: impl Into<PathBuf>, mode: Option<u32>) -> Self {
        self.target = Some(target.into());
        self.mode = mode;
        self
    }

    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_release_filter(self, filter: impl ReleaseFilter + 'static) -> Self {
        self.with_boxed_release_filter(Box::new(filter))
    }

    pub fn with_asset_filter(self, filter: impl AssetFilter + 'static) -> Self {
        self.with_boxed_asset_filter(Box::new(filter))
    }

    pub fn with_boxed_release_filter(mut self, filter: Box<dyn ReleaseFilter>) -> Self {
        self.release_filter = filter;
        self
    }

    pub fn with_boxed_asset_filter(mut self, filter: Box<dyn AssetFilter>) -> Self {
        self.asset_filter = filter;
        self
    }

    pub fn with_max_releases(mut self, max_releases: usize) -> Self {
        self.max_releases = max_releases;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    /// Mutable access for registering additional formats.
    pub fn registry_mut(&mut self) -> &mut ExtractorRegistry {
        &mut self.registry
    }

    pub fn max_releases(&self) -> usize {
        self.max_releases
    }

    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    /// Lists releases and selects the one that would be installed.
    pub fn latest(&self, lister: &dyn ReleaseLister) -> Result<Release, UpdateError> {
        self.check_cancelled()?;

        debug!("Listing up to {} releases", self.max_releases);
        let releases = lister.list_releases(self.max_releases).map_err(UpdateError::List)?;
        debug!("Lister returned {} release(s)", releases.len());

        let release =
            select_latest(&releases, self.release_filter.as_ref(), self.asset_filter.as_ref())?;
        Ok(release)
    }

    /// Installs `release` over the target executable.
    ///
    /// The asset is fetched, the archive format is picked from the asset name,
    /// the entry whose base name equals the target's file name is located and
    /// its bytes are swapped in with the crash-safe replacement protocol.
    ///
    /// # Errors
    ///
    /// One [`UpdateError`] variant per step. An unrecoverable replacement is
    /// reported through [`UpdateError::is_unrecoverable`].
    pub fn self_update(&self, release: &Release) -> Result<(), UpdateError> {
        let (target, mode) = self.resolve_target()?;
        let binary = NamedBinary::for_path(&target);
        info!("Updating {} to release {}", target.display(), release.name);

        self.check_cancelled()?;
        let mut stream = self.fetcher.fetch(release).map_err(|source| UpdateError::Fetch {
            release: release.name.clone(),
            source,
        })?;

        let (format, extractor) =
            self.registry.find_match(&release.asset).ok_or_else(|| UpdateError::NoExtractor {
                asset: release.asset.clone(),
            })?;
        debug!("Extracting {} as {}", release.asset, format);

        let mut payload =
            extractor.locate(&mut stream, &binary).map_err(|source| UpdateError::BinaryNotFound {
                binary: binary.name().to_string(),
                asset: release.asset.clone(),
                source,
            })?;

        self.check_cancelled()?;
        Replacer::new().apply(&mut payload, Some(&target), mode)?;

        info!("Updated {} to release {}", target.display(), release.name);
        Ok(())
    }

    /// Lists, selects and installs the latest acceptable release.
    ///
    /// Returns the installed release. Failures after selection come back as
    /// [`UpdateError::Install`] so the chosen release is known to the caller.
    pub fn self_update_to_latest(
        &self,
        lister: &dyn ReleaseLister,
    ) -> Result<Release, UpdateError> {
        let release = self.latest(lister)?;

        match self.self_update(&release) {
            Ok(()) => Ok(release),
            Err(source) => Err(UpdateError::Install {
                release: Box::new(release),
                source: Box::new(source),
            }),
        }
    }

    fn resolve_target(&self) -> Result<(PathBuf, Option<u32>), UpdateError> {
        match &self.target {
            Some(target) => Ok((target.clone(), self.mode)),
            None => {
                let (path, exe_mode) = apply::executable_info().map_err(UpdateError::Executable)?;
                Ok((path, Some(self.mode.unwrap_or(exe_mode))))
            }
        }
    }

    fn check_cancelled(&self) -> Result<(), UpdateError> {
        if self.cancel.is_cancelled() {
            debug!("Update cancelled");
            return Err(UpdateError::Cancelled);
        }
        Ok(())
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("registry", &self.registry)
            .field("max_releases", &self.max_releases)
            .field("target", &self.target)
            .field("mode", &self.mode)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
