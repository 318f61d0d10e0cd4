//! Crash-safe replacement of an executable on disk.
//!
//! [`Replacer::apply`] swaps new content into place with three renames so that
//! at every point either the target path or its `.old` sibling holds a working
//! previous executable:
//!
//! ```text
//! 1. write  content      -> .app.new   (mode applied, synced)
//! 2. remove .app.old                   (stale leftover, best effort)
//! 3. rename app          -> .app.old   (abort on failure, target untouched)
//! 4. rename .app.new     -> app        (commit point)
//!    └── on failure: rename .app.old -> app (rollback)
//! 5. remove .app.old                   (hide it if removal is refused)
//! ```
//!
//! The only window without a file at the target path is between steps 3 and 4.
//! If the commit fails *and* the rollback fails, the previous executable is
//! left at `.app.old` and [`ApplyError::Unrecoverable`] is returned carrying
//! both causes; [`recover`] performs the manual fix-up.
//!
//! Once step 3 starts the sequence always runs to completion or to a
//! deliberate rollback; there is no cancellation point inside it.

mod ops;
mod staging;

pub use ops::{OsFs, ReplaceFs};
pub use staging::{StagedPaths, clean_staged, recover};

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Failures of the replacement protocol, one variant per step.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The running executable's path could not be determined.
    #[error("unable to get the running executable")]
    Executable {
        #[source]
        source: io::Error,
    },

    /// The target (or the running executable) could not be inspected.
    #[error("unable to stat {}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Staging the new content failed. Nothing was committed.
    #[error("failed to write staged executable {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Moving the current target aside failed. The target is untouched.
    #[error("failed to move {} to {}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The commit rename failed and the previous executable was restored.
    #[error(
        "failed to move the new executable into {}; the previous executable was restored",
        path.display()
    )]
    Commit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The commit rename failed and so did the rollback. The target path has
    /// no file and the previous executable sits at `old_path`.
    #[error(
        "failed to move the new executable into {} and failed to restore the previous one (rollback error: {rollback}); it remains at {}",
        target.display(),
        old_path.display()
    )]
    Unrecoverable {
        target: PathBuf,
        old_path: PathBuf,
        #[source]
        commit: io::Error,
        rollback: io::Error,
    },
}

impl ApplyError {
    /// Whether this is the state that needs manual intervention.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::Unrecoverable { .. })
    }

    /// The commit rename failure, for both commit outcomes.
    pub fn commit_error(&self) -> Option<&io::Error> {
        match self {
            Self::Commit { source, .. } => Some(source),
            Self::Unrecoverable { commit, .. } => Some(commit),
            _ => None,
        }
    }

    /// The rollback rename failure, only for [`ApplyError::Unrecoverable`].
    pub fn rollback_error(&self) -> Option<&io::Error> {
        match self {
            Self::Unrecoverable { rollback, .. } => Some(rollback),
            _ => None,
        }
    }
}

/// Runs the replacement protocol against a [`ReplaceFs`].
#[derive(Debug, Clone, Default)]
pub struct Replacer<F = OsFs> {
    fs: F,
}

impl Replacer<OsFs> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<F: ReplaceFs> Replacer<F> {
    pub fn with_fs(fs: F) -> Self {
        Self { fs }
    }

    /// Replaces `target` (default: the running executable) with `content`.
    ///
    /// `mode` defaults to the target's current permission bits. On success the
    /// target holds `content` with that mode, no `.new` sibling remains and the
    /// `.old` sibling is gone or hidden.
    ///
    /// # Errors
    ///
    /// One [`ApplyError`] variant per protocol step; see the module docs.
    /// Only [`ApplyError::Unrecoverable`] leaves the target path empty.
    pub fn apply(
        &self,
        content: &mut dyn Read,
        target: Option<&Path>,
        mode: Option<u32>,
    ) -> Result<(), ApplyError> {
        let (target, mode) = resolve_target(target, mode)?;
        let staged = StagedPaths::for_target(&target);
        debug!("Applying update to {} (mode {:o})", target.display(), mode);

        let written = match self.fs.write_synced(&staged.new, content, mode) {
            Ok(written) => written,
            Err(source) => {
                if let Err(e) = self.fs.remove(&staged.new) {
                    debug!("Could not remove partial {}: {}", staged.new.display(), e);
                }
                return Err(ApplyError::Write {
                    path: staged.new,
                    source,
                });
            }
        };

        if let Err(e) = self.fs.remove(&staged.old) {
            debug!("No stale {} removed: {}", staged.old.display(), e);
        }

        self.fs.rename(&target, &staged.old).map_err(|source| ApplyError::Rename {
            from: target.clone(),
            to: staged.old.clone(),
            source,
        })?;

        if let Err(commit) = self.fs.rename(&staged.new, &target) {
            warn!("Failed to move {} into place, rolling back: {}", staged.new.display(), commit);
            return match self.fs.rename(&staged.old, &target) {
                Ok(()) => Err(ApplyError::Commit {
                    path: target,
                    source: commit,
                }),
                Err(rollback) => {
                    error!(
                        "Rollback failed, previous executable left at {}: {}",
                        staged.old.display(),
                        rollback
                    );
                    Err(ApplyError::Unrecoverable {
                        target,
                        old_path: staged.old,
                        commit,
                        rollback,
                    })
                }
            };
        }

        if let Err(e) = self.fs.remove(&staged.old) {
            debug!("Could not remove {} ({}), hiding it instead", staged.old.display(), e);
            if let Err(e) = self.fs.hide(&staged.old) {
                warn!("Failed to hide {}: {}", staged.old.display(), e);
            }
        }

        info!("Replaced {} ({} bytes)", target.display(), written);
        Ok(())
    }
}

/// Replaces `target` with `content` on the host filesystem.
///
/// Shorthand for [`Replacer::new().apply(..)`](Replacer::apply).
///
/// # Examples
///
/// ```rust,no_run
/// use std::path::Path;
///
/// # fn example() -> Result<(), selfswap::apply::ApplyError> {
/// let mut payload = std::io::Cursor::new(b"new build".to_vec());
/// selfswap::apply::apply(&mut payload, Some(Path::new("/usr/local/bin/app")), Some(0o755))?;
/// # Ok(())
/// # }
/// ```
pub fn apply(
    content: &mut dyn Read,
    target: Option<&Path>,
    mode: Option<u32>,
) -> Result<(), ApplyError> {
    Replacer::new().apply(content, target, mode)
}

/// Path and permission bits of the running executable.
pub fn executable_info() -> Result<(PathBuf, u32), ApplyError> {
    let path = std::env::current_exe().map_err(|source| ApplyError::Executable { source })?;
    let metadata = fs::metadata(&path).map_err(|source| ApplyError::Stat {
        path: path.clone(),
        source,
    })?;
    let mode = ops::permission_bits(&metadata);
    Ok((path, mode))
}

fn resolve_target(target: Option<&Path>, mode: Option<u32>) -> Result<(PathBuf, u32), ApplyError> {
    match (target, mode) {
        (None, mode) => {
            let (path, exe_mode) = executable_info()?;
            Ok((path, mode.unwrap_or(exe_mode)))
        }
        (Some(path), Some(mode)) => Ok((path.to_path_buf(), mode)),
        (Some(path), None) => {
            let metadata = fs::metadata(path).map_err(|source| ApplyError::Stat {
                path: path.to_path_buf(),
                source,
            })?;
            Ok((path.to_path_buf(), ops::permission_bits(&metadata)))
        }
    }
}
