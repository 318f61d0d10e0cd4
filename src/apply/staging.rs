use super::ApplyError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The two transient siblings of a target executable.
///
/// For `/path/to/app` these are `/path/to/.app.new` (the staged new file) and
/// `/path/to/.app.old` (the previous executable while the swap is in flight).
/// The names are part of the observable contract: tooling inspecting a
/// directory mid-update relies on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPaths {
    pub new: PathBuf,
    pub old: PathBuf,
}

impl StagedPaths {
    pub fn for_target(target: &Path) -> Self {
        let dir = target.parent().unwrap_or_else(|| Path::new(""));
        let name = target.file_name().unwrap_or_default().to_string_lossy();

        Self {
            new: dir.join(format!(".{name}.new")),
            old: dir.join(format!(".{name}.old")),
        }
    }
}

/// Restores the previous executable after an unrecoverable swap.
///
/// If `target` is missing and its `.old` sibling exists, the sibling is renamed
/// back into place. Returns `true` if a file was restored and `false` if there
/// was nothing to do.
///
/// # Errors
///
/// Returns [`ApplyError::Rename`] if the restoring rename fails.
pub fn recover(target: &Path) -> Result<bool, ApplyError> {
    let staged = StagedPaths::for_target(target);

    if target.exists() {
        debug!("{} exists, nothing to recover", target.display());
        return Ok(false);
    }
    if !staged.old.exists() {
        warn!("{} is missing and no {} was found", target.display(), staged.old.display());
        return Ok(false);
    }

    fs::rename(&staged.old, target).map_err(|source| ApplyError::Rename {
        from: staged.old.clone(),
        to: target.to_path_buf(),
        source,
    })?;

    info!("Restored {} from {}", target.display(), staged.old.display());
    Ok(true)
}

/// Removes leftover staged siblings of `target`, returning the paths deleted.
///
/// The `.old` sibling is left alone while `target` is missing, because it is
/// then the only copy of the previous executable; use [`recover`] first.
pub fn clean_staged(target: &Path) -> Vec<PathBuf> {
    let staged = StagedPaths::for_target(target);
    let mut removed = Vec::new();

    let mut candidates = vec![staged.new];
    if target.exists() {
        candidates.push(staged.old);
    } else if staged.old.exists() {
        warn!(
            "Keeping {} because {} is missing; run recover first",
            staged.old.display(),
            target.display()
        );
    }

    for path in candidates {
        if !path.exists() {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed staged file {}", path.display());
                removed.push(path);
            }
            Err(e) => warn!("Failed to remove staged file {}: {}", path.display(), e),
        }
    }

    removed
}
