//! Picking the release to install.
//!
//! Release names are compared as semantic versions after stripping the common
//! tag prefixes (`v1.2.3`, `version-1.2.3`, `release-1.2.3`). Missing minor and
//! patch numbers count as zero, so `v1.2` is `1.2.0` and `1` is `1.0.0`. Names
//! that still do not parse are left out of the comparison rather than treated
//! as errors.

use super::{AssetFilter, ListedRelease, Release, ReleaseFilter};
use semver::Version;
use std::borrow::Cow;
use thiserror::Error;
use tracing::{debug, trace};

/// Reasons selection can come up empty.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    /// The listing contained no releases at all.
    #[error("no releases were found")]
    NoRelease,

    /// No release survived filtering with a parseable version.
    #[error(
        "unable to find the latest release: {considered} candidate(s) passed the filters but none has a valid semantic version"
    )]
    NoValidVersion { considered: usize },
}

/// Selects the release with the greatest semantic version.
///
/// Each listing is checked against `release_filter`; accepted listings are
/// paired with their **first** asset accepted by `asset_filter` (listings with
/// no acceptable asset are dropped). Among the remaining candidates the one
/// with the strictly greatest version wins, so on a tie the first one seen is
/// kept.
///
/// # Errors
///
/// - [`SelectError::NoRelease`] if `releases` is empty
/// - [`SelectError::NoValidVersion`] if no candidate has a valid version
///
/// # Examples
///
/// ```rust
/// use selfswap::release::{ListedRelease, StableRelease, select_latest};
///
/// let releases = vec![
///     ListedRelease::new("1.0.0").asset("app.tar.gz", "a"),
///     ListedRelease::new("2.0.0-beta").prerelease(true).asset("app.tar.gz", "b"),
///     ListedRelease::new("1.5.2").asset("app.tar.gz", "c"),
/// ];
///
/// let latest = select_latest(&releases, &StableRelease, &|_: &str| true).unwrap();
/// assert_eq!(latest.name, "1.5.2");
/// ```
pub fn select_latest<R, A>(
    releases: &[ListedRelease],
    release_filter: &R,
    asset_filter: &A,
) -> Result<Release, SelectError>
where
    R: ReleaseFilter + ?Sized,
    A: AssetFilter + ?Sized,
{
    if releases.is_empty() {
        return Err(SelectError::NoRelease);
    }

    let mut considered = 0;
    let mut latest: Option<(Release, Version)> = None;

    for listed in releases {
        if !release_filter.accept(&listed.name, listed.draft, listed.prerelease) {
            trace!("Release {} rejected by release filter", listed.name);
            continue;
        }

        let Some(asset) = listed.assets.iter().find(|asset| asset_filter.accept(&asset.name)) else {
            trace!("Release {} has no matching asset", listed.name);
            continue;
        };
        considered += 1;

        let Ok(version) = parse_version(&listed.name) else {
            debug!("Ignoring release {}: not a semantic version", listed.name);
            continue;
        };

        let is_greater = match &latest {
            Some((_, current)) => version > *current,
            None => true,
        };
        if is_greater {
            latest = Some((
                Release {
                    name: listed.name.clone(),
                    asset: asset.name.clone(),
                    location: asset.location.clone(),
                },
                version,
            ));
        }
    }

    match latest {
        Some((release, version)) => {
            debug!("Selected release {} ({}) asset {}", release.name, version, release.asset);
            Ok(release)
        }
        None => Err(SelectError::NoValidVersion { considered }),
    }
}

/// Parses a release name as a semantic version, accepting the common tag
/// prefixes and a shortened `MAJOR[.MINOR]` core.
pub fn parse_version(name: &str) -> Result<Version, semver::Error> {
    let trimmed = name.trim();
    let clean = if let Some(stripped) = trimmed.strip_prefix("version-") {
        stripped
    } else if let Some(stripped) = trimmed.strip_prefix("release-") {
        stripped
    } else if let Some(stripped) = trimmed.strip_prefix('v') {
        stripped
    } else {
        trimmed
    };

    Version::parse(&complete_version(clean))
}

/// Pads a `MAJOR` or `MAJOR.MINOR` core to three components, keeping any
/// pre-release or build suffix (`1.2-rc.1` becomes `1.2.0-rc.1`).
fn complete_version(version: &str) -> Cow<'_, str> {
    let end = version.find(['-', '+']).unwrap_or(version.len());
    let (core, suffix) = version.split_at(end);

    match core.split('.').count() {
        1 => Cow::Owned(format!("{core}.0.0{suffix}")),
        2 => Cow::Owned(format!("{core}.0{suffix}")),
        _ => Cow::Borrowed(version),
    }
}

/// Returns `true` if `candidate` is a strictly greater version than `current`.
///
/// Unparseable inputs are never considered newer.
pub fn is_newer(current: &str, candidate: &str) -> bool {
    match (parse_version(current), parse_version(candidate)) {
        (Ok(current), Ok(candidate)) => candidate > current,
        _ => false,
    }
}
