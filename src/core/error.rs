//! Error handling for selfswap
//!
//! Two layers, as in the rest of the crate:
//! - [`UpdateError`] - the typed outcome of an update attempt, one variant per
//!   step of the pipeline, with the cause reachable through `source()`
//! - [`ErrorContext`] - an operator-facing rendering with details and a
//!   suggestion, built by [`user_friendly_error`] from any [`anyhow::Error`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use selfswap::core::user_friendly_error;
//! use selfswap::release::LocalFeed;
//! use selfswap::updater::Updater;
//!
//! # fn example(feed: LocalFeed) {
//! let updater = Updater::new(feed.clone());
//! if let Err(e) = updater.self_update_to_latest(&feed) {
//!     user_friendly_error(e.into()).display();
//! }
//! # }
//! ```

use crate::apply::ApplyError;
use crate::archive::ExtractError;
use crate::release::{Release, SelectError};
use colored::Colorize;
use std::fmt;
use std::io;
use thiserror::Error;

/// Failure of one self-update attempt.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The release lister failed.
    #[error("unable to list releases")]
    List(#[source] anyhow::Error),

    /// Opening the release asset stream failed.
    #[error("unable to fetch release {release}")]
    Fetch {
        release: String,
        #[source]
        source: anyhow::Error,
    },

    /// No registered extractor recognises the asset filename.
    #[error("no extractor registered for asset {asset}")]
    NoExtractor { asset: String },

    /// The archive did not yield the executable.
    #[error("unable to find binary {binary} in {asset}")]
    BinaryNotFound {
        binary: String,
        asset: String,
        #[source]
        source: ExtractError,
    },

    /// No release could be selected from the listing.
    #[error(transparent)]
    Select(#[from] SelectError),

    /// The replacement protocol failed.
    #[error("unable to apply update")]
    Apply(#[from] ApplyError),

    /// The running executable could not be located or inspected.
    #[error("unable to locate the running executable")]
    Executable(#[source] ApplyError),

    /// The attempt was cancelled before the replacement started.
    #[error("update cancelled")]
    Cancelled,

    /// A failure after `release` had been selected.
    #[error("failed to install release {}", release.name)]
    Install {
        release: Box<Release>,
        #[source]
        source: Box<UpdateError>,
    },
}

impl UpdateError {
    /// The innermost error, looking through [`UpdateError::Install`].
    pub fn root(&self) -> &UpdateError {
        match self {
            Self::Install { source, .. } => source.root(),
            other => other,
        }
    }

    /// The release that was being installed, if selection had succeeded.
    pub fn release(&self) -> Option<&Release> {
        match self {
            Self::Install { release, .. } => Some(release),
            _ => None,
        }
    }

    /// The replacement failure, if the attempt got that far.
    pub fn apply_error(&self) -> Option<&ApplyError> {
        match self.root() {
            Self::Apply(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the target was left missing with the previous executable
    /// staged at `.<name>.old`.
    pub fn is_unrecoverable(&self) -> bool {
        self.apply_error().is_some_and(ApplyError::is_unrecoverable)
    }

    /// The rollback rename failure of an unrecoverable replacement.
    pub fn rollback_failure(&self) -> Option<&io::Error> {
        self.apply_error().and_then(ApplyError::rollback_error)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled)
    }
}

/// An error message for the terminal, with optional details and suggestion.
///
/// Details are printed in yellow, suggestions in green.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub message: String,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Prints the error to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Converts any error into an [`ErrorContext`] with a suggestion where one is
/// known.
///
/// The message always carries the full cause chain. Recognised errors are
/// found anywhere in the chain, so context added with `anyhow::Context` does
/// not hide them.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let context = ErrorContext::new(message_with_chain(&error));

    for cause in error.chain() {
        if let Some(update_error) = cause.downcast_ref::<UpdateError>() {
            return describe_update(context, update_error);
        }
        if let Some(apply_error) = cause.downcast_ref::<ApplyError>() {
            return describe_apply(context, apply_error);
        }
        if let Some(select_error) = cause.downcast_ref::<SelectError>() {
            return describe_select(context, select_error);
        }
        if let Some(extract_error) = cause.downcast_ref::<ExtractError>() {
            return describe_extract(context, extract_error);
        }
        if cause.downcast_ref::<toml::de::Error>().is_some() {
            return context
                .with_suggestion("Check the TOML syntax: quotes, brackets and key names")
                .with_details("The file has a syntax error or a value of the wrong type");
        }
    }

    for cause in error.chain() {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            return describe_io(context, io_error);
        }
    }

    context
}

fn message_with_chain(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    message
}

fn describe_update(context: ErrorContext, error: &UpdateError) -> ErrorContext {
    match error.root() {
        UpdateError::List(_) => context
            .with_suggestion("Check that the release feed exists and is readable")
            .with_details("The list of releases could not be retrieved, nothing was changed"),
        UpdateError::Fetch { .. } => context
            .with_suggestion("Check that the release asset referenced by the feed exists")
            .with_details("The release asset could not be opened, nothing was changed"),
        UpdateError::NoExtractor { asset } => context
            .with_suggestion("Publish the executable as a .tar or .tar.gz archive")
            .with_details(format!("'{asset}' does not end in a known archive extension")),
        UpdateError::BinaryNotFound { source, .. } => describe_extract(context, source),
        UpdateError::Select(e) => describe_select(context, e),
        UpdateError::Apply(e) | UpdateError::Executable(e) => describe_apply(context, e),
        UpdateError::Cancelled => {
            context.with_details("The update was cancelled before the executable was replaced")
        }
        UpdateError::Install { .. } => context,
    }
}

fn describe_apply(context: ErrorContext, error: &ApplyError) -> ErrorContext {
    match error {
        ApplyError::Unrecoverable {
            target,
            old_path,
            ..
        } => context
            .with_suggestion(format!(
                "Restore it with 'mv {} {}' or run 'selfswap recover --target {}'",
                old_path.display(),
                target.display(),
                target.display()
            ))
            .with_details(format!(
                "{} is missing. The previous executable is intact at {}",
                target.display(),
                old_path.display()
            )),
        ApplyError::Commit { path, .. } => context
            .with_suggestion("Check that the executable is not locked by another process and retry")
            .with_details(format!("{} still holds the previous executable", path.display())),
        ApplyError::Write { path, source } | ApplyError::Stat { path, source } => {
            describe_io(context, source).with_details(format!(
                "The update could not be staged at {}. The executable was not changed",
                path.display()
            ))
        }
        ApplyError::Rename { source, .. } => describe_io(context, source)
            .with_details("The executable could not be moved aside. It was not changed"),
        ApplyError::Executable { .. } => {
            context.with_suggestion("Pass the executable explicitly with --target")
        }
    }
}

fn describe_select(context: ErrorContext, error: &SelectError) -> ErrorContext {
    match error {
        SelectError::NoRelease => context
            .with_suggestion("Check that the release feed lists at least one release"),
        SelectError::NoValidVersion { considered: 0 } => context
            .with_suggestion("No release matched the filters. Try --prerelease or --asset-pattern")
            .with_details(format!(
                "Assets are matched against the current platform ({}-{}) unless a pattern is given",
                std::env::consts::OS,
                std::env::consts::ARCH
            )),
        SelectError::NoValidVersion { .. } => context
            .with_suggestion("Name releases with semantic versions such as '1.2.3' or 'v1.2.3'"),
    }
}

fn describe_extract(context: ErrorContext, error: &ExtractError) -> ErrorContext {
    match error {
        ExtractError::NotFound => context
            .with_suggestion("Check that the archive holds a file named like the executable")
            .with_details("Entries are matched by base name, directories are ignored"),
        ExtractError::Decompression(_) => context
            .with_suggestion("The asset is not valid gzip data. Check the download is complete"),
        ExtractError::Io(_) => context
            .with_suggestion("The archive appears to be truncated or corrupted"),
    }
}

fn describe_io(context: ErrorContext, error: &io::Error) -> ErrorContext {
    match error.kind() {
        io::ErrorKind::PermissionDenied => context
            .with_suggestion("Check write access to the directory, or use elevated permissions")
            .with_details("Replacing an executable needs write access to its directory"),
        io::ErrorKind::NotFound => context
            .with_suggestion("Check that the file or directory exists and the path is correct"),
        _ => context,
    }
}
