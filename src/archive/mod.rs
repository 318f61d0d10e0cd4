//! Archive extraction for release artifacts.
//!
//! A downloaded release asset is usually an archive that wraps the executable
//! we want to install. This module provides the pluggable machinery that finds
//! that executable inside the archive byte stream:
//!
//! - [`Extractor`]: a format handler that recognises a filename and can locate
//!   one entry inside a stream of that format
//! - [`BinaryFilter`]: the predicate that picks the payload entry
//! - [`ExtractorRegistry`]: a name → extractor map used to pick a handler for
//!   an asset filename
//!
//! Built-in formats are [`TarExtractor`] (`.tar`) and [`TarGzExtractor`]
//! (`.tar.gz`, `.tgz`). New formats implement [`Extractor`] and are added with
//! [`ExtractorRegistry::register`]; nothing else needs to change.
//!
//! # Examples
//!
//! ```rust,no_run
//! use selfswap::archive::{ExtractorRegistry, NamedBinary};
//!
//! # fn example() -> anyhow::Result<()> {
//! let registry = ExtractorRegistry::with_builtin_formats();
//! let (format, extractor) = registry
//!     .find_match("app-linux-x86_64.tar.gz")
//!     .expect("tar.gz is a built-in format");
//! assert_eq!(format, "TarGz");
//!
//! let mut archive = std::fs::File::open("app-linux-x86_64.tar.gz")?;
//! let mut binary = extractor.locate(&mut archive, &NamedBinary::new("app"))?;
//! std::io::copy(&mut binary, &mut std::io::sink())?;
//! # Ok(())
//! # }
//! ```

mod gzip;
mod tarball;

pub use gzip::TarGzExtractor;
pub use tarball::TarExtractor;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Registry name of the built-in `.tar` extractor.
pub const TAR: &str = "Tar";
/// Registry name of the built-in `.tar.gz` / `.tgz` extractor.
pub const TAR_GZ: &str = "TarGz";

/// Errors raised while locating a binary inside an archive.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// No entry in the archive satisfied the binary filter.
    #[error("no archive entry matched the binary filter")]
    NotFound,

    /// The compression layer could not be decoded (e.g. bad gzip header).
    #[error("error decompressing archive")]
    Decompression(#[source] io::Error),

    /// Reading the archive stream failed.
    #[error("failed to read archive")]
    Io(#[from] io::Error),
}

/// Metadata of one archive entry, as seen by a [`BinaryFilter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Path of the entry inside the archive.
    pub path: PathBuf,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

impl EntryInfo {
    pub fn new(path: impl Into<PathBuf>, is_dir: bool) -> Self {
        Self {
            path: path.into(),
            is_dir,
        }
    }

    /// Base name of the entry, if it is valid UTF-8.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }
}

/// Predicate that identifies the payload executable among archive entries.
///
/// Closures taking `&EntryInfo` implement this trait directly.
pub trait BinaryFilter {
    fn accept(&self, entry: &EntryInfo) -> bool;
}

impl<F> BinaryFilter for F
where
    F: Fn(&EntryInfo) -> bool,
{
    fn accept(&self, entry: &EntryInfo) -> bool {
        self(entry)
    }
}

/// Accepts the first non-directory entry whose base name equals `name`.
///
/// This is the filter the updater builds from the running executable's own
/// file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBinary {
    name: String,
}

impl NamedBinary {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Builds the filter from the base name of `path`.
    pub fn for_path(path: &Path) -> Self {
        Self::new(path.file_name().unwrap_or_default().to_string_lossy())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl BinaryFilter for NamedBinary {
    fn accept(&self, entry: &EntryInfo) -> bool {
        !entry.is_dir && entry.file_name() == Some(self.name.as_str())
    }
}

/// An archive format handler.
///
/// Implementations must be cheap to share: the registry stores them boxed and
/// hands out shared references.
pub trait Extractor: Send + Sync {
    /// Returns `true` if `filename` looks like an archive of this format.
    fn matches(&self, filename: &str) -> bool;

    /// Scans `input` and returns a reader over the payload of the first entry
    /// accepted by `is_binary`.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::NotFound`] if the stream ends without a match
    /// - [`ExtractError::Decompression`] if a compression layer is invalid
    /// - [`ExtractError::Io`] for any other read failure
    fn locate(
        &self,
        input: &mut dyn Read,
        is_binary: &dyn BinaryFilter,
    ) -> Result<Box<dyn Read + Send>, ExtractError>;
}

/// Name → extractor map used to pick a handler for an asset filename.
///
/// Names are unique and the first registration wins. Lookup order across
/// formats is unspecified: if two registered extractors both match a filename,
/// which one [`find_match`](Self::find_match) returns is implementation-defined,
/// so format suffixes should not overlap.
#[derive(Default)]
pub struct ExtractorRegistry {
    formats: HashMap<String, Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in `Tar` and `TarGz` formats.
    pub fn with_builtin_formats() -> Self {
        let mut registry = Self::new();
        registry.register(TAR, TarExtractor);
        registry.register(TAR_GZ, TarGzExtractor::default());
        registry
    }

    /// Registers `extractor` under `name`.
    ///
    /// Returns `false` and leaves the registry untouched if `name` is already
    /// taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        extractor: impl Extractor + 'static,
    ) -> bool {
        match self.formats.entry(name.into()) {
            Entry::Occupied(existing) => {
                warn!("Format {} already exists, skipping registration", existing.key());
                false
            }
            Entry::Vacant(slot) => {
                debug!("Registered archive format {}", slot.key());
                slot.insert(Box::new(extractor));
                true
            }
        }
    }

    /// Returns the name and handler of a registered extractor matching
    /// `filename`, or `None` if no format recognises it.
    pub fn find_match(&self, filename: &str) -> Option<(&str, &dyn Extractor)> {
        self.formats
            .iter()
            .find(|(_, extractor)| extractor.matches(filename))
            .map(|(name, extractor)| (name.as_str(), extractor.as_ref()))
    }

    /// Registered format names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.formats.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

impl fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorRegistry").field("formats", &self.names()).finish()
    }
}
