use super::{BinaryFilter, EntryInfo, ExtractError, Extractor};
use std::io::{self, Cursor, Read};
use tracing::{debug, trace};

/// Upper bound on the buffer reserved up front from an entry's declared size.
/// The header comes from a downloaded file and is not trusted.
const PREALLOCATE_LIMIT: u64 = 1 << 20;

/// Extractor for uncompressed `.tar` archives.
///
/// Entries are scanned in archive order; the first one accepted by the
/// [`BinaryFilter`] wins. Its payload is read into memory and handed back as a
/// reader positioned at the start of the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarExtractor;

impl TarExtractor {
    /// Entry scan shared with the compressed tar formats.
    pub(crate) fn scan<R: Read>(
        &self,
        input: R,
        is_binary: &dyn BinaryFilter,
    ) -> Result<Box<dyn Read + Send>, ExtractError> {
        let mut archive = tar::Archive::new(input);

        for entry in archive.entries()? {
            let mut entry = entry?;
            let info = EntryInfo {
                path: entry.path()?.into_owned(),
                is_dir: entry.header().entry_type().is_dir(),
            };

            if !is_binary.accept(&info) {
                trace!("Skipping archive entry {}", info.path.display());
                continue;
            }

            let size = entry.size();
            debug!("Found binary {} in archive ({} bytes)", info.path.display(), size);

            let capacity = usize::try_from(size.min(PREALLOCATE_LIMIT)).unwrap_or_default();
            let mut payload = Vec::with_capacity(capacity);
            (&mut entry).take(size).read_to_end(&mut payload)?;
            if (payload.len() as u64) < size {
                return Err(ExtractError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "archive entry {} is truncated: expected {} bytes, read {}",
                        info.path.display(),
                        size,
                        payload.len()
                    ),
                )));
            }
            return Ok(Box::new(Cursor::new(payload)));
        }

        Err(ExtractError::NotFound)
    }
}

impl Extractor for TarExtractor {
    fn matches(&self, filename: &str) -> bool {
        filename.to_lowercase().ends_with(".tar")
    }

    fn locate(
        &self,
        input: &mut dyn Read,
        is_binary: &dyn BinaryFilter,
    ) -> Result<Box<dyn Read + Send>, ExtractError> {
        self.scan(input, is_binary)
    }
}
