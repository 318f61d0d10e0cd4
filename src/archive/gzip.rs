use super::{BinaryFilter, ExtractError, Extractor, TarExtractor};
use flate2::read::GzDecoder;
use std::io::{self, Read};

/// Extractor for gzip-compressed tar archives (`.tar.gz`, `.tgz`).
///
/// The input is wrapped in a gzip decoder and the entry scan is delegated to
/// [`TarExtractor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TarGzExtractor {
    tar: TarExtractor,
}

impl Extractor for TarGzExtractor {
    fn matches(&self, filename: &str) -> bool {
        let filename = filename.to_lowercase();
        filename.ends_with(".tar.gz") || filename.ends_with(".tgz")
    }

    fn locate(
        &self,
        input: &mut dyn Read,
        is_binary: &dyn BinaryFilter,
    ) -> Result<Box<dyn Read + Send>, ExtractError> {
        let mut decoder = GzDecoder::new(input);

        // The decoder parses the header eagerly; a missing header means the
        // next read reports why.
        if decoder.header().is_none() {
            let mut first_byte = [0u8; 1];
            let err = match decoder.read(&mut first_byte) {
                Err(err) => err,
                Ok(_) => io::Error::new(io::ErrorKind::InvalidData, "invalid gzip header"),
            };
            return Err(ExtractError::Decompression(err));
        }

        self.tar.scan(decoder, is_binary)
    }
}
