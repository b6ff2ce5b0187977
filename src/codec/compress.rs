use std::io::{Read, Write};

use super::CodecError;

/// Compression algorithms this build actually supports.
///
/// `{compression}` in job configuration (§6) also accepts `bzip2` and `lzma`
/// for parsing purposes — this crate's dependency stack has no grounded
/// implementation of either, so negotiation rejects them with
/// [`CodecError::UnsupportedAlgorithm`] rather than silently falling back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    None,
    Zstd,
    Deflate,
}

impl CompressionAlgorithm {
    pub fn id(self) -> u8 {
        match self {
            CompressionAlgorithm::None => 0,
            CompressionAlgorithm::Zstd => 1,
            CompressionAlgorithm::Deflate => 2,
        }
    }

    pub fn from_id(id: u8) -> Result<Self, CodecError> {
        match id {
            0 => Ok(CompressionAlgorithm::None),
            1 => Ok(CompressionAlgorithm::Zstd),
            2 => Ok(CompressionAlgorithm::Deflate),
            other => Err(CodecError::UnsupportedAlgorithm(format!(
                "compression id {}",
                other
            ))),
        }
    }

    /// Parse the `{compression}` job-config enum, rejecting names this build
    /// can't back with a real codec.
    pub fn negotiate(name: &str) -> Result<Self, CodecError> {
        match name {
            "none" => Ok(CompressionAlgorithm::None),
            "zstd" => Ok(CompressionAlgorithm::Zstd),
            "deflate" | "gzip" => Ok(CompressionAlgorithm::Deflate),
            "bzip2" | "lzma" => Err(CodecError::UnsupportedAlgorithm(name.to_string())),
            other => Err(CodecError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

pub fn compress(algo: CompressionAlgorithm, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    match algo {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Zstd => zstd::block::compress(data, 1)
            .map_err(|e| CodecError::CompressFailure(e.to_string())),
        CompressionAlgorithm::Deflate => {
            let mut encoder =
                flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::fast());
            encoder
                .write_all(data)
                .map_err(|e| CodecError::CompressFailure(e.to_string()))?;
            encoder
                .finish()
                .map_err(|e| CodecError::CompressFailure(e.to_string()))
        }
    }
}

pub fn decompress(
    algo: CompressionAlgorithm,
    data: &[u8],
    max_size: usize,
) -> Result<Vec<u8>, CodecError> {
    match algo {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Zstd => zstd::block::decompress(data, max_size)
            .map_err(|e| CodecError::DecompressFailure(e.to_string())),
        CompressionAlgorithm::Deflate => {
            let mut decoder = flate2::read::DeflateDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| CodecError::DecompressFailure(e.to_string()))?;
            if out.len() > max_size {
                return Err(CodecError::DecompressFailure(
                    "decompressed size exceeds limit".into(),
                ));
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zstd_round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(16);
        let compressed = compress(CompressionAlgorithm::Zstd, &data).unwrap();
        let decompressed =
            decompress(CompressionAlgorithm::Zstd, &compressed, data.len() + 1024).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn deflate_round_trips() {
        let data = b"some moderately compressible payload ".repeat(32);
        let compressed = compress(CompressionAlgorithm::Deflate, &data).unwrap();
        let decompressed =
            decompress(CompressionAlgorithm::Deflate, &compressed, data.len() + 1024).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn unsupported_algorithms_are_rejected_at_negotiation() {
        assert!(matches!(
            CompressionAlgorithm::negotiate("bzip2"),
            Err(CodecError::UnsupportedAlgorithm(_))
        ));
    }
}
