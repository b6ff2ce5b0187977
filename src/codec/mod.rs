//! Codec Pipeline (C3): composable compress + encrypt + integrity stages.
//!
//! Grounded on the teacher's `DataBlob::encode`/`decode` (whole-buffer
//! compress-then-encrypt, magic-tagged) and its `CryptReader`/`CryptWriter`
//! pair for the actual AES-GCM plumbing. Generalized here into a pipeline
//! that operates per-frame (one data-block chunk body at a time) rather than
//! per-whole-file, since the archive engine streams entries as a sequence of
//! segments.

mod compress;
mod crypt;
mod pipeline;

pub use compress::CompressionAlgorithm;
pub use crypt::{CryptConfig, EncryptionAlgorithm, SALT_LEN};
pub use pipeline::{CodecPipeline, Frame};

use thiserror::Error;

use crate::error::{Classify, ErrorClass};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("compression failed: {0}")]
    CompressFailure(String),
    #[error("decompression failed: {0}")]
    DecompressFailure(String),
    #[error("decryption authentication failed")]
    DecryptAuthFailure,
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("missing password for encrypted pipeline")]
    MissingPassword,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Classify for CodecError {
    fn class(&self) -> ErrorClass {
        match self {
            CodecError::UnsupportedAlgorithm(_) | CodecError::MissingPassword => {
                ErrorClass::Configuration
            }
            _ => ErrorClass::Codec,
        }
    }
}
