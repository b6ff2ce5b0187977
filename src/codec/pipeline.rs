use super::compress::{self, CompressionAlgorithm};
use super::crypt::{CryptConfig, EncryptionAlgorithm, IV_LEN, TAG_LEN};
use super::CodecError;

/// A decoded frame header, exposed so callers (the archive engine) can log
/// or inspect what a `DATA_BLOCK` chunk body was encoded with without
/// decoding the payload.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub compression: CompressionAlgorithm,
    pub encryption: EncryptionAlgorithm,
    pub original_len: u32,
}

/// Per-frame compress-then-encrypt-then-authenticate pipeline.
///
/// Unlike the teacher's `DataBlob`, which compresses and encrypts an entire
/// file's contents as one buffer, this operates one segment at a time: the
/// entry pipeline feeds it bounded-size chunks of a stream (a file's
/// content, an image's blocks) and each chunk becomes one independently
/// decodable `DATA_BLOCK` body. A single corrupted frame never prevents
/// decoding the frames around it.
pub struct CodecPipeline {
    compression: CompressionAlgorithm,
    encryption: EncryptionAlgorithm,
    crypt: Option<CryptConfig>,
    max_frame_size: usize,
}

const HEADER_LEN_NO_CRYPT: usize = 1 + 1 + 4;
const HEADER_LEN_CRYPT: usize = HEADER_LEN_NO_CRYPT + IV_LEN + TAG_LEN;

impl CodecPipeline {
    pub fn new(compression: CompressionAlgorithm, max_frame_size: usize) -> Self {
        Self {
            compression,
            encryption: EncryptionAlgorithm::None,
            crypt: None,
            max_frame_size,
        }
    }

    pub fn with_encryption(
        mut self,
        encryption: EncryptionAlgorithm,
        crypt: CryptConfig,
    ) -> Self {
        self.encryption = encryption;
        self.crypt = Some(crypt);
        self
    }

    pub fn requires_password(&self) -> bool {
        self.encryption != EncryptionAlgorithm::None && self.crypt.is_none()
    }

    pub fn compression(&self) -> CompressionAlgorithm {
        self.compression
    }

    pub fn encryption(&self) -> EncryptionAlgorithm {
        self.encryption
    }

    /// Compress, then (if configured) encrypt, a single frame of plaintext
    /// into a self-describing wire buffer suitable for a `DATA_BLOCK` body.
    pub fn encode_frame(&self, plaintext: &[u8]) -> Result<Vec<u8>, CodecError> {
        if plaintext.len() > self.max_frame_size {
            return Err(CodecError::CompressFailure(format!(
                "frame of {} bytes exceeds max frame size {}",
                plaintext.len(),
                self.max_frame_size
            )));
        }

        let compressed = compress::compress(self.compression, plaintext)?;
        let original_len = plaintext.len() as u32;

        match (self.encryption, &self.crypt) {
            (EncryptionAlgorithm::None, _) => {
                let mut out = Vec::with_capacity(HEADER_LEN_NO_CRYPT + compressed.len());
                out.push(self.compression.id());
                out.push(self.encryption.id());
                out.extend_from_slice(&original_len.to_le_bytes());
                out.extend_from_slice(&compressed);
                Ok(out)
            }
            (_, None) => Err(CodecError::MissingPassword),
            (_, Some(crypt)) => {
                let (iv, tag, ciphertext) = crypt.encrypt(&compressed)?;
                let mut out = Vec::with_capacity(HEADER_LEN_CRYPT + ciphertext.len());
                out.push(self.compression.id());
                out.push(self.encryption.id());
                out.extend_from_slice(&original_len.to_le_bytes());
                out.extend_from_slice(&iv);
                out.extend_from_slice(&tag);
                out.extend_from_slice(&ciphertext);
                Ok(out)
            }
        }
    }

    /// Reverse of [`encode_frame`]: authenticate (if encrypted), decrypt,
    /// then decompress, checking the recovered length against the header's
    /// declared `original_len` as a second integrity signal beyond the GCM
    /// tag / CRC.
    ///
    /// [`encode_frame`]: CodecPipeline::encode_frame
    pub fn decode_frame(&self, frame: &[u8]) -> Result<Vec<u8>, CodecError> {
        if frame.len() < HEADER_LEN_NO_CRYPT {
            return Err(CodecError::DecompressFailure("frame too short".into()));
        }
        let compression = CompressionAlgorithm::from_id(frame[0])?;
        let encryption = EncryptionAlgorithm::from_id(frame[1])?;
        let original_len = u32::from_le_bytes(frame[2..6].try_into().unwrap()) as usize;

        let compressed = match encryption {
            EncryptionAlgorithm::None => frame[HEADER_LEN_NO_CRYPT..].to_vec(),
            EncryptionAlgorithm::Aes256Gcm => {
                if frame.len() < HEADER_LEN_CRYPT {
                    return Err(CodecError::DecryptAuthFailure);
                }
                let crypt = self.crypt.as_ref().ok_or(CodecError::MissingPassword)?;
                let iv: [u8; IV_LEN] = frame[6..6 + IV_LEN].try_into().unwrap();
                let tag: [u8; TAG_LEN] =
                    frame[6 + IV_LEN..HEADER_LEN_CRYPT].try_into().unwrap();
                let ciphertext = &frame[HEADER_LEN_CRYPT..];
                crypt.decrypt(ciphertext, &iv, &tag)?
            }
        };

        let plaintext = compress::decompress(compression, &compressed, original_len)?;
        if plaintext.len() != original_len {
            return Err(CodecError::DecompressFailure(
                "recovered length does not match frame header".into(),
            ));
        }
        Ok(plaintext)
    }

    /// Peek the frame header without decoding the payload.
    pub fn peek_header(frame: &[u8]) -> Result<Frame, CodecError> {
        if frame.len() < HEADER_LEN_NO_CRYPT {
            return Err(CodecError::DecompressFailure("frame too short".into()));
        }
        Ok(Frame {
            compression: CompressionAlgorithm::from_id(frame[0])?,
            encryption: EncryptionAlgorithm::from_id(frame[1])?,
            original_len: u32::from_le_bytes(frame[2..6].try_into().unwrap()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_pipeline_round_trips() {
        let pipeline = CodecPipeline::new(CompressionAlgorithm::Zstd, 1 << 20);
        let data = b"segment contents go here".repeat(8);
        let encoded = pipeline.encode_frame(&data).unwrap();
        let decoded = pipeline.decode_frame(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn encrypted_pipeline_round_trips() {
        let salt = CryptConfig::generate_salt();
        let crypt = CryptConfig::derive(b"hunter2", &salt).unwrap();
        let pipeline = CodecPipeline::new(CompressionAlgorithm::Deflate, 1 << 20)
            .with_encryption(EncryptionAlgorithm::Aes256Gcm, crypt);
        let data = b"another segment, this time protected";
        let encoded = pipeline.encode_frame(data).unwrap();
        let decoded = pipeline.decode_frame(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn encrypted_pipeline_without_key_material_rejects_encode() {
        let pipeline = CodecPipeline::new(CompressionAlgorithm::None, 1024);
        let mut pipeline = pipeline;
        pipeline.encryption = EncryptionAlgorithm::Aes256Gcm;
        assert!(matches!(
            pipeline.encode_frame(b"x"),
            Err(CodecError::MissingPassword)
        ));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let pipeline = CodecPipeline::new(CompressionAlgorithm::None, 4);
        assert!(pipeline.encode_frame(b"too long").is_err());
    }

    #[test]
    fn peek_header_does_not_require_key_material() {
        let pipeline = CodecPipeline::new(CompressionAlgorithm::Zstd, 1 << 20);
        let encoded = pipeline.encode_frame(b"data").unwrap();
        let header = CodecPipeline::peek_header(&encoded).unwrap();
        assert_eq!(header.compression, CompressionAlgorithm::Zstd);
        assert_eq!(header.encryption, EncryptionAlgorithm::None);
        assert_eq!(header.original_len, 4);
    }
}
