use std::io::Read;

use super::header::{read_varint, ChunkTag};
use super::ChunkError;

/// Reads a stream of framed chunks from an underlying source.
pub struct ChunkReader<R: Read> {
    source: R,
    /// Tolerant mode: unknown-but-well-formed chunks are skipped instead of
    /// rejected with [`ChunkError::UnknownChunk`].
    tolerant: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            tolerant: true,
        }
    }

    pub fn strict(source: R) -> Self {
        Self {
            source,
            tolerant: false,
        }
    }

    /// Read the next chunk's header, returning `None` at a clean end of
    /// stream (no bytes at all before the tag). Returns the tag, declared
    /// body length, and a bounded reader over the body.
    ///
    /// If the tag is unknown: in tolerant mode the chunk is still handed
    /// back (the caller will typically `skip`), in strict mode this returns
    /// [`ChunkError::UnknownChunk`] immediately, without consuming the body.
    pub fn read_chunk(&mut self) -> Result<Option<(ChunkTag, u64, ChunkBodyReader<'_, R>)>, ChunkError> {
        let mut tag_buf = [0u8; 4];
        match read_fill_or_eof(&mut self.source, &mut tag_buf)? {
            FillResult::Eof => return Ok(None),
            FillResult::Partial => return Err(ChunkError::UnexpectedEof),
            FillResult::Full => {}
        }
        let tag = ChunkTag(tag_buf);

        if !tag.is_known() && !self.tolerant {
            return Err(ChunkError::UnknownChunk { tag: tag.0 });
        }

        let length = read_varint(&mut self.source)?;

        let body = ChunkBodyReader {
            source: &mut self.source,
            remaining: length,
            declared: length,
            hasher: if tag.has_crc() {
                Some(crc32fast::Hasher::new())
            } else {
                None
            },
            tag,
        };

        Ok(Some((tag, length, body)))
    }

    /// Read the next chunk and discard its body entirely, verifying CRC and
    /// length along the way.
    pub fn skip_chunk(&mut self) -> Result<bool, ChunkError> {
        match self.read_chunk()? {
            None => Ok(false),
            Some((_, _, mut body)) => {
                let mut sink = [0u8; 8192];
                loop {
                    let n = body.read(&mut sink).map_err(ChunkError::Io)?;
                    if n == 0 {
                        break;
                    }
                }
                body.finish()?;
                Ok(true)
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }
}

enum FillResult {
    Full,
    Partial,
    Eof,
}

fn read_fill_or_eof<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<FillResult, ChunkError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = r.read(&mut buf[filled..]).map_err(ChunkError::Io)?;
        if n == 0 {
            return Ok(if filled == 0 {
                FillResult::Eof
            } else {
                FillResult::Partial
            });
        }
        filled += n;
    }
    Ok(FillResult::Full)
}

/// A bounded reader over one chunk's body. The spec invariant — body length
/// exactly matches bytes consumed by its parser — is enforced in [`finish`]:
/// callers that stop reading early must still call `finish`, which drains
/// and validates the remainder (this is what [`ChunkReader::skip_chunk`]
/// does internally).
///
/// [`finish`]: ChunkBodyReader::finish
pub struct ChunkBodyReader<'a, R: Read> {
    source: &'a mut R,
    remaining: u64,
    declared: u64,
    hasher: Option<crc32fast::Hasher>,
    tag: ChunkTag,
}

impl<'a, R: Read> ChunkBodyReader<'a, R> {
    pub fn declared_len(&self) -> u64 {
        self.declared
    }

    /// Drain whatever is left of the body, verify the declared length was
    /// fully consumed, and check the CRC (if this chunk type carries one).
    pub fn finish(mut self) -> Result<(), ChunkError> {
        let mut sink = [0u8; 8192];
        while self.remaining > 0 {
            let n = self.read(&mut sink).map_err(ChunkError::Io)?;
            if n == 0 {
                break;
            }
        }
        if self.remaining != 0 {
            return Err(ChunkError::LengthMismatch {
                declared: self.declared,
                consumed: self.declared - self.remaining,
            });
        }
        if let Some(hasher) = self.hasher.take() {
            let mut crc_buf = [0u8; 4];
            self.source.read_exact(&mut crc_buf).map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    ChunkError::UnexpectedEof
                } else {
                    ChunkError::Io(e)
                }
            })?;
            let expected = u32::from_le_bytes(crc_buf);
            let computed = hasher.finalize();
            if computed != expected {
                return Err(ChunkError::CrcMismatch { tag: self.tag.0 });
            }
        }
        Ok(())
    }
}

impl<'a, R: Read> Read for ChunkBodyReader<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let max = (self.remaining as usize).min(buf.len());
        let n = self.source.read(&mut buf[..max])?;
        if n > 0 {
            if let Some(hasher) = self.hasher.as_mut() {
                hasher.update(&buf[..n]);
            }
            self.remaining -= n as u64;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::super::writer::ChunkWriter;
    use super::*;

    #[test]
    fn round_trips_a_simple_stream() {
        let mut w = ChunkWriter::new(Vec::new());
        w.write_chunk(ChunkTag::ARCHIVE_HEADER, b"v1").unwrap();
        w.write_chunk(ChunkTag::FILE, b"hello.txt").unwrap();
        w.write_chunk(ChunkTag::DATA_BLOCK, b"hello world!").unwrap();
        let bytes = w.into_inner();

        let mut r = ChunkReader::new(&bytes[..]);
        let (tag, len, body) = r.read_chunk().unwrap().unwrap();
        assert_eq!(tag, ChunkTag::ARCHIVE_HEADER);
        assert_eq!(len, 2);
        body.finish().unwrap();

        let (tag, _, body) = r.read_chunk().unwrap().unwrap();
        assert_eq!(tag, ChunkTag::FILE);
        body.finish().unwrap();

        let (tag, _, mut body) = r.read_chunk().unwrap().unwrap();
        assert_eq!(tag, ChunkTag::DATA_BLOCK);
        let mut data = Vec::new();
        body.read_to_end(&mut data).unwrap();
        assert_eq!(data, b"hello world!");
        body.finish().unwrap();

        assert!(r.read_chunk().unwrap().is_none());
    }

    #[test]
    fn detects_crc_mismatch_on_bit_flip() {
        let mut w = ChunkWriter::new(Vec::new());
        w.write_chunk(ChunkTag::DATA_BLOCK, b"payload").unwrap();
        let mut bytes = w.into_inner();
        let body_start = 4 + 1; // tag + 1-byte varint length
        bytes[body_start] ^= 0x01;

        let mut r = ChunkReader::new(&bytes[..]);
        let (_, _, mut body) = r.read_chunk().unwrap().unwrap();
        let mut data = Vec::new();
        body.read_to_end(&mut data).unwrap();
        assert!(matches!(
            body.finish(),
            Err(ChunkError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn unknown_chunk_is_skippable_in_tolerant_mode_and_rejected_in_strict() {
        let mut w = ChunkWriter::new(Vec::new());
        w.write_chunk(ChunkTag::FILE, b"a").unwrap();
        w.write_chunk(ChunkTag(*b"ZZZZ"), b"mystery").unwrap();
        w.write_chunk(ChunkTag::FILE, b"b").unwrap();
        let bytes = w.into_inner();

        let mut tolerant = ChunkReader::new(&bytes[..]);
        let (_, _, body) = tolerant.read_chunk().unwrap().unwrap();
        body.finish().unwrap();
        assert!(tolerant.skip_chunk().unwrap());
        let (tag, _, body) = tolerant.read_chunk().unwrap().unwrap();
        assert_eq!(tag, ChunkTag::FILE);
        body.finish().unwrap();

        let mut strict = ChunkReader::strict(&bytes[..]);
        let (_, _, body) = strict.read_chunk().unwrap().unwrap();
        body.finish().unwrap();
        assert!(matches!(
            strict.read_chunk(),
            Err(ChunkError::UnknownChunk { .. })
        ));
    }
}
