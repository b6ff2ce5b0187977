//! Chunk type tags and the variable-length body-length encoding.

use std::io::{Read, Write};

use super::ChunkError;

/// A stable 4-byte, ASCII-printable type tag.
///
/// Mirrors the teacher's 8-byte blob magic numbers (`UNCOMPRESSED_BLOB_MAGIC_1_0`
/// and friends), shrunk to 4 bytes per the distilled spec's on-disk format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkTag(pub [u8; 4]);

impl ChunkTag {
    pub const ARCHIVE_HEADER: ChunkTag = ChunkTag(*b"BAR0");
    pub const SALT: ChunkTag = ChunkTag(*b"SALT");
    pub const KEY_EXCHANGE: ChunkTag = ChunkTag(*b"KEXC");
    pub const META: ChunkTag = ChunkTag(*b"META");
    pub const FILE: ChunkTag = ChunkTag(*b"FILE");
    pub const IMAGE: ChunkTag = ChunkTag(*b"IMAG");
    pub const DIRECTORY: ChunkTag = ChunkTag(*b"DIRE");
    pub const LINK: ChunkTag = ChunkTag(*b"LINK");
    pub const HARDLINK: ChunkTag = ChunkTag(*b"HLNK");
    pub const SPECIAL: ChunkTag = ChunkTag(*b"SPEC");
    pub const SIGNATURE: ChunkTag = ChunkTag(*b"SIGN");
    pub const EXTENDED_ATTRIBUTE: ChunkTag = ChunkTag(*b"XATR");
    pub const DELTA_SOURCE: ChunkTag = ChunkTag(*b"DELT");
    pub const DATA_BLOCK: ChunkTag = ChunkTag(*b"DATA");
    pub const SPARSE: ChunkTag = ChunkTag(*b"SPRS");
    pub const CONTINUATION: ChunkTag = ChunkTag(*b"CONT");
    pub const RESUME: ChunkTag = ChunkTag(*b"RESM");

    /// Whether a chunk reader/writer computes a CRC32 over this type's body.
    ///
    /// Framing-only marker chunks (`CONT`/`RESM`) don't carry a CRC: their
    /// payload is a handful of bytes naming a neighboring volume, and the
    /// volume transition itself is the integrity check that matters.
    pub fn has_crc(self) -> bool {
        !matches!(self, ChunkTag::CONTINUATION | ChunkTag::RESUME)
    }

    pub fn is_known(self) -> bool {
        matches!(
            self,
            ChunkTag::ARCHIVE_HEADER
                | ChunkTag::SALT
                | ChunkTag::KEY_EXCHANGE
                | ChunkTag::META
                | ChunkTag::FILE
                | ChunkTag::IMAGE
                | ChunkTag::DIRECTORY
                | ChunkTag::LINK
                | ChunkTag::HARDLINK
                | ChunkTag::SPECIAL
                | ChunkTag::SIGNATURE
                | ChunkTag::EXTENDED_ATTRIBUTE
                | ChunkTag::DELTA_SOURCE
                | ChunkTag::DATA_BLOCK
                | ChunkTag::SPARSE
                | ChunkTag::CONTINUATION
                | ChunkTag::RESUME
        )
    }

    pub fn as_str(self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

/// Maximum recursion depth for nested chunk streams (a parent chunk's body
/// that is itself a chunk stream).
pub const MAX_NESTING_DEPTH: u32 = 8;

/// Write a LEB128 varint. Body lengths are usually small (a handful of
/// bytes for metadata chunks, up to the segment size for data blocks), so
/// this rarely costs more than a couple of bytes.
pub fn write_varint<W: Write>(w: &mut W, mut value: u64) -> Result<(), ChunkError> {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        w.write_all(&[byte]).map_err(ChunkError::Io)?;
        if value == 0 {
            break;
        }
    }
    Ok(())
}

pub fn read_varint<R: Read>(r: &mut R) -> Result<u64, ChunkError> {
    let mut value: u64 = 0;
    let mut shift = 0;
    loop {
        let mut byte = [0u8; 1];
        r.read_exact(&mut byte).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ChunkError::UnexpectedEof
            } else {
                ChunkError::Io(e)
            }
        })?;
        value |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 63 {
            return Err(ChunkError::Corrupt("varint too long".into()));
        }
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_round_trips() {
        for value in [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            write_varint(&mut buf, value).unwrap();
            let mut cursor = &buf[..];
            let decoded = read_varint(&mut cursor).unwrap();
            assert_eq!(decoded, value);
        }
    }
}
