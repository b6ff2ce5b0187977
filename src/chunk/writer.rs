use std::io::Write;

use super::header::{write_varint, ChunkTag};
use super::ChunkError;

/// Writes a stream of framed chunks to an underlying sink.
///
/// Each chunk is assembled in memory first (tag, body, and — for types that
/// carry one — a CRC32 are all known before anything hits the wire), then
/// written as one contiguous `tag || varint(len) || body || [crc]` run. This
/// keeps the writer usable on `Stream`-mode sinks that can't seek, at the
/// cost of buffering one chunk body at a time — acceptable since chunk
/// bodies are bounded by the segment size the caller chose upstream.
pub struct ChunkWriter<W: Write> {
    sink: W,
    bytes_written: u64,
}

impl<W: Write> ChunkWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            bytes_written: 0,
        }
    }

    /// Total bytes written so far, used by the archive engine to decide
    /// when a volume boundary has been reached.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Write a chunk whose body is supplied as a single byte slice.
    pub fn write_chunk(&mut self, tag: ChunkTag, body: &[u8]) -> Result<(), ChunkError> {
        self.sink.write_all(&tag.0)?;
        write_varint(&mut self.sink, body.len() as u64)?;
        self.sink.write_all(body)?;
        let mut frame_len = 4 + varint_len(body.len() as u64) as u64 + body.len() as u64;

        if tag.has_crc() {
            let crc = crc32fast::hash(body);
            self.sink.write_all(&crc.to_le_bytes())?;
            frame_len += 4;
        }

        self.bytes_written += frame_len;
        Ok(())
    }

    /// Write a chunk whose body is built by composing other chunks (nested
    /// sub-chunk stream), via a closure given a fresh [`ChunkWriter`] over an
    /// in-memory buffer.
    pub fn write_nested_chunk(
        &mut self,
        tag: ChunkTag,
        build: impl FnOnce(&mut ChunkWriter<Vec<u8>>) -> Result<(), ChunkError>,
    ) -> Result<(), ChunkError> {
        let mut nested = ChunkWriter::new(Vec::new());
        build(&mut nested)?;
        self.write_chunk(tag, &nested.sink)
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    pub fn flush(&mut self) -> Result<(), ChunkError> {
        self.sink.flush().map_err(ChunkError::Io)
    }
}

fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    value >>= 7;
    while value != 0 {
        len += 1;
        value >>= 7;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_tag_length_body_and_crc() {
        let mut w = ChunkWriter::new(Vec::new());
        w.write_chunk(ChunkTag::FILE, b"hello").unwrap();
        let out = w.into_inner();
        assert_eq!(&out[0..4], b"FILE");
        assert_eq!(out[4], 5); // varint(5) == 5
        assert_eq!(&out[5..10], b"hello");
        let crc = u32::from_le_bytes(out[10..14].try_into().unwrap());
        assert_eq!(crc, crc32fast::hash(b"hello"));
    }

    #[test]
    fn continuation_marker_has_no_crc() {
        let mut w = ChunkWriter::new(Vec::new());
        w.write_chunk(ChunkTag::CONTINUATION, b"vol-2").unwrap();
        let out = w.into_inner();
        assert_eq!(out.len(), 4 + 1 + 5);
    }
}
