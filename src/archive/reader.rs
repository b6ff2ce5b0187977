use std::io::Read;

use log::warn;

use crate::chunk::{read_varint, ChunkReader, ChunkTag};
use crate::codec::CodecPipeline;

use super::entry::{Entry, EntryKind, EntryMetadata};
use super::signature::{parse_signature, SigningReader, TrustSet};
use super::{ArchiveError, FORMAT_MAJOR};

/// Where an archive reader's volumes come from — the read-side counterpart
/// of [`super::writer::VolumeSink`].
pub trait VolumeSource {
    fn open_volume(&mut self, sequence: u32) -> Result<Box<dyn Read>, ArchiveError>;
}

/// Reads a chunk-framed archive back, following `CONT`/`RESM` volume
/// transitions transparently and yielding entries in on-disk order.
///
/// Grounded on the teacher's `DataBlobReader` state machine, generalized to
/// a stream of many entries across possibly many volumes instead of one
/// whole-file blob.
pub struct ArchiveReader<S: VolumeSource> {
    source: S,
    sequence: u32,
    chunk_reader: Option<ChunkReader<SigningReader<Box<dyn Read>>>>,
    codec: CodecPipeline,
    trust: TrustSet,
    unsafe_continue: bool,
    signature_failed: bool,
    pending: Option<(ChunkTag, Vec<u8>)>,
    current_entry: Option<Entry>,
}

impl<S: VolumeSource> ArchiveReader<S> {
    pub fn open(
        mut source: S,
        codec: CodecPipeline,
        trust: TrustSet,
        unsafe_continue: bool,
    ) -> Result<Self, ArchiveError> {
        let raw = source.open_volume(0)?;
        let capture = !trust.is_empty();
        let chunk_reader = ChunkReader::new(SigningReader::new(raw, capture));

        let mut reader = Self {
            source,
            sequence: 0,
            chunk_reader: Some(chunk_reader),
            codec,
            trust,
            unsafe_continue,
            signature_failed: false,
            pending: None,
            current_entry: None,
        };
        reader.expect_archive_header()?;
        Ok(reader)
    }

    fn expect_archive_header(&mut self) -> Result<(), ArchiveError> {
        match self.next_raw_chunk_unchecked()? {
            Some((ChunkTag::ARCHIVE_HEADER, body)) => {
                if body.len() < 2 {
                    return Err(ArchiveError::Corrupt("archive header too short".into()));
                }
                let major = u16::from_le_bytes([body[0], body[1]]);
                if major != FORMAT_MAJOR {
                    return Err(ArchiveError::Corrupt(format!(
                        "unsupported archive format major version {}",
                        major
                    )));
                }
                Ok(())
            }
            Some((other, _)) => Err(ArchiveError::Corrupt(format!(
                "expected archive header, found {:?}",
                other.as_str()
            ))),
            None => Err(ArchiveError::Corrupt("empty archive".into())),
        }
    }

    /// Return the next entry, automatically discarding any data chunks of
    /// the previous entry the caller didn't read via [`read_data`].
    ///
    /// [`read_data`]: ArchiveReader::read_data
    pub fn next_entry(&mut self) -> Result<Option<Entry>, ArchiveError> {
        if self.signature_failed && !self.unsafe_continue {
            return Err(ArchiveError::UnverifiedSignature);
        }
        loop {
            match self.next_raw_chunk()? {
                None => {
                    self.current_entry = None;
                    return Ok(None);
                }
                Some((tag, body)) => {
                    if tag == ChunkTag::DATA_BLOCK || tag == ChunkTag::SPARSE {
                        continue;
                    }
                    let kind = EntryKind::from_chunk_tag(tag)
                        .ok_or_else(|| ArchiveError::Corrupt(format!("unexpected chunk {:?} where an entry was expected", tag.as_str())))?;
                    let metadata: EntryMetadata = serde_json::from_slice(&body)
                        .map_err(|e| ArchiveError::Corrupt(format!("entry metadata decode failed: {}", e)))?;
                    let entry = Entry { kind, metadata };
                    self.current_entry = Some(entry.clone());
                    return Ok(Some(entry));
                }
            }
        }
    }

    /// Return the current entry's next content segment, or `None` once its
    /// data is exhausted (the chunk that ended it is buffered for the next
    /// [`next_entry`] call).
    ///
    /// [`next_entry`]: ArchiveReader::next_entry
    pub fn read_data(&mut self) -> Result<Option<Vec<u8>>, ArchiveError> {
        match self.next_raw_chunk()? {
            None => Ok(None),
            Some((ChunkTag::DATA_BLOCK, body)) => Ok(Some(self.codec.decode_frame(&body)?)),
            Some((ChunkTag::SPARSE, body)) => {
                let mut cursor = &body[..];
                let length = read_varint(&mut cursor)?;
                Ok(Some(vec![0u8; length as usize]))
            }
            Some(other) => {
                self.pending = Some(other);
                Ok(None)
            }
        }
    }

    pub fn current_entry(&self) -> Option<&Entry> {
        self.current_entry.as_ref()
    }

    fn reader_mut(&mut self) -> &mut ChunkReader<SigningReader<Box<dyn Read>>> {
        self.chunk_reader
            .as_mut()
            .expect("chunk_reader is always present between operations")
    }

    /// Pull the next semantically meaningful chunk: transparently handles
    /// `ARCHIVE_HEADER`/`RESM` (informational, skipped), `SIGN` (verified
    /// against the trust set) and `CONT` (follows to the next volume).
    fn next_raw_chunk(&mut self) -> Result<Option<(ChunkTag, Vec<u8>)>, ArchiveError> {
        if let Some(pending) = self.pending.take() {
            return Ok(Some(pending));
        }
        self.next_raw_chunk_unchecked()
    }

    fn next_raw_chunk_unchecked(&mut self) -> Result<Option<(ChunkTag, Vec<u8>)>, ArchiveError> {
        loop {
            let captured_mark = self.reader_mut().get_ref().buffered().len();
            let next = match self.reader_mut().read_chunk()? {
                None => None,
                Some((tag, _len, mut body)) => {
                    let mut buf = Vec::new();
                    body.read_to_end(&mut buf).map_err(ArchiveError::Io)?;
                    body.finish()?;
                    Some((tag, buf))
                }
            };

            match next {
                None => return Ok(None),
                Some((ChunkTag::ARCHIVE_HEADER, _)) | Some((ChunkTag::RESUME, _)) => continue,
                Some((ChunkTag::SIGNATURE, body)) => {
                    self.check_signature(&body, captured_mark)?;
                    continue;
                }
                Some((ChunkTag::CONTINUATION, body)) => {
                    if body.len() < 4 {
                        return Err(ArchiveError::Corrupt("continuation marker too short".into()));
                    }
                    let next_sequence = u32::from_le_bytes(body[0..4].try_into().unwrap());
                    self.open_volume(next_sequence)?;
                    continue;
                }
                Some(other) => return Ok(Some(other)),
            }
        }
    }

    fn check_signature(&mut self, body: &[u8], captured_mark: usize) -> Result<(), ArchiveError> {
        let tag = parse_signature(body)?;
        if self.trust.is_empty() {
            return Ok(());
        }
        let captured = self.reader_mut().get_ref().buffered();
        let signed_region = &captured[..captured_mark.min(captured.len())];
        if self.trust.verify(signed_region, &tag) {
            Ok(())
        } else {
            self.signature_failed = true;
            if self.unsafe_continue {
                warn!("archive volume {} failed signature verification (continuing: unsafe mode)", self.sequence);
                Ok(())
            } else {
                Err(ArchiveError::UnverifiedSignature)
            }
        }
    }

    fn open_volume(&mut self, sequence: u32) -> Result<(), ArchiveError> {
        let raw = self.source.open_volume(sequence)?;
        let capture = !self.trust.is_empty();
        self.chunk_reader = Some(ChunkReader::new(SigningReader::new(raw, capture)));
        self.sequence = sequence;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::archive::writer::{ArchiveWriter, VolumeSink};
    use crate::codec::CompressionAlgorithm;

    use super::*;

    struct Sink(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);
    impl std::io::Write for Sink {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().write(data)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
    struct MemSink {
        storage: std::rc::Rc<std::cell::RefCell<Vec<u8>>>,
    }
    impl VolumeSink for MemSink {
        fn open_volume(&mut self, _sequence: u32) -> Result<Box<dyn std::io::Write>, ArchiveError> {
            Ok(Box::new(Sink(self.storage.clone())))
        }
        fn close_volume(&mut self, sequence: u32) -> Result<String, ArchiveError> {
            Ok(format!("volume-{}", sequence))
        }
    }

    struct MemSource {
        bytes: Vec<u8>,
    }
    impl VolumeSource for MemSource {
        fn open_volume(&mut self, _sequence: u32) -> Result<Box<dyn Read>, ArchiveError> {
            Ok(Box::new(Cursor::new(self.bytes.clone())))
        }
    }

    fn build_single_entry_archive(signing_key: Option<Vec<u8>>) -> Vec<u8> {
        let storage = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = MemSink {
            storage: storage.clone(),
        };
        let codec = CodecPipeline::new(CompressionAlgorithm::Zstd, 1 << 20);
        let mut writer = ArchiveWriter::create(sink, codec, 0, signing_key).unwrap();
        let metadata = EntryMetadata::regular_file("greeting.txt", 13);
        writer.begin_entry(EntryKind::Regular, &metadata).unwrap();
        writer.write_data(b"hello, world!").unwrap();
        writer.end_entry().unwrap();
        writer.close().unwrap();
        storage.borrow().clone()
    }

    #[test]
    fn reads_back_the_entry_and_its_data() {
        let bytes = build_single_entry_archive(None);
        let codec = CodecPipeline::new(CompressionAlgorithm::Zstd, 1 << 20);
        let mut reader =
            ArchiveReader::open(MemSource { bytes }, codec, TrustSet::new(), false).unwrap();

        let entry = reader.next_entry().unwrap().expect("one entry");
        assert_eq!(entry.kind, EntryKind::Regular);
        assert_eq!(entry.metadata.name, "greeting.txt");

        let data = reader.read_data().unwrap().expect("one data chunk");
        assert_eq!(data, b"hello, world!");
        assert!(reader.read_data().unwrap().is_none());
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn skips_unread_entry_data_when_moving_to_the_next_entry() {
        let bytes = build_single_entry_archive(None);
        let codec = CodecPipeline::new(CompressionAlgorithm::Zstd, 1 << 20);
        let mut reader =
            ArchiveReader::open(MemSource { bytes }, codec, TrustSet::new(), false).unwrap();

        reader.next_entry().unwrap().expect("one entry");
        // Don't call read_data() at all — next_entry() must skip the DATA_BLOCK.
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn a_valid_signature_verifies_and_an_invalid_one_is_rejected() {
        let key = b"trusted-volume-key".to_vec();
        let bytes = build_single_entry_archive(Some(key.clone()));
        let trust = TrustSet::new().with_key(key);
        let codec = CodecPipeline::new(CompressionAlgorithm::Zstd, 1 << 20);
        let mut reader = ArchiveReader::open(
            MemSource {
                bytes: bytes.clone(),
            },
            codec,
            trust,
            false,
        )
        .unwrap();
        reader.next_entry().unwrap().expect("one entry");
        reader.read_data().unwrap().expect("one data chunk");
        assert!(reader.next_entry().unwrap().is_none());

        let wrong_trust = TrustSet::new().with_key(b"wrong-key".to_vec());
        let codec = CodecPipeline::new(CompressionAlgorithm::Zstd, 1 << 20);
        let mut reader = ArchiveReader::open(
            MemSource { bytes },
            codec,
            wrong_trust,
            false,
        )
        .unwrap();
        reader.next_entry().unwrap();
        reader.read_data().unwrap();
        assert!(matches!(
            reader.next_entry(),
            Err(ArchiveError::UnverifiedSignature)
        ));
    }
}
