//! Bridges a [`super::Storage`] adapter into the [`crate::archive::VolumeSink`]/
//! [`crate::archive::VolumeSource`] seams the Archive Engine writes to and
//! reads from. Volumes are staged in a local scratch directory and handed
//! to the storage adapter whole, which is what makes resumable `put` useful
//! after a crash mid-volume.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

use crate::archive::{ArchiveError, VolumeSink, VolumeSource};
use crate::handle::{BufferedHandle, OpenMode, SizePolicy};

use super::Storage;

pub struct StorageVolumeSink<'s> {
    storage: &'s dyn Storage,
    job_prefix: String,
    scratch_dir: PathBuf,
    pending: HashMap<u32, PathBuf>,
}

impl<'s> StorageVolumeSink<'s> {
    pub fn new(storage: &'s dyn Storage, job_prefix: impl Into<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            job_prefix: job_prefix.into(),
            scratch_dir: scratch_dir.into(),
            pending: HashMap::new(),
        }
    }

    fn object_name(&self, sequence: u32) -> String {
        format!("{}/volume-{:04}", self.job_prefix, sequence)
    }
}

impl<'s> VolumeSink for StorageVolumeSink<'s> {
    fn open_volume(&mut self, sequence: u32) -> Result<Box<dyn Write>, ArchiveError> {
        std::fs::create_dir_all(&self.scratch_dir)?;
        let path = self
            .scratch_dir
            .join(format!("{}-{:04}.part", self.job_prefix, sequence));
        let file = File::create(&path)?;
        self.pending.insert(sequence, path);
        Ok(Box::new(file))
    }

    fn close_volume(&mut self, sequence: u32) -> Result<String, ArchiveError> {
        let path = self
            .pending
            .remove(&sequence)
            .expect("open_volume is always called before close_volume for the same sequence");

        let mut handle = BufferedHandle::open(&path, OpenMode::READ, SizePolicy::BestEffort)?;
        let name = self.object_name(sequence);
        self.storage.put(&name, &mut handle, None)?;
        let _ = std::fs::remove_file(&path);
        Ok(name)
    }
}

pub struct StorageVolumeSource<'s> {
    storage: &'s dyn Storage,
    job_prefix: String,
}

impl<'s> StorageVolumeSource<'s> {
    pub fn new(storage: &'s dyn Storage, job_prefix: impl Into<String>) -> Self {
        Self {
            storage,
            job_prefix: job_prefix.into(),
        }
    }
}

impl<'s> VolumeSource for StorageVolumeSource<'s> {
    fn open_volume(&mut self, sequence: u32) -> Result<Box<dyn Read>, ArchiveError> {
        let name = format!("{}/volume-{:04}", self.job_prefix, sequence);
        let mut handle = self.storage.get(&name)?;
        let mut buf = Vec::new();
        let mut chunk = [0u8; 64 * 1024];
        loop {
            let n = handle.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        Ok(Box::new(std::io::Cursor::new(buf)))
    }
}

#[cfg(test)]
mod tests {
    use crate::archive::entry::{EntryKind, EntryMetadata};
    use crate::archive::{ArchiveReader, ArchiveWriter, TrustSet};
    use crate::codec::{CodecPipeline, CompressionAlgorithm};
    use crate::storage::LocalStorage;

    use super::*;

    #[test]
    fn archive_round_trips_through_a_local_storage_backed_volume() {
        let storage_dir = tempfile::tempdir().unwrap();
        let scratch_dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(storage_dir.path());
        storage.mount().unwrap();

        let sink = StorageVolumeSink::new(&storage, "job-42", scratch_dir.path());
        let codec = CodecPipeline::new(CompressionAlgorithm::Zstd, 1 << 20);
        let mut writer = ArchiveWriter::create(sink, codec, 0, None).unwrap();
        let metadata = EntryMetadata::regular_file("notes.txt", 11);
        writer.begin_entry(EntryKind::Regular, &metadata).unwrap();
        writer.write_data(b"hello there").unwrap();
        writer.end_entry().unwrap();
        let produced = writer.close().unwrap();
        assert_eq!(produced, vec!["job-42/volume-0000".to_string()]);

        let source = StorageVolumeSource::new(&storage, "job-42");
        let codec = CodecPipeline::new(CompressionAlgorithm::Zstd, 1 << 20);
        let mut reader = ArchiveReader::open(source, codec, TrustSet::new(), false).unwrap();
        let entry = reader.next_entry().unwrap().expect("one entry");
        assert_eq!(entry.metadata.name, "notes.txt");
        let data = reader.read_data().unwrap().expect("data segment");
        assert_eq!(data, b"hello there");
    }
}
