//! Entry Pipeline (C6): one producer per source entry, driving the
//! stat → incremental-decision → read → chunk → codec → catalog sequence
//! the Worker Pool (C7) calls into for each entry it is handed.

mod matcher;

pub use matcher::{MatcherError, PatternMatcher};

use std::fs;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::archive::{ArchiveError, ArchiveWriter, EntryKind, EntryMetadata, VolumeSink};
use crate::catalog::{
    Catalog, CatalogError, EntryAttrs, FileAttributes, Fragment, IndexId, SpecialAttributes,
};
use crate::handle::{BufferedHandle, HandleError, OpenMode, SizePolicy};
use crate::error::{Classify, ErrorClass};

pub const DEFAULT_SEGMENT_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum EntryPipelineError {
    #[error(transparent)]
    InvalidPattern(#[from] MatcherError),
    #[error(transparent)]
    Source(#[from] HandleError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Classify for EntryPipelineError {
    fn class(&self) -> ErrorClass {
        match self {
            EntryPipelineError::InvalidPattern(_) => ErrorClass::Configuration,
            EntryPipelineError::Source(_) | EntryPipelineError::Io(_) => ErrorClass::Source,
            EntryPipelineError::Archive(_) => ErrorClass::Archive,
            EntryPipelineError::Catalog(_) => ErrorClass::Index,
            EntryPipelineError::Cancelled => ErrorClass::Lifecycle,
        }
    }
}

/// What happened to one path the pipeline considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Backed,
    SkippedByPattern,
    SkippedUnchanged,
}

/// Running totals matching the fields a [`crate::catalog::HistoryRow`]
/// carries, accumulated as a job walks its source tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineSummary {
    pub total_entry_count: u64,
    pub total_entry_size: u64,
    pub skipped_entry_count: u64,
    pub skipped_entry_size: u64,
    pub error_entry_count: u64,
    pub error_entry_size: u64,
}

impl PipelineSummary {
    fn record(&mut self, outcome: EntryOutcome, size: u64) {
        match outcome {
            EntryOutcome::Backed => {
                self.total_entry_count += 1;
                self.total_entry_size += size;
            }
            EntryOutcome::SkippedByPattern | EntryOutcome::SkippedUnchanged => {
                self.skipped_entry_count += 1;
                self.skipped_entry_size += size;
            }
        }
    }

    fn record_error(&mut self, size: u64) {
        self.error_entry_count += 1;
        self.error_entry_size += size;
    }
}

/// Drives one job's source tree through an [`ArchiveWriter`] and an
/// [`Catalog`]. Owns neither: both are borrowed from the Worker that runs
/// this pipeline for the duration of one entity.
pub struct EntryPipeline<'a, S: VolumeSink> {
    writer: &'a mut ArchiveWriter<S>,
    catalog: &'a dyn Catalog,
    storage_id: IndexId,
    incremental_base: Option<IndexId>,
    matcher: PatternMatcher,
    segment_size: usize,
    cancel: Arc<AtomicBool>,
}

impl<'a, S: VolumeSink> EntryPipeline<'a, S> {
    pub fn new(
        writer: &'a mut ArchiveWriter<S>,
        catalog: &'a dyn Catalog,
        storage_id: IndexId,
        incremental_base: Option<IndexId>,
        matcher: PatternMatcher,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            writer,
            catalog,
            storage_id,
            incremental_base,
            matcher,
            segment_size: DEFAULT_SEGMENT_SIZE,
            cancel,
        }
    }

    pub fn with_segment_size(mut self, segment_size: usize) -> Self {
        self.segment_size = segment_size;
        self
    }

    /// Walk `root`, processing every entry reachable from it and folding
    /// results into a running [`PipelineSummary`].
    pub fn run(&mut self, root: &Path) -> Result<PipelineSummary, EntryPipelineError> {
        let mut summary = PipelineSummary::default();
        self.walk(root, root, &mut summary)?;
        Ok(summary)
    }

    fn walk(
        &mut self,
        root: &Path,
        dir: &Path,
        summary: &mut PipelineSummary,
    ) -> Result<(), EntryPipelineError> {
        let mut read_dir: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
        read_dir.sort_by_key(|e| e.file_name());

        for dir_entry in read_dir {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(EntryPipelineError::Cancelled);
            }

            let path = dir_entry.path();
            let relative = path.strip_prefix(root).unwrap_or(&path);
            let relative_bytes = relative.as_os_str().as_bytes_lossy();
            let file_type = dir_entry.file_type()?;

            if !self.matcher.is_included(&relative_bytes, file_type.is_dir()) {
                summary.record(EntryOutcome::SkippedByPattern, 0);
                continue;
            }

            match self.process_path(root, &path) {
                Ok((outcome, size)) => summary.record(outcome, size),
                Err(EntryPipelineError::Cancelled) => return Err(EntryPipelineError::Cancelled),
                Err(_err) => summary.record_error(0),
            }

            if file_type.is_dir() {
                self.walk(root, &path, summary)?;
            }
        }
        Ok(())
    }

    /// Steps (a)-(g) for one path: stat, incremental decision, begin_entry,
    /// stream data, end_entry, catalog insertion.
    fn process_path(
        &mut self,
        root: &Path,
        path: &Path,
    ) -> Result<(EntryOutcome, u64), EntryPipelineError> {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let name = relative.to_string_lossy().into_owned();
        let meta = fs::symlink_metadata(path)?;

        if let Some(base) = self.incremental_base {
            if let Some(prior) = self.catalog.lookup_prior_entry(base, &name)? {
                if prior.time_last_changed == meta.mtime() && prior.size == Some(meta.size()) {
                    return Ok((EntryOutcome::SkippedUnchanged, meta.size()));
                }
            }
        }

        let attrs = EntryAttrs {
            time_last_changed: meta.mtime(),
            uid: meta.uid(),
            gid: meta.gid(),
            mode: meta.mode(),
            mtime: meta.mtime(),
            atime: meta.atime(),
            ctime: meta.ctime(),
        };

        let file_type = meta.file_type();

        if file_type.is_symlink() {
            let target = fs::read_link(path)?.to_string_lossy().into_owned();
            let metadata = EntryMetadata {
                link_target: Some(target.clone()),
                ..regular_metadata(&name, 0, &meta)
            };
            self.writer.begin_entry(EntryKind::Link, &metadata)?;
            self.writer.end_entry()?;
            self.catalog
                .add_link_entry(self.storage_id, &name, &attrs, &target)?;
            return Ok((EntryOutcome::Backed, 0));
        }

        if file_type.is_dir() {
            let metadata = regular_metadata(&name, 0, &meta);
            self.writer.begin_entry(EntryKind::Directory, &metadata)?;
            self.writer.end_entry()?;
            self.catalog.add_directory_entry(self.storage_id, &name, &attrs)?;
            return Ok((EntryOutcome::Backed, 0));
        }

        if !file_type.is_file() {
            let special_type = special_type_name(&file_type);
            let metadata = EntryMetadata {
                device_major: Some(major_from_rdev(meta.rdev())),
                device_minor: Some(minor_from_rdev(meta.rdev())),
                ..regular_metadata(&name, 0, &meta)
            };
            self.writer.begin_entry(EntryKind::Special, &metadata)?;
            self.writer.end_entry()?;
            self.catalog.add_special_entry(
                self.storage_id,
                &name,
                &attrs,
                &SpecialAttributes {
                    special_type: special_type.to_string(),
                    device_major: Some(major_from_rdev(meta.rdev())),
                    device_minor: Some(minor_from_rdev(meta.rdev())),
                },
            )?;
            return Ok((EntryOutcome::Backed, 0));
        }

        // Regular file. nlink > 1 means this inode may already have been
        // seen as a different path within this job.
        if meta.nlink() > 1 {
            if let Some(existing_name) = self.writer.lookup_inode(meta.dev(), meta.ino()).map(str::to_string) {
                let metadata = EntryMetadata {
                    link_target: Some(existing_name.clone()),
                    ..regular_metadata(&name, meta.size(), &meta)
                };
                self.writer.begin_entry(EntryKind::Hardlink, &metadata)?;
                self.writer.end_entry()?;
                self.catalog
                    .add_hardlink_entry(self.storage_id, &name, &attrs, &existing_name)?;
                return Ok((EntryOutcome::Backed, meta.size()));
            }
            self.writer.register_inode(meta.dev(), meta.ino(), name.clone());
        }

        let metadata = regular_metadata(&name, meta.size(), &meta);
        self.writer.begin_entry(EntryKind::Regular, &metadata)?;

        let mut handle = BufferedHandle::open(path, OpenMode::READ, SizePolicy::BestEffort)?;
        let mut fragments = Vec::new();
        let mut offset = 0u64;
        let mut buf = vec![0u8; self.segment_size];

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                self.writer.end_entry()?;
                return Err(EntryPipelineError::Cancelled);
            }
            let n = handle.read(&mut buf)?;
            if n == 0 {
                break;
            }
            let segment = &buf[..n];
            if segment.iter().all(|b| *b == 0) {
                self.writer.write_sparse(n as u64)?;
            } else {
                self.writer.write_data(segment)?;
            }
            fragments.push(Fragment {
                offset,
                length: n as u64,
            });
            offset += n as u64;
        }
        self.writer.end_entry()?;

        self.catalog.add_file_entry(
            self.storage_id,
            &name,
            &attrs,
            &fragments,
            &FileAttributes {
                size: meta.size(),
                checksum: None,
            },
        )?;

        Ok((EntryOutcome::Backed, meta.size()))
    }
}

fn regular_metadata(name: &str, size: u64, meta: &fs::Metadata) -> EntryMetadata {
    EntryMetadata {
        name: name.to_string(),
        size,
        mode: meta.mode(),
        uid: meta.uid(),
        gid: meta.gid(),
        mtime: meta.mtime(),
        atime: meta.atime(),
        ctime: meta.ctime(),
        link_target: None,
        device_major: None,
        device_minor: None,
    }
}

fn special_type_name(file_type: &fs::FileType) -> &'static str {
    if file_type.is_char_device() {
        "char"
    } else if file_type.is_block_device() {
        "block"
    } else if file_type.is_fifo() {
        "fifo"
    } else if file_type.is_socket() {
        "socket"
    } else {
        "unknown"
    }
}

fn major_from_rdev(rdev: u64) -> u32 {
    ((rdev >> 8) & 0xfff) as u32
}

fn minor_from_rdev(rdev: u64) -> u32 {
    (rdev & 0xff) as u32
}

trait OsStrBytesLossy {
    fn as_bytes_lossy(&self) -> Vec<u8>;
}

impl OsStrBytesLossy for std::ffi::OsStr {
    fn as_bytes_lossy(&self) -> Vec<u8> {
        use std::os::unix::ffi::OsStrExt;
        self.as_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SqliteCatalog;
    use crate::codec::{CodecPipeline, CompressionAlgorithm};
    use std::io::Write;

    #[test]
    fn pattern_matcher_prunes_before_walking() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.txt"), b"hello").unwrap();
        std::fs::write(dir.path().join("ignore.tmp"), b"world").unwrap();

        let matcher = PatternMatcher::new(&[], &["*.tmp".to_string()]).unwrap();
        assert!(matcher.is_included(b"keep.txt", false));
        assert!(!matcher.is_included(b"ignore.tmp", false));
    }

    #[test]
    fn walk_backs_up_files_and_records_catalog_entries() {
        let source_dir = tempfile::tempdir().unwrap();
        std::fs::write(source_dir.path().join("a.txt"), vec![0x41u8; 1024]).unwrap();
        std::fs::create_dir(source_dir.path().join("sub")).unwrap();
        std::fs::write(source_dir.path().join("sub/b.txt"), vec![0u8; 2048]).unwrap();

        struct SingleVolumeSink(Option<Vec<u8>>);
        impl VolumeSink for SingleVolumeSink {
            fn open_volume(&mut self, _sequence: u32) -> Result<Box<dyn Write>, ArchiveError> {
                Ok(Box::new(std::io::Cursor::new(Vec::new())))
            }
            fn close_volume(&mut self, _sequence: u32) -> Result<String, ArchiveError> {
                Ok("volume-0000".to_string())
            }
        }

        let sink = SingleVolumeSink(None);
        let codec = CodecPipeline::new(CompressionAlgorithm::Zstd, 1 << 20);
        let mut writer = ArchiveWriter::create(sink, codec, 0, None).unwrap();

        let catalog = SqliteCatalog::in_memory().unwrap();
        let uuid_id = catalog.new_uuid(uuid::Uuid::new_v4()).unwrap();
        let entity_id = catalog.new_entity(uuid_id, None, "backup", 1000).unwrap();
        let storage_id = catalog.new_storage(entity_id, "volume-0000").unwrap();

        let cancel = Arc::new(AtomicBool::new(false));
        let matcher = PatternMatcher::none();
        let mut pipeline = EntryPipeline::new(&mut writer, &catalog, storage_id, None, matcher, cancel);

        let summary = pipeline.run(source_dir.path()).unwrap();
        assert_eq!(summary.total_entry_count, 3); // a.txt, sub, sub/b.txt
        assert_eq!(summary.error_entry_count, 0);

        let entries = catalog
            .list_entries(&crate::catalog::Query::new())
            .unwrap();
        assert_eq!(entries.len(), 3);
    }
}
