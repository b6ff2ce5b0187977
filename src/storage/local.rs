use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use crate::handle::{BufferedHandle, OpenMode, SizePolicy};

use super::{ProgressCallback, Storage, StorageError};

/// A plain directory on the local filesystem. Each stored object is one
/// file under `root`, named by whatever the caller passes as `name`
/// (typically a job-scoped relative path).
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// How many bytes of `target_path` already match a prefix of `source`'s
    /// content, so [`Storage::put`] can resume instead of re-uploading.
    fn resumable_offset(
        &self,
        target_path: &PathBuf,
        source: &mut BufferedHandle,
    ) -> Result<u64, StorageError> {
        let existing_len = match fs::metadata(target_path) {
            Ok(m) => m.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        if existing_len == 0 {
            return Ok(0);
        }
        let compare_len = existing_len.min(source.size().unwrap_or(0));
        if compare_len == 0 {
            return Ok(0);
        }

        let mut existing = File::open(target_path)?;
        let mut existing_buf = vec![0u8; compare_len as usize];
        existing.read_exact(&mut existing_buf)?;

        source.seek(0)?;
        let mut source_buf = vec![0u8; compare_len as usize];
        source.read_exact(&mut source_buf)?;

        Ok(if existing_buf == source_buf {
            compare_len
        } else {
            0
        })
    }
}

impl Storage for LocalStorage {
    fn put(
        &self,
        name: &str,
        source: &mut BufferedHandle,
        mut progress: Option<ProgressCallback<'_>>,
    ) -> Result<String, StorageError> {
        let target_path = self.resolve(name);
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let resume_offset = self.resumable_offset(&target_path, source)?;
        source.seek(resume_offset)?;

        let mut target = OpenOptions::new()
            .write(true)
            .create(true)
            .open(&target_path)?;
        target.set_len(resume_offset)?;
        target.seek(SeekFrom::Start(resume_offset))?;

        let mut buf = [0u8; 64 * 1024];
        let mut total = resume_offset;
        loop {
            let n = source.read(&mut buf)?;
            if n == 0 {
                break;
            }
            target.write_all(&buf[..n])?;
            total += n as u64;
            if let Some(cb) = progress.as_mut() {
                cb(total);
            }
        }
        target.flush()?;
        Ok(name.to_string())
    }

    fn get(&self, name: &str) -> Result<BufferedHandle, StorageError> {
        let handle = BufferedHandle::open(self.resolve(name), OpenMode::READ, SizePolicy::BestEffort)?;
        Ok(handle)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let base = self.resolve(prefix);
        let mut names = Vec::new();
        if !base.exists() {
            return Ok(names);
        }
        for entry in walkdir::WalkDir::new(&base).into_iter() {
            let entry = entry.map_err(|e| {
                StorageError::NotReachable(format!("listing {}: {}", base.display(), e))
            })?;
            if entry.file_type().is_file() {
                if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                    names.push(relative.to_string_lossy().into_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.resolve(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn mount(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    fn unmount(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn is_mounted(&self) -> Result<bool, StorageError> {
        Ok(self.root.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle_for(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> BufferedHandle {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        BufferedHandle::open(path, OpenMode::READ, SizePolicy::BestEffort).unwrap()
    }

    #[test]
    fn put_and_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("vault"));
        storage.mount().unwrap();

        let source_dir = tempfile::tempdir().unwrap();
        let mut source = handle_for(&source_dir, "source.bin", b"archive contents");
        storage.put("job-1/volume-0000", &mut source, None).unwrap();

        let mut retrieved = storage.get("job-1/volume-0000").unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8];
        loop {
            let n = retrieved.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(buf, b"archive contents");
    }

    #[test]
    fn put_resumes_when_target_prefix_matches_source() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        fs::write(dir.path().join("partial.bin"), b"hello, ").unwrap();

        let source_dir = tempfile::tempdir().unwrap();
        let mut source = handle_for(&source_dir, "full.bin", b"hello, world!");
        storage.put("partial.bin", &mut source, None).unwrap();

        let contents = fs::read(dir.path().join("partial.bin")).unwrap();
        assert_eq!(contents, b"hello, world!");
    }

    #[test]
    fn put_restarts_when_target_prefix_does_not_match() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        fs::write(dir.path().join("mismatch.bin"), b"wrong data here").unwrap();

        let source_dir = tempfile::tempdir().unwrap();
        let mut source = handle_for(&source_dir, "full.bin", b"hello, world!");
        storage.put("mismatch.bin", &mut source, None).unwrap();

        let contents = fs::read(dir.path().join("mismatch.bin")).unwrap();
        assert_eq!(contents, b"hello, world!");
    }
}
