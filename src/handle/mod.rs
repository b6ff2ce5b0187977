//! Buffered Handle (C1): a unified byte-stream abstraction over local files,
//! block devices, and (via [`crate::storage`]) remote storage.
//!
//! Grounded on the teacher's direct-syscall style in its disk/device
//! tooling: no abstract VFS layer, just `nix`/`libc` calls wrapped in a
//! small struct with explicit mode flags.

mod device;

pub use device::probe_block_device_size;

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::{Classify, ErrorClass};

#[derive(Debug, Error)]
pub enum HandleError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("end of file")]
    EndOfFile,
    #[error("resource busy: {0}")]
    Busy(String),
    #[error("size required but could not be determined for {0}")]
    SizeUnavailable(String),
}

impl Classify for HandleError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Source
    }
}

impl HandleError {
    fn from_io(path: &Path, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => HandleError::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => {
                HandleError::PermissionDenied(path.display().to_string())
            }
            _ => HandleError::Io {
                path: path.display().to_string(),
                source,
            },
        }
    }
}

bitflags::bitflags! {
    /// Mode flags a [`BufferedHandle`] is opened with.
    pub struct OpenMode: u32 {
        const READ      = 0b0000_0001;
        const WRITE     = 0b0000_0010;
        const APPEND    = 0b0000_0100;
        const CREATE    = 0b0000_1000;
        const NO_ATIME  = 0b0001_0000;
        const NO_CACHE  = 0b0010_0000;
        const SPARSE    = 0b0100_0000;
        const STREAM    = 0b1000_0000;
    }
}

/// Identifies what a handle is backed by; part of a `BufferedHandle`'s identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    RegularFile,
    BlockDevice,
    Fifo,
}

/// Whether the caller requires `size()` to succeed at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizePolicy {
    /// `open` fails if the size can't be determined.
    Required,
    /// `size()` may return `None` later; the caller copes (e.g. streams).
    BestEffort,
}

/// A buffered byte-stream handle over a local file or block device.
///
/// Invariant: `offset <= size` whenever `size` is known; after any write in
/// `APPEND` mode, `offset == size`.
pub struct BufferedHandle {
    file: File,
    path: PathBuf,
    kind: SourceKind,
    mode: OpenMode,
    offset: u64,
    size: Option<u64>,
    pre_open_atime: Option<(nix::sys::time::TimeSpec, nix::sys::time::TimeSpec)>,
    touched_range: Option<(u64, u64)>,
}

impl BufferedHandle {
    /// Open `path` with the given mode flags.
    ///
    /// If the backing is a block device and its size can't be statically
    /// known, a platform probe is attempted (see [`probe_block_device_size`]);
    /// if that fails and `size_policy` is [`SizePolicy::Required`], `open`
    /// fails with [`HandleError::SizeUnavailable`].
    pub fn open(
        path: impl AsRef<Path>,
        mode: OpenMode,
        size_policy: SizePolicy,
    ) -> Result<Self, HandleError> {
        let path = path.as_ref().to_path_buf();

        let mut options = OpenOptions::new();
        options.read(mode.contains(OpenMode::READ));
        options.write(mode.contains(OpenMode::WRITE) || mode.contains(OpenMode::APPEND));
        options.append(mode.contains(OpenMode::APPEND));
        options.create(mode.contains(OpenMode::CREATE));

        let mut native_no_atime = false;
        if mode.contains(OpenMode::NO_ATIME) {
            // O_NOATIME requires CAP_FOWNER or file ownership on Linux; we
            // try it opportunistically and fall back to save/restore.
            options.custom_flags(libc::O_NOATIME);
            native_no_atime = true;
        }

        let pre_open_atime = if mode.contains(OpenMode::NO_ATIME) {
            stat_atime(&path).ok()
        } else {
            None
        };

        let file = match options.open(&path) {
            Ok(f) => {
                native_no_atime = native_no_atime && true;
                f
            }
            Err(_) if native_no_atime => {
                // Kernel-native no-atime open failed (unsupported or denied):
                // fall back to a plain open plus restore-on-close.
                let mut fallback = OpenOptions::new();
                fallback.read(mode.contains(OpenMode::READ));
                fallback.write(mode.contains(OpenMode::WRITE) || mode.contains(OpenMode::APPEND));
                fallback.append(mode.contains(OpenMode::APPEND));
                fallback.create(mode.contains(OpenMode::CREATE));
                native_no_atime = false;
                fallback
                    .open(&path)
                    .map_err(|e| HandleError::from_io(&path, e))?
            }
            Err(e) => return Err(HandleError::from_io(&path, e)),
        };
        let _ = native_no_atime;

        let metadata = file.metadata().map_err(|e| HandleError::from_io(&path, e))?;
        let file_type = metadata.file_type();

        let kind = if is_block_device(&file_type) {
            SourceKind::BlockDevice
        } else if is_fifo(&file_type) {
            SourceKind::Fifo
        } else {
            SourceKind::RegularFile
        };

        let size = match kind {
            SourceKind::RegularFile => Some(metadata.len()),
            SourceKind::BlockDevice => match probe_block_device_size(&file) {
                Ok(size) => Some(size),
                Err(_) if size_policy == SizePolicy::Required => {
                    return Err(HandleError::SizeUnavailable(path.display().to_string()))
                }
                Err(_) => None,
            },
            SourceKind::Fifo => None,
        };

        let offset = if mode.contains(OpenMode::APPEND) {
            size.unwrap_or(0)
        } else {
            0
        };

        Ok(Self {
            file,
            path,
            kind,
            mode,
            offset,
            size,
            pre_open_atime,
            touched_range: None,
        })
    }

    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn tell(&self) -> u64 {
        self.offset
    }

    /// Read up to `buf.len()` bytes; returns the number of bytes read, `0`
    /// meaning EOF.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, HandleError> {
        let n = self
            .file
            .read(buf)
            .map_err(|e| HandleError::from_io(&self.path, e))?;
        self.note_touched(self.offset, n as u64);
        self.offset += n as u64;
        Ok(n)
    }

    /// Read exactly `buf.len()` bytes or fail with [`HandleError::EndOfFile`].
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), HandleError> {
        match self.file.read_exact(buf) {
            Ok(()) => {
                self.note_touched(self.offset, buf.len() as u64);
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(HandleError::EndOfFile)
            }
            Err(e) => Err(HandleError::from_io(&self.path, e)),
        }
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<usize, HandleError> {
        let n = self
            .file
            .write(buf)
            .map_err(|e| HandleError::from_io(&self.path, e))?;
        self.note_touched(self.offset, n as u64);
        self.offset += n as u64;
        if let Some(size) = self.size {
            self.size = Some(size.max(self.offset));
        } else {
            self.size = Some(self.offset);
        }
        Ok(n)
    }

    pub fn write_all(&mut self, buf: &[u8]) -> Result<(), HandleError> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..])?;
            if n == 0 {
                return Err(HandleError::Io {
                    path: self.path.display().to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "write returned 0",
                    ),
                });
            }
            written += n;
        }
        Ok(())
    }

    pub fn seek(&mut self, offset: u64) -> Result<(), HandleError> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| HandleError::from_io(&self.path, e))?;
        self.offset = offset;
        Ok(())
    }

    pub fn truncate(&mut self, size: u64) -> Result<(), HandleError> {
        self.file
            .set_len(size)
            .map_err(|e| HandleError::from_io(&self.path, e))?;
        self.size = Some(size);
        if self.offset > size {
            self.offset = size;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), HandleError> {
        self.file
            .flush()
            .map_err(|e| HandleError::from_io(&self.path, e))
    }

    /// Drop kernel caches for the byte range actually touched since open, as
    /// requested by `NO_CACHE`. No-op if the mode flag wasn't set.
    pub fn drop_caches(&mut self, sync: bool) -> Result<(), HandleError> {
        if !self.mode.contains(OpenMode::NO_CACHE) {
            return Ok(());
        }
        if sync {
            self.file.sync_all().map_err(|e| HandleError::from_io(&self.path, e))?;
        }
        if let Some((start, end)) = self.touched_range {
            let fd = self.file.as_raw_fd();
            let len = (end - start) as libc::off_t;
            unsafe {
                libc::posix_fadvise(fd, start as libc::off_t, len, libc::POSIX_FADV_DONTNEED);
            }
        }
        Ok(())
    }

    /// Close the handle, restoring atime if it was saved at open time.
    pub fn close(mut self) -> Result<(), HandleError> {
        self.drop_caches(true)?;
        if let Some((atime, mtime)) = self.pre_open_atime.take() {
            let times = [
                libc::timespec {
                    tv_sec: atime.tv_sec(),
                    tv_nsec: atime.tv_nsec(),
                },
                libc::timespec {
                    tv_sec: mtime.tv_sec(),
                    tv_nsec: mtime.tv_nsec(),
                },
            ];
            let fd = self.file.as_raw_fd();
            unsafe {
                libc::futimens(fd, times.as_ptr());
            }
        }
        Ok(())
    }

    fn note_touched(&mut self, start: u64, len: u64) {
        if len == 0 {
            return;
        }
        let end = start + len;
        self.touched_range = Some(match self.touched_range {
            Some((s, e)) => (s.min(start), e.max(end)),
            None => (start, end),
        });
    }
}

fn is_block_device(ft: &std::fs::FileType) -> bool {
    use std::os::unix::fs::FileTypeExt;
    ft.is_block_device()
}

fn is_fifo(ft: &std::fs::FileType) -> bool {
    use std::os::unix::fs::FileTypeExt;
    ft.is_fifo()
}

fn stat_atime(
    path: &Path,
) -> nix::Result<(nix::sys::time::TimeSpec, nix::sys::time::TimeSpec)> {
    let stat = nix::sys::stat::stat(path)?;
    let atime = nix::sys::time::TimeSpec::new(stat.st_atime, stat.st_atime_nsec);
    let mtime = nix::sys::time::TimeSpec::new(stat.st_mtime, stat.st_mtime_nsec);
    Ok((atime, mtime))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn round_trips_through_a_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        {
            let mut f = std::fs::File::create(&path).unwrap();
            f.write_all(b"hello world!").unwrap();
        }

        let mut handle =
            BufferedHandle::open(&path, OpenMode::READ, SizePolicy::BestEffort).unwrap();
        assert_eq!(handle.size(), Some(12));
        let mut buf = vec![0u8; 12];
        handle.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello world!");
        assert_eq!(handle.tell(), 12);
    }

    #[test]
    fn append_mode_starts_at_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("append.bin");
        std::fs::write(&path, b"abc").unwrap();

        let handle = BufferedHandle::open(
            &path,
            OpenMode::WRITE | OpenMode::APPEND,
            SizePolicy::BestEffort,
        )
        .unwrap();
        assert_eq!(handle.tell(), 3);
    }

    #[test]
    fn truncate_clamps_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trunc.bin");
        std::fs::write(&path, b"0123456789").unwrap();

        let mut handle = BufferedHandle::open(
            &path,
            OpenMode::READ | OpenMode::WRITE,
            SizePolicy::BestEffort,
        )
        .unwrap();
        handle.seek(8).unwrap();
        handle.truncate(4).unwrap();
        assert_eq!(handle.tell(), 4);
        assert_eq!(handle.size(), Some(4));
    }
}
