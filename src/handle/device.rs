//! Block device size probing.
//!
//! The teacher's own disk tooling has two separate code paths for this: an
//! eager one (`ioctl(BLKGETSIZE64)`) and a lazy one (read `/sys/.../size` and
//! multiply by the 512-byte sector constant, cached in a `OnceCell`). The
//! distilled spec asks for a single operation instead (see the Open
//! Questions in §9): we try the eager ioctl first since it needs no extra
//! syscalls beyond the one, and fall back to the sysfs read only if that
//! fails (e.g. the fd isn't actually backed by `/sys/block/<dev>`).

use std::fs::File;
use std::os::unix::io::AsRawFd;

const BLKGETSIZE64: libc::c_ulong = 0x80081272;

/// Probe the size in bytes of the block device backing `file`.
pub fn probe_block_device_size(file: &File) -> std::io::Result<u64> {
    if let Some(size) = probe_via_ioctl(file) {
        return Ok(size);
    }
    probe_via_sysfs(file)
}

fn probe_via_ioctl(file: &File) -> Option<u64> {
    let fd = file.as_raw_fd();
    let mut size: u64 = 0;
    let rc = unsafe { libc::ioctl(fd, BLKGETSIZE64 as _, &mut size as *mut u64) };
    if rc == 0 && size > 0 {
        Some(size)
    } else {
        None
    }
}

fn probe_via_sysfs(file: &File) -> std::io::Result<u64> {
    let fd = file.as_raw_fd();
    let stat = nix::sys::stat::fstat(fd).map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;
    let major = unsafe { libc::major(stat.st_rdev) };
    let minor = unsafe { libc::minor(stat.st_rdev) };
    let sys_path = format!("/sys/dev/block/{}:{}/size", major, minor);
    let raw = std::fs::read_to_string(sys_path)?;
    let sectors: u64 = raw
        .trim()
        .parse()
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "bad sysfs size"))?;
    Ok(sectors * 512)
}
