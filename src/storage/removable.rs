use std::path::PathBuf;

use log::info;

use crate::handle::BufferedHandle;

use super::{run_command, LocalStorage, ProgressCallback, Storage, StorageError};

/// Removable media (external disk, tape-adjacent USB vault) mounted at a
/// fixed mountpoint via a configured command template before use and
/// unmounted after. Delegates actual file operations to a [`LocalStorage`]
/// rooted at the mountpoint once mounted.
///
/// Command templates use `{mountpoint}` as their only substitution, mirroring
/// the teacher's convention of shelling out to `mount`/`umount`/`blkid`
/// rather than reimplementing mount(2) semantics.
pub struct RemovableStorage {
    mountpoint: PathBuf,
    mount_command: String,
    unmount_command: String,
    inner: LocalStorage,
}

impl RemovableStorage {
    pub fn new(
        mountpoint: impl Into<PathBuf>,
        mount_command: impl Into<String>,
        unmount_command: impl Into<String>,
    ) -> Self {
        let mountpoint = mountpoint.into();
        Self {
            inner: LocalStorage::new(mountpoint.clone()),
            mountpoint,
            mount_command: mount_command.into(),
            unmount_command: unmount_command.into(),
        }
    }

    fn build_command(&self, template: &str) -> std::process::Command {
        let expanded = template.replace("{mountpoint}", &self.mountpoint.to_string_lossy());
        let mut parts = expanded.split_whitespace();
        let program = parts.next().unwrap_or_default();
        let mut command = std::process::Command::new(program);
        command.args(parts);
        command
    }

    fn require_mounted(&self) -> Result<(), StorageError> {
        if self.is_mounted()? {
            Ok(())
        } else {
            Err(StorageError::NotMounted(
                self.mountpoint.to_string_lossy().into_owned(),
            ))
        }
    }
}

impl Storage for RemovableStorage {
    fn put(
        &self,
        name: &str,
        source: &mut BufferedHandle,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<String, StorageError> {
        self.require_mounted()?;
        self.inner.put(name, source, progress)
    }

    fn get(&self, name: &str) -> Result<BufferedHandle, StorageError> {
        self.require_mounted()?;
        self.inner.get(name)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.require_mounted()?;
        self.inner.list(prefix)
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.require_mounted()?;
        self.inner.delete(name)
    }

    fn mount(&self) -> Result<(), StorageError> {
        if self.is_mounted()? {
            return Ok(());
        }
        run_command(self.build_command(&self.mount_command))?;
        info!("mounted removable storage at {}", self.mountpoint.display());
        Ok(())
    }

    fn unmount(&self) -> Result<(), StorageError> {
        if !self.is_mounted()? {
            return Ok(());
        }
        run_command(self.build_command(&self.unmount_command))?;
        info!("unmounted removable storage at {}", self.mountpoint.display());
        Ok(())
    }

    fn is_mounted(&self) -> Result<bool, StorageError> {
        // A mountpoint's device id differs from its parent's once something
        // is mounted there; an un-mounted mountpoint directory shares its
        // parent's device id.
        let mountpoint_dev = device_id(&self.mountpoint)?;
        let parent = self
            .mountpoint
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("/"));
        let parent_dev = device_id(&parent)?;
        Ok(mountpoint_dev != parent_dev)
    }
}

fn device_id(path: &std::path::Path) -> Result<u64, StorageError> {
    use std::os::unix::fs::MetadataExt;
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.dev()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmounted_mountpoint_shares_parents_device_id() {
        let dir = tempfile::tempdir().unwrap();
        let mountpoint = dir.path().join("vault");
        std::fs::create_dir_all(&mountpoint).unwrap();
        let storage = RemovableStorage::new(&mountpoint, "true".to_string(), "true".to_string());
        assert!(!storage.is_mounted().unwrap());
    }

    #[test]
    fn operations_fail_with_not_mounted_before_mount_is_called() {
        let dir = tempfile::tempdir().unwrap();
        let mountpoint = dir.path().join("vault");
        std::fs::create_dir_all(&mountpoint).unwrap();
        let storage = RemovableStorage::new(&mountpoint, "true".to_string(), "true".to_string());

        let result = storage.list("");
        assert!(matches!(result, Err(StorageError::NotMounted(_))));
    }
}
