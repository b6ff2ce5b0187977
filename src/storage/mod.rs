//! Storage Adapter (C5): where archive volumes actually live.
//!
//! Grounded on the teacher's `DataStore`/disk-tooling split: concrete local
//! and removable-media adapters live here directly (no network stack in
//! this dependency set), while remote transports are an embedder-supplied
//! `Arc<dyn RemoteTransport>` — the "one external variant" pattern the
//! distilled spec calls for instead of deep inheritance.

mod local;
mod removable;
mod remote;
mod uri;
pub mod volume;

pub use local::LocalStorage;
pub use removable::RemovableStorage;
pub use remote::{RemoteStorage, RemoteTransport};
pub use uri::StorageUri;

use thiserror::Error;

use crate::error::{Classify, ErrorClass};
use crate::handle::HandleError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage not reachable: {0}")]
    NotReachable(String),
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("quota exceeded: {0}")]
    Quota(String),
    #[error("storage not mounted: {0}")]
    NotMounted(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Handle(#[from] HandleError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Classify for StorageError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Storage
    }
}

/// Callback invoked with cumulative bytes transferred after each write
/// during [`Storage::put`].
pub type ProgressCallback<'a> = &'a mut dyn FnMut(u64);

/// A place archive volumes (and nothing else) can be stored.
///
/// Every method blocks the calling worker thread; there is no async
/// variant, matching the crate's synchronous concurrency model.
pub trait Storage: Send + Sync {
    /// Store `source`'s remaining bytes under `name`, returning the storage
    /// object id it was recorded under (usually `name` itself).
    ///
    /// Resumable: if an object named `name` already exists and its bytes
    /// are a prefix of `source`'s content, the copy resumes past that
    /// prefix instead of starting over.
    fn put(
        &self,
        name: &str,
        source: &mut crate::handle::BufferedHandle,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<String, StorageError>;

    fn get(&self, name: &str) -> Result<crate::handle::BufferedHandle, StorageError>;

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    fn delete(&self, name: &str) -> Result<(), StorageError>;

    fn mount(&self) -> Result<(), StorageError>;

    fn unmount(&self) -> Result<(), StorageError>;

    fn is_mounted(&self) -> Result<bool, StorageError>;
}

/// Run an external command to completion, mapping a non-zero exit or spawn
/// failure into [`StorageError::NotReachable`]. Mirrors the teacher's
/// `run_command` convention of capturing stderr for the error message
/// rather than letting it print to the child's inherited stderr.
pub(crate) fn run_command(mut command: std::process::Command) -> Result<(), StorageError> {
    let output = command
        .output()
        .map_err(|e| StorageError::NotReachable(format!("{:?}: {}", command, e)))?;
    if !output.status.success() {
        return Err(StorageError::NotReachable(format!(
            "{:?} failed: {}",
            command,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}
