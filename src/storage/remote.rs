use std::sync::Arc;

use crate::handle::BufferedHandle;

use super::{ProgressCallback, Storage, StorageError, StorageUri};

/// The function table an embedding application implements to back a remote
/// object store (SFTP, WebDAV, S3, …). This crate ships no concrete remote
/// transport — remote protocol clients are out of scope — but still needs a
/// single extension point rather than a new `Storage` impl per protocol
/// wired through the whole engine. `RemoteTransport` is that one seam.
pub trait RemoteTransport: Send + Sync {
    fn put(
        &self,
        uri: &StorageUri,
        name: &str,
        source: &mut BufferedHandle,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<String, StorageError>;

    fn get(&self, uri: &StorageUri, name: &str) -> Result<BufferedHandle, StorageError>;

    fn list(&self, uri: &StorageUri, prefix: &str) -> Result<Vec<String>, StorageError>;

    fn delete(&self, uri: &StorageUri, name: &str) -> Result<(), StorageError>;

    fn mount(&self, uri: &StorageUri) -> Result<(), StorageError>;

    fn unmount(&self, uri: &StorageUri) -> Result<(), StorageError>;

    fn is_mounted(&self, uri: &StorageUri) -> Result<bool, StorageError>;
}

/// A [`Storage`] backed by an embedder-supplied [`RemoteTransport`]. This is
/// the one polymorphic-dispatch seam in the adapter set: everywhere else a
/// closed `enum`-like choice between concrete types would do, but a remote
/// transport's implementation genuinely lives outside this crate.
pub struct RemoteStorage {
    uri: StorageUri,
    transport: Arc<dyn RemoteTransport>,
}

impl RemoteStorage {
    pub fn new(uri: StorageUri, transport: Arc<dyn RemoteTransport>) -> Self {
        Self { uri, transport }
    }
}

impl Storage for RemoteStorage {
    fn put(
        &self,
        name: &str,
        source: &mut BufferedHandle,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<String, StorageError> {
        self.transport.put(&self.uri, name, source, progress)
    }

    fn get(&self, name: &str) -> Result<BufferedHandle, StorageError> {
        self.transport.get(&self.uri, name)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.transport.list(&self.uri, prefix)
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.transport.delete(&self.uri, name)
    }

    fn mount(&self) -> Result<(), StorageError> {
        self.transport.mount(&self.uri)
    }

    fn unmount(&self) -> Result<(), StorageError> {
        self.transport.unmount(&self.uri)
    }

    fn is_mounted(&self) -> Result<bool, StorageError> {
        self.transport.is_mounted(&self.uri)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// A fake transport recording calls, standing in for a real SFTP/S3/WebDAV
    /// client an embedder would supply.
    struct RecordingTransport {
        mounted: Mutex<bool>,
    }

    impl RemoteTransport for RecordingTransport {
        fn put(
            &self,
            _uri: &StorageUri,
            name: &str,
            _source: &mut BufferedHandle,
            _progress: Option<ProgressCallback<'_>>,
        ) -> Result<String, StorageError> {
            Ok(name.to_string())
        }

        fn get(&self, _uri: &StorageUri, _name: &str) -> Result<BufferedHandle, StorageError> {
            Err(StorageError::NotReachable("fake transport has no objects".into()))
        }

        fn list(&self, _uri: &StorageUri, _prefix: &str) -> Result<Vec<String>, StorageError> {
            Ok(Vec::new())
        }

        fn delete(&self, _uri: &StorageUri, _name: &str) -> Result<(), StorageError> {
            Ok(())
        }

        fn mount(&self, _uri: &StorageUri) -> Result<(), StorageError> {
            *self.mounted.lock().unwrap() = true;
            Ok(())
        }

        fn unmount(&self, _uri: &StorageUri) -> Result<(), StorageError> {
            *self.mounted.lock().unwrap() = false;
            Ok(())
        }

        fn is_mounted(&self, _uri: &StorageUri) -> Result<bool, StorageError> {
            Ok(*self.mounted.lock().unwrap())
        }
    }

    #[test]
    fn dispatches_through_the_transport_trait_object() {
        let transport = Arc::new(RecordingTransport {
            mounted: Mutex::new(false),
        });
        let uri = StorageUri::parse("s3://bucket/archives").unwrap();
        let storage = RemoteStorage::new(uri, transport);

        assert!(!storage.is_mounted().unwrap());
        storage.mount().unwrap();
        assert!(storage.is_mounted().unwrap());
        assert_eq!(storage.list("").unwrap(), Vec::<String>::new());
    }
}
