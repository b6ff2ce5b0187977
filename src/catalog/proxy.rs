//! Master/proxy dispatch: when a remote "master" catalog is configured,
//! write operations are forwarded to it as structured calls instead of
//! being executed against the local database, which then acts purely as a
//! read cache. The dispatch decision is made per call, not per instance.

use uuid::Uuid;

use super::{
    Catalog, EntityState, EntryAttrs, EntryRow, FileAttributes, Fragment, HistoryRow, ImageAttributes, IndexId,
    PriorEntry, Query, Result, SpecialAttributes, StorageRow, StorageState,
};

/// The write surface a remote master catalog exposes over whatever RPC
/// transport an embedder wires up (gRPC, a REST client, an in-process
/// channel to another thread). Read operations are never forwarded: a
/// [`ProxyCatalog`] always answers reads from its own local copy.
pub trait CatalogRpc: Send + Sync {
    fn new_uuid(&self, job_uuid: Uuid) -> Result<IndexId>;
    fn new_entity(&self, uuid_id: IndexId, schedule_uuid: Option<Uuid>, entity_type: &str, created: i64) -> Result<IndexId>;
    fn set_entity_state(&self, id: IndexId, state: EntityState) -> Result<()>;
    fn new_storage(&self, entity_id: IndexId, name: &str) -> Result<IndexId>;
    fn update_storage_state(&self, id: IndexId, state: StorageState, error_message: Option<&str>) -> Result<()>;
    fn delete_storage(&self, id: IndexId) -> Result<()>;
    #[allow(clippy::too_many_arguments)]
    fn new_history(
        &self,
        job_uuid: Uuid,
        schedule_uuid: Option<Uuid>,
        host_name: &str,
        user_name: &str,
        history_type: &str,
        created: i64,
        error_message: Option<&str>,
        duration_secs: u64,
        total_entry_count: u64,
        total_entry_size: u64,
        skipped_entry_count: u64,
        skipped_entry_size: u64,
        error_entry_count: u64,
        error_entry_size: u64,
    ) -> Result<IndexId>;
    fn delete_history(&self, id: IndexId) -> Result<()>;
}

/// Wraps a local [`Catalog`] and, when a master is configured, forwards
/// mutations to it via [`CatalogRpc`] instead of applying them locally.
/// Entry insertion (`add_*_entry`) always stays local: those calls are
/// driven by the Entry Pipeline streaming bytes through a locally-held
/// archive writer, not something a remote master could usefully intercept
/// mid-stream.
pub struct ProxyCatalog<C: Catalog> {
    local: C,
    master: Option<Box<dyn CatalogRpc>>,
}

impl<C: Catalog> ProxyCatalog<C> {
    pub fn local(local: C) -> Self {
        Self { local, master: None }
    }

    pub fn with_master(local: C, master: Box<dyn CatalogRpc>) -> Self {
        Self {
            local,
            master: Some(master),
        }
    }
}

impl<C: Catalog> Catalog for ProxyCatalog<C> {
    fn new_uuid(&self, job_uuid: Uuid) -> Result<IndexId> {
        match &self.master {
            Some(master) => master.new_uuid(job_uuid),
            None => self.local.new_uuid(job_uuid),
        }
    }

    fn new_entity(
        &self,
        uuid_id: IndexId,
        schedule_uuid: Option<Uuid>,
        entity_type: &str,
        created: i64,
    ) -> Result<IndexId> {
        match &self.master {
            Some(master) => master.new_entity(uuid_id, schedule_uuid, entity_type, created),
            None => self.local.new_entity(uuid_id, schedule_uuid, entity_type, created),
        }
    }

    fn set_entity_state(&self, id: IndexId, state: EntityState) -> Result<()> {
        match &self.master {
            Some(master) => master.set_entity_state(id, state),
            None => self.local.set_entity_state(id, state),
        }
    }

    fn new_storage(&self, entity_id: IndexId, name: &str) -> Result<IndexId> {
        match &self.master {
            Some(master) => master.new_storage(entity_id, name),
            None => self.local.new_storage(entity_id, name),
        }
    }

    fn update_storage_state(&self, id: IndexId, state: StorageState, error_message: Option<&str>) -> Result<()> {
        match &self.master {
            Some(master) => master.update_storage_state(id, state, error_message),
            None => self.local.update_storage_state(id, state, error_message),
        }
    }

    fn add_file_entry(
        &self,
        storage_id: IndexId,
        name: &str,
        entry: &EntryAttrs,
        fragments: &[Fragment],
        file: &FileAttributes,
    ) -> Result<IndexId> {
        self.local.add_file_entry(storage_id, name, entry, fragments, file)
    }

    fn add_image_entry(
        &self,
        storage_id: IndexId,
        name: &str,
        entry: &EntryAttrs,
        image: &ImageAttributes,
    ) -> Result<IndexId> {
        self.local.add_image_entry(storage_id, name, entry, image)
    }

    fn add_directory_entry(&self, storage_id: IndexId, name: &str, entry: &EntryAttrs) -> Result<IndexId> {
        self.local.add_directory_entry(storage_id, name, entry)
    }

    fn add_link_entry(&self, storage_id: IndexId, name: &str, entry: &EntryAttrs, target: &str) -> Result<IndexId> {
        self.local.add_link_entry(storage_id, name, entry, target)
    }

    fn add_hardlink_entry(
        &self,
        storage_id: IndexId,
        name: &str,
        entry: &EntryAttrs,
        target_name: &str,
    ) -> Result<IndexId> {
        self.local.add_hardlink_entry(storage_id, name, entry, target_name)
    }

    fn add_special_entry(
        &self,
        storage_id: IndexId,
        name: &str,
        entry: &EntryAttrs,
        special: &SpecialAttributes,
    ) -> Result<IndexId> {
        self.local.add_special_entry(storage_id, name, entry, special)
    }

    fn lookup_prior_entry(&self, uuid_id: IndexId, name: &str) -> Result<Option<PriorEntry>> {
        self.local.lookup_prior_entry(uuid_id, name)
    }

    fn delete_storage(&self, id: IndexId) -> Result<()> {
        match &self.master {
            Some(master) => master.delete_storage(id),
            None => self.local.delete_storage(id),
        }
    }

    fn list_entities(&self, query: &Query) -> Result<Vec<EntityRow>> {
        self.local.list_entities(query)
    }

    fn list_storages(&self, query: &Query) -> Result<Vec<StorageRow>> {
        self.local.list_storages(query)
    }

    fn list_entries(&self, query: &Query) -> Result<Vec<EntryRow>> {
        self.local.list_entries(query)
    }

    #[allow(clippy::too_many_arguments)]
    fn new_history(
        &self,
        job_uuid: Uuid,
        schedule_uuid: Option<Uuid>,
        host_name: &str,
        user_name: &str,
        history_type: &str,
        created: i64,
        error_message: Option<&str>,
        duration_secs: u64,
        total_entry_count: u64,
        total_entry_size: u64,
        skipped_entry_count: u64,
        skipped_entry_size: u64,
        error_entry_count: u64,
        error_entry_size: u64,
    ) -> Result<IndexId> {
        match &self.master {
            Some(master) => master.new_history(
                job_uuid,
                schedule_uuid,
                host_name,
                user_name,
                history_type,
                created,
                error_message,
                duration_secs,
                total_entry_count,
                total_entry_size,
                skipped_entry_count,
                skipped_entry_size,
                error_entry_count,
                error_entry_size,
            ),
            None => self.local.new_history(
                job_uuid,
                schedule_uuid,
                host_name,
                user_name,
                history_type,
                created,
                error_message,
                duration_secs,
                total_entry_count,
                total_entry_size,
                skipped_entry_count,
                skipped_entry_size,
                error_entry_count,
                error_entry_size,
            ),
        }
    }

    fn list_history(&self, query: &Query) -> Result<Vec<HistoryRow>> {
        self.local.list_history(query)
    }

    fn delete_history(&self, id: IndexId) -> Result<()> {
        match &self.master {
            Some(master) => master.delete_history(id),
            None => self.local.delete_history(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::catalog::SqliteCatalog;

    struct RecordingMaster {
        uuids_created: Mutex<Vec<Uuid>>,
    }

    impl CatalogRpc for RecordingMaster {
        fn new_uuid(&self, job_uuid: Uuid) -> Result<IndexId> {
            self.uuids_created.lock().unwrap().push(job_uuid);
            Ok(IndexId::new(super::super::IndexKind::Uuid, 1))
        }
        fn new_entity(&self, _: IndexId, _: Option<Uuid>, _: &str, _: i64) -> Result<IndexId> {
            Ok(IndexId::new(super::super::IndexKind::Entity, 1))
        }
        fn set_entity_state(&self, _: IndexId, _: EntityState) -> Result<()> {
            Ok(())
        }
        fn new_storage(&self, _: IndexId, _: &str) -> Result<IndexId> {
            Ok(IndexId::new(super::super::IndexKind::Storage, 1))
        }
        fn update_storage_state(&self, _: IndexId, _: StorageState, _: Option<&str>) -> Result<()> {
            Ok(())
        }
        fn delete_storage(&self, _: IndexId) -> Result<()> {
            Ok(())
        }
        fn new_history(
            &self,
            _: Uuid,
            _: Option<Uuid>,
            _: &str,
            _: &str,
            _: &str,
            _: i64,
            _: Option<&str>,
            _: u64,
            _: u64,
            _: u64,
            _: u64,
            _: u64,
            _: u64,
            _: u64,
        ) -> Result<IndexId> {
            Ok(IndexId::new(super::super::IndexKind::History, 1))
        }
        fn delete_history(&self, _: IndexId) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn with_master_forwards_writes_instead_of_applying_locally() {
        let local = SqliteCatalog::in_memory().unwrap();
        let master = RecordingMaster {
            uuids_created: Mutex::new(Vec::new()),
        };
        let proxy = ProxyCatalog::with_master(local, Box::new(master));

        let job_uuid = Uuid::new_v4();
        proxy.new_uuid(job_uuid).unwrap();

        // The local catalog never saw the write: forwarded to the master instead.
        let rows = proxy
            .local
            .list_entities(&Query::new())
            .unwrap();
        assert!(rows.is_empty());
    }
}
