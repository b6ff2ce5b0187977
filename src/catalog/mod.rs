//! Index Catalog (C8): the relational schema mapping job/schedule UUIDs to
//! entities, storages and entries, plus history recording and filtered,
//! paged queries against all of them.
//!
//! The teacher keeps its own catalog data in flat encoded files
//! (`tape/file_formats/catalog_archive.rs`) rather than a database, so
//! there is no teacher module to generalize directly here. The concrete
//! implementation is grounded on `rusqlite` as the relational driver this
//! crate's dependency stack carries, with the schema and migrations owned
//! by this module and the driver's internals left untouched.

mod proxy;
mod schema;
mod sqlite;

pub use proxy::{CatalogRpc, ProxyCatalog};
pub use sqlite::SqliteCatalog;

use thiserror::Error;
use uuid::Uuid;

use crate::archive::EntryKind;
use crate::error::{Classify, ErrorClass};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("schema version {found} is newer than this build supports ({supported})")]
    SchemaMismatch { found: u32, supported: u32 },
    #[error("catalog busy: {0}")]
    Busy(String),
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),
    #[error("no row found for {0}")]
    NotFound(String),
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}

impl Classify for CatalogError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Index
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// A typed 64-bit identity: (entity kind tag, numeric id). `0` means NONE;
/// `-1` is a wildcard usable only inside a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexId {
    pub kind: IndexKind,
    pub value: i64,
}

impl IndexId {
    pub const fn new(kind: IndexKind, value: i64) -> Self {
        Self { kind, value }
    }

    pub fn none(kind: IndexKind) -> Self {
        Self { kind, value: 0 }
    }

    pub fn any(kind: IndexKind) -> Self {
        Self { kind, value: -1 }
    }

    pub fn is_none(self) -> bool {
        self.value == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Uuid,
    Entity,
    Storage,
    Entry,
    File,
    Image,
    Directory,
    Link,
    Hardlink,
    Special,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Running,
    Complete,
    Error,
}

impl EntityState {
    fn as_str(self) -> &'static str {
        match self {
            EntityState::Running => "RUNNING",
            EntityState::Complete => "COMPLETE",
            EntityState::Error => "ERROR",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "COMPLETE" => EntityState::Complete,
            "ERROR" => EntityState::Error,
            _ => EntityState::Running,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageState {
    Creating,
    Created,
    Transferring,
    Ok,
    Error,
}

impl StorageState {
    fn as_str(self) -> &'static str {
        match self {
            StorageState::Creating => "CREATING",
            StorageState::Created => "CREATED",
            StorageState::Transferring => "TRANSFERRING",
            StorageState::Ok => "OK",
            StorageState::Error => "ERROR",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "CREATED" => StorageState::Created,
            "TRANSFERRING" => StorageState::Transferring,
            "OK" => StorageState::Ok,
            "ERROR" => StorageState::Error,
            _ => StorageState::Creating,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntityRow {
    pub id: IndexId,
    pub uuid_id: IndexId,
    pub schedule_uuid: Option<Uuid>,
    pub entity_type: String,
    pub created: i64,
    pub state: EntityState,
}

#[derive(Debug, Clone)]
pub struct StorageRow {
    pub id: IndexId,
    pub entity_id: IndexId,
    pub name: String,
    pub size: u64,
    pub state: StorageState,
    pub error_message: Option<String>,
    pub created: i64,
}

#[derive(Debug, Clone)]
pub struct EntryRow {
    pub id: IndexId,
    pub entity_id: IndexId,
    pub kind: EntryKind,
    pub name: String,
    pub time_last_changed: i64,
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub mtime: i64,
    pub atime: i64,
    pub ctime: i64,
}

/// Prior state of an entry with the same name under the same job UUID,
/// consulted by the Entry Pipeline's incremental "unchanged since last
/// run" decision.
#[derive(Debug, Clone)]
pub struct PriorEntry {
    pub time_last_changed: i64,
    pub size: Option<u64>,
    pub checksum: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub id: IndexId,
    pub job_uuid: Uuid,
    pub schedule_uuid: Option<Uuid>,
    pub host_name: String,
    pub user_name: String,
    pub history_type: String,
    pub created: i64,
    pub error_message: Option<String>,
    pub duration_secs: u64,
    pub total_entry_count: u64,
    pub total_entry_size: u64,
    pub skipped_entry_count: u64,
    pub skipped_entry_size: u64,
    pub error_entry_count: u64,
    pub error_entry_size: u64,
}

/// One data-block's position within its entry, recorded for dedup/restore
/// granularity.
#[derive(Debug, Clone, Copy)]
pub struct Fragment {
    pub offset: u64,
    pub length: u64,
}

#[derive(Debug, Clone)]
pub struct FileAttributes {
    pub size: u64,
    pub checksum: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct ImageAttributes {
    pub size: u64,
    pub block_size: u32,
}

#[derive(Debug, Clone)]
pub struct SpecialAttributes {
    pub special_type: String,
    pub device_major: Option<u32>,
    pub device_minor: Option<u32>,
}

/// A single typed predicate. A [`Query`] ANDs together whichever of these
/// the caller supplies.
#[derive(Debug, Clone)]
pub enum Filter {
    IdEquals(IndexId),
    UuidEquals(Uuid),
    TimestampRange {
        column: &'static str,
        from: Option<i64>,
        to: Option<i64>,
    },
    NamePattern(String),
}

#[derive(Debug, Clone, Copy)]
pub struct Order {
    pub column: &'static str,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub offset: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub page: Option<Page>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, f: Filter) -> Self {
        self.filters.push(f);
        self
    }

    pub fn order_by(mut self, column: &'static str, descending: bool) -> Self {
        self.order = Some(Order { column, descending });
        self
    }

    pub fn paged(mut self, offset: u32, limit: u32) -> Self {
        self.page = Some(Page { offset, limit });
        self
    }
}

/// The catalog's full surface. Every mutation is executed inside a
/// transaction by the implementation; there is no partially-applied write.
pub trait Catalog: Send + Sync {
    fn new_uuid(&self, job_uuid: Uuid) -> Result<IndexId>;
    fn new_entity(
        &self,
        uuid_id: IndexId,
        schedule_uuid: Option<Uuid>,
        entity_type: &str,
        created: i64,
    ) -> Result<IndexId>;
    fn set_entity_state(&self, id: IndexId, state: EntityState) -> Result<()>;

    fn new_storage(&self, entity_id: IndexId, name: &str) -> Result<IndexId>;
    fn update_storage_state(
        &self,
        id: IndexId,
        state: StorageState,
        error_message: Option<&str>,
    ) -> Result<()>;

    fn add_file_entry(
        &self,
        storage_id: IndexId,
        name: &str,
        entry: &EntryAttrs,
        fragments: &[Fragment],
        file: &FileAttributes,
    ) -> Result<IndexId>;
    fn add_image_entry(
        &self,
        storage_id: IndexId,
        name: &str,
        entry: &EntryAttrs,
        image: &ImageAttributes,
    ) -> Result<IndexId>;
    fn add_directory_entry(&self, storage_id: IndexId, name: &str, entry: &EntryAttrs) -> Result<IndexId>;
    fn add_link_entry(&self, storage_id: IndexId, name: &str, entry: &EntryAttrs, target: &str) -> Result<IndexId>;
    fn add_hardlink_entry(
        &self,
        storage_id: IndexId,
        name: &str,
        entry: &EntryAttrs,
        target_name: &str,
    ) -> Result<IndexId>;
    fn add_special_entry(
        &self,
        storage_id: IndexId,
        name: &str,
        entry: &EntryAttrs,
        special: &SpecialAttributes,
    ) -> Result<IndexId>;

    fn lookup_prior_entry(&self, uuid_id: IndexId, name: &str) -> Result<Option<PriorEntry>>;

    fn delete_storage(&self, id: IndexId) -> Result<()>;

    fn list_entities(&self, query: &Query) -> Result<Vec<EntityRow>>;
    fn list_storages(&self, query: &Query) -> Result<Vec<StorageRow>>;
    fn list_entries(&self, query: &Query) -> Result<Vec<EntryRow>>;

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
    fn list_history(&self, query: &Query) -> Result<Vec<HistoryRow>>;
    fn delete_history(&self, id: IndexId) -> Result<()>;
}

/// The shared attributes every entry kind carries, independent of its
/// type-specific child row.
#[derive(Debug, Clone)]
pub struct EntryAttrs {
    pub time_last_changed: i64,
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub mtime: i64,
    pub atime: i64,
    pub ctime: i64,
}
