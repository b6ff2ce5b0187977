//! The concrete default [`super::Catalog`]: a single SQLite database file
//! accessed through `rusqlite`, one writer at a time.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::archive::EntryKind;

use super::{
    schema, Catalog, EntityRow, EntityState, EntryAttrs, EntryRow, FileAttributes, Filter, Fragment, HistoryRow,
    ImageAttributes, IndexId, IndexKind, Order, PriorEntry, Query, Result, SpecialAttributes, StorageRow,
    StorageState,
};

pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        schema::open_and_migrate(&mut conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        schema::open_and_migrate(&mut conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn entry_kind_str(kind: EntryKind) -> &'static str {
        match kind {
            EntryKind::Regular => "file",
            EntryKind::Image => "image",
            EntryKind::Directory => "directory",
            EntryKind::Link => "link",
            EntryKind::Hardlink => "hardlink",
            EntryKind::Special => "special",
        }
    }

    fn entry_kind_from_str(s: &str) -> EntryKind {
        match s {
            "image" => EntryKind::Image,
            "directory" => EntryKind::Directory,
            "link" => EntryKind::Link,
            "hardlink" => EntryKind::Hardlink,
            "special" => EntryKind::Special,
            _ => EntryKind::Regular,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_entry_row(
        conn: &Connection,
        storage_id: IndexId,
        entity_id: IndexId,
        kind: EntryKind,
        name: &str,
        entry: &EntryAttrs,
    ) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO entries
                (storage_id, entity_id, type, name, time_last_changed, uid, gid, mode, mtime, atime, ctime)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                storage_id.value,
                entity_id.value,
                Self::entry_kind_str(kind),
                name,
                entry.time_last_changed,
                entry.uid,
                entry.gid,
                entry.mode,
                entry.mtime,
                entry.atime,
                entry.ctime,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn storage_entity_id(conn: &Connection, storage_id: IndexId) -> rusqlite::Result<i64> {
        conn.query_row(
            "SELECT entity_id FROM storages WHERE id = ?1",
            [storage_id.value],
            |row| row.get(0),
        )
    }

    fn build_where(filters: &[Filter], id_column: &str, uuid_join_column: Option<&str>) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut clauses = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        for filter in filters {
            match filter {
                Filter::IdEquals(id) => {
                    if id.value != -1 {
                        clauses.push(format!("{} = ?", id_column));
                        values.push(Box::new(id.value));
                    }
                }
                Filter::UuidEquals(uuid) => {
                    if let Some(column) = uuid_join_column {
                        clauses.push(format!("{} = ?", column));
                        values.push(Box::new(uuid.to_string()));
                    }
                }
                Filter::TimestampRange { column, from, to } => {
                    if let Some(from) = from {
                        clauses.push(format!("{} >= ?", column));
                        values.push(Box::new(*from));
                    }
                    if let Some(to) = to {
                        clauses.push(format!("{} <= ?", column));
                        values.push(Box::new(*to));
                    }
                }
                Filter::NamePattern(pattern) => {
                    clauses.push("name LIKE ?".to_string());
                    values.push(Box::new(pattern.clone()));
                }
            }
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        (where_sql, values)
    }

    fn order_and_page_sql(order: Option<Order>, page: Option<super::Page>) -> String {
        let mut sql = String::new();
        if let Some(order) = order {
            sql.push_str(&format!(
                " ORDER BY {} {}",
                order.column,
                if order.descending { "DESC" } else { "ASC" }
            ));
        }
        if let Some(page) = page {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", page.limit, page.offset));
        }
        sql
    }
}

impl Catalog for SqliteCatalog {
    fn new_uuid(&self, job_uuid: Uuid) -> Result<IndexId> {
        let conn = self.conn.lock().unwrap();
        let text = job_uuid.to_string();
        conn.execute(
            "INSERT INTO uuids (job_uuid) VALUES (?1) ON CONFLICT(job_uuid) DO NOTHING",
            [&text],
        )?;
        let id: i64 = conn.query_row("SELECT id FROM uuids WHERE job_uuid = ?1", [&text], |row| row.get(0))?;
        Ok(IndexId::new(IndexKind::Uuid, id))
    }

    fn new_entity(
        &self,
        uuid_id: IndexId,
        schedule_uuid: Option<Uuid>,
        entity_type: &str,
        created: i64,
    ) -> Result<IndexId> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO entities (uuid_id, schedule_uuid, type, created_date_time, state)
             VALUES (?1, ?2, ?3, ?4, 'RUNNING')",
            params![uuid_id.value, schedule_uuid.map(|u| u.to_string()), entity_type, created],
        )?;
        Ok(IndexId::new(IndexKind::Entity, conn.last_insert_rowid()))
    }

    fn set_entity_state(&self, id: IndexId, state: EntityState) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE entities SET state = ?1 WHERE id = ?2",
            params![state.as_str(), id.value],
        )?;
        Ok(())
    }

    fn new_storage(&self, entity_id: IndexId, name: &str) -> Result<IndexId> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO storages (entity_id, name, size, state, created) VALUES (?1, ?2, 0, 'CREATING', ?3)",
            params![entity_id.value, name, chrono::Utc::now().timestamp()],
        )?;
        Ok(IndexId::new(IndexKind::Storage, conn.last_insert_rowid()))
    }

    fn update_storage_state(&self, id: IndexId, state: StorageState, error_message: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE storages SET state = ?1, error_message = ?2 WHERE id = ?3",
            params![state.as_str(), error_message, id.value],
        )?;
        Ok(())
    }

    fn add_file_entry(
        &self,
        storage_id: IndexId,
        name: &str,
        entry: &EntryAttrs,
        fragments: &[Fragment],
        file: &FileAttributes,
    ) -> Result<IndexId> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let entity_id = Self::storage_entity_id(&tx, storage_id)?;
        let entry_id = Self::insert_entry_row(
            &tx,
            storage_id,
            IndexId::new(IndexKind::Entity, entity_id),
            EntryKind::Regular,
            name,
            entry,
        )?;
        tx.execute(
            "INSERT INTO file_entries (entry_id, size, checksum) VALUES (?1, ?2, ?3)",
            params![entry_id, file.size, file.checksum],
        )?;
        for fragment in fragments {
            tx.execute(
                "INSERT INTO entry_fragments (entry_id, offset, length) VALUES (?1, ?2, ?3)",
                params![entry_id, fragment.offset, fragment.length],
            )?;
        }
        tx.commit()?;
        Ok(IndexId::new(IndexKind::File, entry_id))
    }

    fn add_image_entry(
        &self,
        storage_id: IndexId,
        name: &str,
        entry: &EntryAttrs,
        image: &ImageAttributes,
    ) -> Result<IndexId> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let entity_id = Self::storage_entity_id(&tx, storage_id)?;
        let entry_id = Self::insert_entry_row(
            &tx,
            storage_id,
            IndexId::new(IndexKind::Entity, entity_id),
            EntryKind::Image,
            name,
            entry,
        )?;
        tx.execute(
            "INSERT INTO image_entries (entry_id, size, block_size) VALUES (?1, ?2, ?3)",
            params![entry_id, image.size, image.block_size],
        )?;
        tx.commit()?;
        Ok(IndexId::new(IndexKind::Image, entry_id))
    }

    fn add_directory_entry(&self, storage_id: IndexId, name: &str, entry: &EntryAttrs) -> Result<IndexId> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let entity_id = Self::storage_entity_id(&tx, storage_id)?;
        let entry_id = Self::insert_entry_row(
            &tx,
            storage_id,
            IndexId::new(IndexKind::Entity, entity_id),
            EntryKind::Directory,
            name,
            entry,
        )?;
        tx.execute("INSERT INTO directory_entries (entry_id) VALUES (?1)", [entry_id])?;
        tx.commit()?;
        Ok(IndexId::new(IndexKind::Directory, entry_id))
    }

    fn add_link_entry(&self, storage_id: IndexId, name: &str, entry: &EntryAttrs, target: &str) -> Result<IndexId> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let entity_id = Self::storage_entity_id(&tx, storage_id)?;
        let entry_id = Self::insert_entry_row(
            &tx,
            storage_id,
            IndexId::new(IndexKind::Entity, entity_id),
            EntryKind::Link,
            name,
            entry,
        )?;
        tx.execute(
            "INSERT INTO link_entries (entry_id, target) VALUES (?1, ?2)",
            params![entry_id, target],
        )?;
        tx.commit()?;
        Ok(IndexId::new(IndexKind::Link, entry_id))
    }

    fn add_hardlink_entry(
        &self,
        storage_id: IndexId,
        name: &str,
        entry: &EntryAttrs,
        target_name: &str,
    ) -> Result<IndexId> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let entity_id = Self::storage_entity_id(&tx, storage_id)?;
        let entry_id = Self::insert_entry_row(
            &tx,
            storage_id,
            IndexId::new(IndexKind::Entity, entity_id),
            EntryKind::Hardlink,
            name,
            entry,
        )?;
        tx.execute(
            "INSERT INTO hardlink_entries (entry_id, target_name) VALUES (?1, ?2)",
            params![entry_id, target_name],
        )?;
        tx.commit()?;
        Ok(IndexId::new(IndexKind::Hardlink, entry_id))
    }

    fn add_special_entry(
        &self,
        storage_id: IndexId,
        name: &str,
        entry: &EntryAttrs,
        special: &SpecialAttributes,
    ) -> Result<IndexId> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let entity_id = Self::storage_entity_id(&tx, storage_id)?;
        let entry_id = Self::insert_entry_row(
            &tx,
            storage_id,
            IndexId::new(IndexKind::Entity, entity_id),
            EntryKind::Special,
            name,
            entry,
        )?;
        tx.execute(
            "INSERT INTO special_entries (entry_id, special_type, device_major, device_minor) VALUES (?1, ?2, ?3, ?4)",
            params![entry_id, special.special_type, special.device_major, special.device_minor],
        )?;
        tx.commit()?;
        Ok(IndexId::new(IndexKind::Special, entry_id))
    }

    fn lookup_prior_entry(&self, uuid_id: IndexId, name: &str) -> Result<Option<PriorEntry>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT e.id, e.time_last_changed, f.size, f.checksum
                 FROM entries e
                 JOIN entities ent ON ent.id = e.entity_id
                 LEFT JOIN file_entries f ON f.entry_id = e.id
                 WHERE ent.uuid_id = ?1 AND e.name = ?2
                 ORDER BY ent.created_date_time DESC
                 LIMIT 1",
                params![uuid_id.value, name],
                |row| {
                    Ok(PriorEntry {
                        time_last_changed: row.get(1)?,
                        size: row.get::<_, Option<i64>>(2)?.map(|v| v as u64),
                        checksum: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn delete_storage(&self, id: IndexId) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let entry_ids: Vec<i64> = {
            let mut stmt = tx.prepare("SELECT id FROM entries WHERE storage_id = ?1")?;
            let rows = stmt.query_map([id.value], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };
        for entry_id in &entry_ids {
            tx.execute("DELETE FROM entry_fragments WHERE entry_id = ?1", [entry_id])?;
            tx.execute("DELETE FROM file_entries WHERE entry_id = ?1", [entry_id])?;
            tx.execute("DELETE FROM image_entries WHERE entry_id = ?1", [entry_id])?;
            tx.execute("DELETE FROM directory_entries WHERE entry_id = ?1", [entry_id])?;
            tx.execute("DELETE FROM link_entries WHERE entry_id = ?1", [entry_id])?;
            tx.execute("DELETE FROM hardlink_entries WHERE entry_id = ?1", [entry_id])?;
            tx.execute("DELETE FROM special_entries WHERE entry_id = ?1", [entry_id])?;
        }
        tx.execute("DELETE FROM entries WHERE storage_id = ?1", [id.value])?;
        let affected = tx.execute("DELETE FROM storages WHERE id = ?1", [id.value])?;
        if affected == 0 {
            return Err(super::CatalogError::NotFound(format!("storage {}", id.value)));
        }
        tx.commit()?;
        Ok(())
    }

    fn list_entities(&self, query: &Query) -> Result<Vec<EntityRow>> {
        let conn = self.conn.lock().unwrap();
        let (where_sql, values) = Self::build_where(&query.filters, "id", Some("uuid_id"));
        let sql = format!(
            "SELECT id, uuid_id, schedule_uuid, type, created_date_time, state FROM entities{}{}",
            where_sql,
            Self::order_and_page_sql(query.order, query.page)
        );
        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), |row| {
            Ok(EntityRow {
                id: IndexId::new(IndexKind::Entity, row.get(0)?),
                uuid_id: IndexId::new(IndexKind::Uuid, row.get(1)?),
                schedule_uuid: row
                    .get::<_, Option<String>>(2)?
                    .and_then(|s| Uuid::parse_str(&s).ok()),
                entity_type: row.get(3)?,
                created: row.get(4)?,
                state: EntityState::from_str(&row.get::<_, String>(5)?),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn list_storages(&self, query: &Query) -> Result<Vec<StorageRow>> {
        let conn = self.conn.lock().unwrap();
        let (where_sql, values) = Self::build_where(&query.filters, "id", None);
        let sql = format!(
            "SELECT id, entity_id, name, size, state, error_message, created FROM storages{}{}",
            where_sql,
            Self::order_and_page_sql(query.order, query.page)
        );
        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), |row| {
            Ok(StorageRow {
                id: IndexId::new(IndexKind::Storage, row.get(0)?),
                entity_id: IndexId::new(IndexKind::Entity, row.get(1)?),
                name: row.get(2)?,
                size: row.get::<_, i64>(3)? as u64,
                state: StorageState::from_str(&row.get::<_, String>(4)?),
                error_message: row.get(5)?,
                created: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn list_entries(&self, query: &Query) -> Result<Vec<EntryRow>> {
        let conn = self.conn.lock().unwrap();
        let (where_sql, values) = Self::build_where(&query.filters, "id", None);
        let sql = format!(
            "SELECT id, entity_id, type, name, time_last_changed, uid, gid, mode, mtime, atime, ctime
             FROM entries{}{}",
            where_sql,
            Self::order_and_page_sql(query.order, query.page)
        );
        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), |row| {
            Ok(EntryRow {
                id: IndexId::new(IndexKind::Entry, row.get(0)?),
                entity_id: IndexId::new(IndexKind::Entity, row.get(1)?),
                kind: Self::entry_kind_from_str(&row.get::<_, String>(2)?),
                name: row.get(3)?,
                time_last_changed: row.get(4)?,
                uid: row.get::<_, i64>(5)? as u32,
                gid: row.get::<_, i64>(6)? as u32,
                mode: row.get::<_, i64>(7)? as u32,
                mtime: row.get(8)?,
                atime: row.get(9)?,
                ctime: row.get(10)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

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
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO history
                (job_uuid, schedule_uuid, host_name, user_name, type, created, error_message, duration_secs,
                 total_entry_count, total_entry_size, skipped_entry_count, skipped_entry_size,
                 error_entry_count, error_entry_size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                job_uuid.to_string(),
                schedule_uuid.map(|u| u.to_string()),
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
            ],
        )?;
        Ok(IndexId::new(IndexKind::History, conn.last_insert_rowid()))
    }

    fn list_history(&self, query: &Query) -> Result<Vec<HistoryRow>> {
        let conn = self.conn.lock().unwrap();
        let (where_sql, values) = Self::build_where(&query.filters, "id", Some("job_uuid"));
        let sql = format!(
            "SELECT id, job_uuid, schedule_uuid, host_name, user_name, type, created, error_message,
                    duration_secs, total_entry_count, total_entry_size, skipped_entry_count,
                    skipped_entry_size, error_entry_count, error_entry_size
             FROM history{}{}",
            where_sql,
            Self::order_and_page_sql(query.order, query.page)
        );
        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), |row| {
            Ok(HistoryRow {
                id: IndexId::new(IndexKind::History, row.get(0)?),
                job_uuid: Uuid::parse_str(&row.get::<_, String>(1)?).unwrap_or_else(|_| Uuid::nil()),
                schedule_uuid: row
                    .get::<_, Option<String>>(2)?
                    .and_then(|s| Uuid::parse_str(&s).ok()),
                host_name: row.get(3)?,
                user_name: row.get(4)?,
                history_type: row.get(5)?,
                created: row.get(6)?,
                error_message: row.get(7)?,
                duration_secs: row.get::<_, i64>(8)? as u64,
                total_entry_count: row.get::<_, i64>(9)? as u64,
                total_entry_size: row.get::<_, i64>(10)? as u64,
                skipped_entry_count: row.get::<_, i64>(11)? as u64,
                skipped_entry_size: row.get::<_, i64>(12)? as u64,
                error_entry_count: row.get::<_, i64>(13)? as u64,
                error_entry_size: row.get::<_, i64>(14)? as u64,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn delete_history(&self, id: IndexId) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM history WHERE id = ?1", [id.value])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> EntryAttrs {
        EntryAttrs {
            time_last_changed: 1000,
            uid: 0,
            gid: 0,
            mode: 0o644,
            mtime: 1000,
            atime: 1000,
            ctime: 1000,
        }
    }

    #[test]
    fn new_uuid_is_idempotent() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let uuid = Uuid::new_v4();
        let a = catalog.new_uuid(uuid).unwrap();
        let b = catalog.new_uuid(uuid).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn file_entry_round_trips_and_lookup_prior_entry_finds_it() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let uuid_id = catalog.new_uuid(Uuid::new_v4()).unwrap();
        let entity_id = catalog.new_entity(uuid_id, None, "backup", 1000).unwrap();
        let storage_id = catalog.new_storage(entity_id, "volume-0000").unwrap();

        catalog
            .add_file_entry(
                storage_id,
                "etc/hosts",
                &attrs(),
                &[Fragment { offset: 0, length: 128 }],
                &FileAttributes {
                    size: 128,
                    checksum: Some(vec![1, 2, 3]),
                },
            )
            .unwrap();

        let prior = catalog.lookup_prior_entry(uuid_id, "etc/hosts").unwrap().unwrap();
        assert_eq!(prior.time_last_changed, 1000);
        assert_eq!(prior.size, Some(128));
        assert_eq!(prior.checksum, Some(vec![1, 2, 3]));

        assert!(catalog.lookup_prior_entry(uuid_id, "etc/missing").unwrap().is_none());
    }

    #[test]
    fn delete_storage_removes_its_entries_transactionally() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let uuid_id = catalog.new_uuid(Uuid::new_v4()).unwrap();
        let entity_id = catalog.new_entity(uuid_id, None, "backup", 1000).unwrap();
        let storage_id = catalog.new_storage(entity_id, "volume-0000").unwrap();
        catalog.add_directory_entry(storage_id, "etc", &attrs()).unwrap();

        catalog.delete_storage(storage_id).unwrap();

        let entries = catalog
            .list_entries(&Query::new().filter(Filter::IdEquals(IndexId::any(IndexKind::Entry))))
            .unwrap();
        assert!(entries.is_empty());
        assert!(matches!(
            catalog.delete_storage(storage_id),
            Err(super::super::CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn list_entities_honors_order_and_paging() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let uuid_id = catalog.new_uuid(Uuid::new_v4()).unwrap();
        for created in [100, 300, 200] {
            catalog.new_entity(uuid_id, None, "backup", created).unwrap();
        }

        let page = catalog
            .list_entities(
                &Query::new()
                    .order_by("created_date_time", true)
                    .paged(0, 2),
            )
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].created, 300);
        assert_eq!(page[1].created, 200);
    }
}
