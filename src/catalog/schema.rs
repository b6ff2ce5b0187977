//! DDL and additive migrations for the catalog database.
//!
//! Migrations are plain functions keyed by the version they produce,
//! applied in order starting from whatever `schema_version` the database
//! currently reports. `CURRENT_VERSION` is the highest version this build
//! knows how to read; opening a database stamped newer than that is
//! refused with [`super::CatalogError::SchemaMismatch`].

use rusqlite::{Connection, Transaction};

use super::CatalogError;

pub const CURRENT_VERSION: u32 = 1;

type Migration = fn(&Transaction) -> rusqlite::Result<()>;

const MIGRATIONS: &[Migration] = &[migrate_v1];

pub fn open_and_migrate(conn: &mut Connection) -> super::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (id INTEGER PRIMARY KEY CHECK (id = 0), version INTEGER NOT NULL);",
    )?;

    let current: Option<u32> = conn
        .query_row("SELECT version FROM schema_version WHERE id = 0", [], |row| row.get(0))
        .ok();
    let mut version = current.unwrap_or(0);

    if version > CURRENT_VERSION {
        return Err(CatalogError::SchemaMismatch {
            found: version,
            supported: CURRENT_VERSION,
        });
    }

    while (version as usize) < MIGRATIONS.len() {
        let tx = conn.transaction()?;
        MIGRATIONS[version as usize](&tx)?;
        version += 1;
        tx.execute(
            "INSERT INTO schema_version (id, version) VALUES (0, ?1)
             ON CONFLICT(id) DO UPDATE SET version = excluded.version",
            [version],
        )?;
        tx.commit()?;
    }

    Ok(())
}

fn migrate_v1(tx: &Transaction) -> rusqlite::Result<()> {
    tx.execute_batch(
        r#"
        CREATE TABLE uuids (
            id INTEGER PRIMARY KEY,
            job_uuid TEXT NOT NULL UNIQUE
        );

        CREATE TABLE entities (
            id INTEGER PRIMARY KEY,
            uuid_id INTEGER NOT NULL REFERENCES uuids(id),
            schedule_uuid TEXT,
            type TEXT NOT NULL,
            created_date_time INTEGER NOT NULL,
            state TEXT NOT NULL DEFAULT 'RUNNING'
        );
        CREATE INDEX entities_uuid_id ON entities(uuid_id);

        CREATE TABLE storages (
            id INTEGER PRIMARY KEY,
            entity_id INTEGER NOT NULL REFERENCES entities(id),
            name TEXT NOT NULL,
            size INTEGER NOT NULL DEFAULT 0,
            state TEXT NOT NULL DEFAULT 'CREATING',
            error_message TEXT,
            created INTEGER NOT NULL
        );
        CREATE INDEX storages_entity_id ON storages(entity_id);

        CREATE TABLE entries (
            id INTEGER PRIMARY KEY,
            storage_id INTEGER NOT NULL REFERENCES storages(id),
            entity_id INTEGER NOT NULL REFERENCES entities(id),
            type TEXT NOT NULL,
            name TEXT NOT NULL,
            time_last_changed INTEGER NOT NULL,
            uid INTEGER NOT NULL,
            gid INTEGER NOT NULL,
            mode INTEGER NOT NULL,
            mtime INTEGER NOT NULL,
            atime INTEGER NOT NULL,
            ctime INTEGER NOT NULL
        );
        CREATE INDEX entries_storage_id ON entries(storage_id);
        CREATE INDEX entries_entity_name ON entries(entity_id, name);

        CREATE TABLE entry_fragments (
            id INTEGER PRIMARY KEY,
            entry_id INTEGER NOT NULL REFERENCES entries(id),
            offset INTEGER NOT NULL,
            length INTEGER NOT NULL
        );
        CREATE INDEX entry_fragments_entry_id ON entry_fragments(entry_id);

        CREATE TABLE file_entries (
            entry_id INTEGER PRIMARY KEY REFERENCES entries(id),
            size INTEGER NOT NULL,
            checksum BLOB
        );

        CREATE TABLE image_entries (
            entry_id INTEGER PRIMARY KEY REFERENCES entries(id),
            size INTEGER NOT NULL,
            block_size INTEGER NOT NULL
        );

        CREATE TABLE directory_entries (
            entry_id INTEGER PRIMARY KEY REFERENCES entries(id)
        );

        CREATE TABLE link_entries (
            entry_id INTEGER PRIMARY KEY REFERENCES entries(id),
            target TEXT NOT NULL
        );

        CREATE TABLE hardlink_entries (
            entry_id INTEGER PRIMARY KEY REFERENCES entries(id),
            target_name TEXT NOT NULL
        );

        CREATE TABLE special_entries (
            entry_id INTEGER PRIMARY KEY REFERENCES entries(id),
            special_type TEXT NOT NULL,
            device_major INTEGER,
            device_minor INTEGER
        );

        CREATE TABLE history (
            id INTEGER PRIMARY KEY,
            job_uuid TEXT NOT NULL,
            schedule_uuid TEXT,
            host_name TEXT NOT NULL,
            user_name TEXT NOT NULL,
            type TEXT NOT NULL,
            created INTEGER NOT NULL,
            error_message TEXT,
            duration_secs INTEGER NOT NULL,
            total_entry_count INTEGER NOT NULL,
            total_entry_size INTEGER NOT NULL,
            skipped_entry_count INTEGER NOT NULL,
            skipped_entry_size INTEGER NOT NULL,
            error_entry_count INTEGER NOT NULL,
            error_entry_size INTEGER NOT NULL
        );
        CREATE INDEX history_job_uuid ON history(job_uuid);
        "#,
    )
}
