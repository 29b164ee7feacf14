//! SQLite-backed record store.

use crate::error::SyncResult;
use crate::record::{RecordStore, SyncRecord, SyncStatus};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS package_sync (
    client_id        TEXT NOT NULL,
    package_name     TEXT NOT NULL,
    package_checksum TEXT,
    package_version  TEXT,
    package_location TEXT,
    sync_status      TEXT NOT NULL DEFAULT 'PENDING',
    last_sync_time   INTEGER,
    modified_time    INTEGER NOT NULL,
    PRIMARY KEY (client_id, package_name)
);

CREATE TABLE IF NOT EXISTS package_targets (
    client_id    TEXT NOT NULL,
    package_name TEXT NOT NULL,
    package_path TEXT NOT NULL,
    PRIMARY KEY (client_id, package_name)
);
";

/// A record store persisted in a local SQLite database.
///
/// Each call is a single, separately committed statement; no transaction
/// spans multiple statements.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Opens (creating if necessary) the database at `path` and ensures
    /// the schema exists.
    pub fn open(path: &Path) -> SyncResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Opens an in-memory database, mainly for tests.
    pub fn open_in_memory() -> SyncResult<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Creates the `package_sync` and `package_targets` tables if they
    /// do not exist yet.
    pub fn ensure_schema(&self) -> SyncResult<()> {
        self.conn.lock().execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Inserts or replaces a tracked row.
    ///
    /// Rows are normally seeded by provisioning tooling; this is the
    /// library surface for that.
    pub fn upsert_record(&self, record: &SyncRecord) -> SyncResult<()> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO package_sync
                (client_id, package_name, package_checksum, package_version,
                 package_location, sync_status, last_sync_time, modified_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.client_id,
                record.package_name,
                record.package_checksum,
                record.package_version,
                record.package_location,
                record.sync_status.as_str(),
                record.last_sync_time.map(unix_seconds),
                unix_seconds(record.modified_time),
            ],
        )?;
        Ok(())
    }

    /// Configures the placement path for a (client, package) pair.
    pub fn set_target(
        &self,
        client_id: &str,
        package_name: &str,
        path: &Path,
    ) -> SyncResult<()> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO package_targets (client_id, package_name, package_path)
             VALUES (?1, ?2, ?3)",
            params![client_id, package_name, path.to_string_lossy().into_owned()],
        )?;
        Ok(())
    }

    /// Returns a single row by key, if present.
    pub fn record(&self, client_id: &str, package_name: &str) -> SyncResult<Option<SyncRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT client_id, package_name, package_checksum, package_version,
                    package_location, sync_status, last_sync_time, modified_time
               FROM package_sync
              WHERE client_id = ?1 AND package_name = ?2",
        )?;
        let row = stmt
            .query_row(params![client_id, package_name], row_to_record)
            .optional()?;
        Ok(row)
    }
}

impl RecordStore for SqliteRecordStore {
    fn rows_needing_sync(&self) -> SyncResult<Vec<SyncRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT client_id, package_name, package_checksum, package_version,
                    package_location, sync_status, last_sync_time, modified_time
               FROM package_sync
              WHERE sync_status <> 'SUCCESS'",
        )?;
        let rows = stmt
            .query_map([], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn target_path_for(
        &self,
        client_id: &str,
        package_name: &str,
    ) -> SyncResult<Option<PathBuf>> {
        let conn = self.conn.lock();
        let path: Option<String> = conn
            .query_row(
                "SELECT package_path FROM package_targets
                  WHERE client_id = ?1 AND package_name = ?2",
                params![client_id, package_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(path.map(PathBuf::from))
    }

    fn set_status(
        &self,
        client_id: &str,
        package_name: &str,
        status: SyncStatus,
    ) -> SyncResult<()> {
        self.conn.lock().execute(
            "UPDATE package_sync
                SET sync_status = ?1, modified_time = ?2
              WHERE client_id = ?3 AND package_name = ?4",
            params![
                status.as_str(),
                unix_seconds(SystemTime::now()),
                client_id,
                package_name,
            ],
        )?;
        Ok(())
    }

    fn mark_success(
        &self,
        client_id: &str,
        package_name: &str,
        digest: &str,
        version: &str,
    ) -> SyncResult<()> {
        // Status, checksum, and version land in one statement so they
        // can never refer to different transfers.
        self.conn.lock().execute(
            "UPDATE package_sync
                SET sync_status = 'SUCCESS',
                    package_checksum = ?1,
                    package_version = ?2,
                    modified_time = ?3
              WHERE client_id = ?4 AND package_name = ?5",
            params![
                digest,
                version,
                unix_seconds(SystemTime::now()),
                client_id,
                package_name,
            ],
        )?;
        Ok(())
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncRecord> {
    let status_text: String = row.get(5)?;
    let status = SyncStatus::parse(&status_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let last_sync: Option<i64> = row.get(6)?;
    let modified: i64 = row.get(7)?;

    Ok(SyncRecord {
        client_id: row.get(0)?,
        package_name: row.get(1)?,
        package_checksum: row.get(2)?,
        package_version: row.get(3)?,
        package_location: row.get(4)?,
        sync_status: status,
        last_sync_time: last_sync.map(system_time),
        modified_time: system_time(modified),
    })
}

fn unix_seconds(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn system_time(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64)
    } else {
        UNIX_EPOCH
    }
}
