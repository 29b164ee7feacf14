//! Sync records and the record store abstraction.

use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

/// Status of a tracked (client, package) pair.
///
/// This closed set is the entire state machine: anything other than
/// `Success` is re-evaluated every cycle, with no backoff and no attempt
/// counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Initial state; the row has never converged.
    Pending,
    /// The last attempt failed; retried next cycle.
    Failed,
    /// Converged; excluded from work until the catalog changes.
    Success,
}

impl SyncStatus {
    /// Database text representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "PENDING",
            SyncStatus::Failed => "FAILED",
            SyncStatus::Success => "SUCCESS",
        }
    }

    /// Parses the database text representation, ignoring case.
    pub fn parse(text: &str) -> SyncResult<Self> {
        match text.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(SyncStatus::Pending),
            "FAILED" => Ok(SyncStatus::Failed),
            "SUCCESS" => Ok(SyncStatus::Success),
            other => Err(SyncError::persistence(format!(
                "unknown sync status {other:?}"
            ))),
        }
    }

    /// Returns true if a row in this status needs evaluation.
    pub fn needs_sync(&self) -> bool {
        !matches!(self, SyncStatus::Success)
    }
}

/// One tracked (client, package) row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRecord {
    /// Opaque client identifier, non-empty.
    pub client_id: String,
    /// Package name; unique together with `client_id`.
    pub package_name: String,
    /// Last verified digest, unset until the first success.
    pub package_checksum: Option<String>,
    /// Last synced version token, unset until the first success.
    pub package_version: Option<String>,
    /// Informational path hint; not authoritative.
    pub package_location: Option<String>,
    /// Current status.
    pub sync_status: SyncStatus,
    /// Time of the last successful sync, if any.
    pub last_sync_time: Option<SystemTime>,
    /// Advanced on every write to the row.
    pub modified_time: SystemTime,
}

impl SyncRecord {
    /// Creates a fresh, never-synced row.
    pub fn new(client_id: impl Into<String>, package_name: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            package_name: package_name.into(),
            package_checksum: None,
            package_version: None,
            package_location: None,
            sync_status: SyncStatus::Pending,
            last_sync_time: None,
            modified_time: SystemTime::now(),
        }
    }
}

/// Persistence seam for sync records and placement targets.
///
/// The store exclusively owns row persistence; the engine only holds a
/// per-cycle snapshot. Connectivity failures surface as
/// [`SyncError::Persistence`] and abort only the row being processed.
pub trait RecordStore: Send + Sync {
    /// Returns all rows whose status is not `Success`, in no particular
    /// order.
    fn rows_needing_sync(&self) -> SyncResult<Vec<SyncRecord>>;

    /// Resolves the on-disk placement path for a (client, package) pair.
    ///
    /// `None` means no deployment is configured; that is a normal
    /// outcome, not an error.
    fn target_path_for(&self, client_id: &str, package_name: &str)
        -> SyncResult<Option<PathBuf>>;

    /// Unconditionally sets a row's status, advancing its modified time.
    fn set_status(&self, client_id: &str, package_name: &str, status: SyncStatus)
        -> SyncResult<()>;

    /// Marks a row converged, recording digest and version together with
    /// the status in one write.
    fn mark_success(
        &self,
        client_id: &str,
        package_name: &str,
        digest: &str,
        version: &str,
    ) -> SyncResult<()>;
}

type RowKey = (String, String);

/// An in-memory record store for testing and embedding.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<RowKey, SyncRecord>>,
    targets: RwLock<HashMap<RowKey, PathBuf>>,
    write_error: RwLock<Option<String>>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a row.
    pub fn upsert_record(&self, record: SyncRecord) {
        let key = (record.client_id.clone(), record.package_name.clone());
        self.records.write().insert(key, record);
    }

    /// Configures the placement target for a (client, package) pair.
    pub fn set_target(&self, client_id: &str, package_name: &str, path: impl Into<PathBuf>) {
        self.targets
            .write()
            .insert((client_id.into(), package_name.into()), path.into());
    }

    /// Makes every subsequent write fail with a persistence error.
    pub fn fail_writes(&self, message: impl Into<String>) {
        *self.write_error.write() = Some(message.into());
    }

    /// Returns a row by key, if present.
    pub fn record(&self, client_id: &str, package_name: &str) -> Option<SyncRecord> {
        self.records
            .read()
            .get(&(client_id.to_string(), package_name.to_string()))
            .cloned()
    }

    fn check_writable(&self) -> SyncResult<()> {
        match self.write_error.read().clone() {
            Some(message) => Err(SyncError::persistence(message)),
            None => Ok(()),
        }
    }
}

impl RecordStore for MemoryRecordStore {
    fn rows_needing_sync(&self) -> SyncResult<Vec<SyncRecord>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.sync_status.needs_sync())
            .cloned()
            .collect())
    }

    fn target_path_for(
        &self,
        client_id: &str,
        package_name: &str,
    ) -> SyncResult<Option<PathBuf>> {
        Ok(self
            .targets
            .read()
            .get(&(client_id.to_string(), package_name.to_string()))
            .cloned())
    }

    fn set_status(
        &self,
        client_id: &str,
        package_name: &str,
        status: SyncStatus,
    ) -> SyncResult<()> {
        self.check_writable()?;
        let mut records = self.records.write();
        if let Some(record) =
            records.get_mut(&(client_id.to_string(), package_name.to_string()))
        {
            record.sync_status = status;
            record.modified_time = SystemTime::now();
        }
        Ok(())
    }

    fn mark_success(
        &self,
        client_id: &str,
        package_name: &str,
        digest: &str,
        version: &str,
    ) -> SyncResult<()> {
        self.check_writable()?;
        let mut records = self.records.write();
        if let Some(record) =
            records.get_mut(&(client_id.to_string(), package_name.to_string()))
        {
            record.sync_status = SyncStatus::Success;
            record.package_checksum = Some(digest.to_string());
            record.package_version = Some(version.to_string());
            record.modified_time = SystemTime::now();
        }
        Ok(())
    }
}
