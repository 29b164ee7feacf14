//! The synchronization engine.
//!
//! One cycle takes a snapshot of the rows needing sync and the store
//! catalog, then converges each row independently: fast-path when the
//! recorded version already matches, otherwise download, verify, place,
//! re-verify, and commit. A row gets exactly one attempt per cycle, and
//! no row's failure blocks another's.

use crate::catalog::{CatalogEntry, StoreClient};
use crate::checksum::{digests_match, file_sha256};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::record::{RecordStore, SyncRecord, SyncStatus};
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Terminal outcome of one row in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    /// Version already matched; SUCCESS re-confirmed without a transfer.
    Converged,
    /// Full download-verify-place sequence completed; SUCCESS committed.
    Updated,
    /// FAILED committed; retried next cycle.
    Failed,
    /// Package absent from the catalog; row untouched.
    SkippedMissingCatalogEntry,
    /// No placement target configured; row untouched.
    SkippedMissingTarget,
}

/// Aggregate result of one sync cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Rows in the cycle's work set.
    pub rows: usize,
    /// Rows re-confirmed via the version fast path.
    pub converged: u64,
    /// Rows updated by a full transfer.
    pub updated: u64,
    /// Rows that ended the cycle FAILED.
    pub failed: u64,
    /// Rows skipped because the catalog no longer lists their package.
    pub skipped_missing_entry: u64,
    /// Rows skipped because no placement target is configured.
    pub skipped_missing_target: u64,
    /// Rows whose status write failed; left in their prior status.
    pub commit_errors: u64,
    /// Wall-clock duration of the cycle.
    pub duration: Duration,
}

impl CycleReport {
    fn count(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Converged => self.converged += 1,
            RowOutcome::Updated => self.updated += 1,
            RowOutcome::Failed => self.failed += 1,
            RowOutcome::SkippedMissingCatalogEntry => self.skipped_missing_entry += 1,
            RowOutcome::SkippedMissingTarget => self.skipped_missing_target += 1,
        }
    }
}

/// The synchronization engine.
///
/// Holds no cross-cycle state of its own; everything durable lives in
/// the record store.
pub struct SyncEngine<S: StoreClient, R: RecordStore> {
    config: SyncConfig,
    store: S,
    records: R,
}

impl<S: StoreClient, R: RecordStore> SyncEngine<S, R> {
    /// Creates a new engine over a store client and a record store.
    pub fn new(config: SyncConfig, store: S, records: R) -> Self {
        Self {
            config,
            store,
            records,
        }
    }

    /// Returns the store client.
    pub fn store_client(&self) -> &S {
        &self.store
    }

    /// Returns the record store.
    pub fn records(&self) -> &R {
        &self.records
    }

    /// Runs one full sync cycle.
    ///
    /// Fails only on cycle-level problems: row enumeration or the
    /// catalog fetch. Row-level failures are absorbed into the report.
    pub fn run_cycle(&self) -> SyncResult<CycleReport> {
        let start = Instant::now();
        let mut report = CycleReport::default();

        let rows = self.records.rows_needing_sync()?;
        if rows.is_empty() {
            info!("nothing to sync, all rows converged");
            report.duration = start.elapsed();
            return Ok(report);
        }

        report.rows = rows.len();
        info!(rows = rows.len(), "starting sync cycle");

        // One catalog snapshot bounds the whole cycle.
        let catalog = self.store.fetch_catalog()?;

        for row in &rows {
            match self.sync_row(row, &catalog) {
                Ok(outcome) => report.count(outcome),
                Err(SyncError::Persistence(message)) => {
                    // The status write failed; the row keeps its prior
                    // status and is retried next cycle.
                    error!(
                        client = %row.client_id,
                        package = %row.package_name,
                        %message,
                        "commit failed, row left unchanged"
                    );
                    report.commit_errors += 1;
                }
                Err(err) => {
                    warn!(
                        client = %row.client_id,
                        package = %row.package_name,
                        error = %err,
                        "row sync failed"
                    );
                    self.mark_failed(row);
                    report.count(RowOutcome::Failed);
                }
            }
        }

        report.duration = start.elapsed();
        info!(
            converged = report.converged,
            updated = report.updated,
            failed = report.failed,
            commit_errors = report.commit_errors,
            "sync cycle finished"
        );
        Ok(report)
    }

    /// Converges a single row against the catalog snapshot.
    ///
    /// The version token is trusted: an entry whose content changed
    /// under an unchanged version is never re-verified. Returns the
    /// row's terminal outcome, or an error for the caller to absorb.
    fn sync_row(
        &self,
        row: &SyncRecord,
        catalog: &HashMap<String, CatalogEntry>,
    ) -> SyncResult<RowOutcome> {
        let Some(entry) = catalog.get(&row.package_name) else {
            warn!(package = %row.package_name, "not in catalog, skipping");
            return Ok(RowOutcome::SkippedMissingCatalogEntry);
        };

        // Fast path: recorded version already matches the catalog.
        if row.package_version.as_deref() == Some(entry.version.as_str()) {
            self.records.mark_success(
                &row.client_id,
                &row.package_name,
                &entry.sha256,
                &entry.version,
            )?;
            debug!(
                package = %row.package_name,
                version = %entry.version,
                "already at catalog version"
            );
            return Ok(RowOutcome::Converged);
        }

        info!(
            package = %row.package_name,
            from = row.package_version.as_deref().unwrap_or("none"),
            to = %entry.version,
            "downloading"
        );

        let staged = self.config.staging_path(&row.package_name);
        self.store.download_package(&row.package_name, &staged)?;

        let staged_digest = file_sha256(&staged)?;
        if !digests_match(&staged_digest, &entry.sha256) {
            // A truncated or tampered download must not survive in the
            // staging directory.
            remove_if_present(&staged)?;
            return Err(SyncError::ChecksumMismatch {
                expected: entry.sha256.clone(),
                actual: staged_digest,
            });
        }

        let Some(target) = self
            .records
            .target_path_for(&row.client_id, &row.package_name)?
        else {
            // A missing target is a configuration gap, not a transfer
            // failure; leaving the status alone keeps a later real
            // failure visible.
            warn!(
                client = %row.client_id,
                package = %row.package_name,
                "no placement target configured, skipping"
            );
            return Ok(RowOutcome::SkippedMissingTarget);
        };

        place_file(&staged, &target)?;

        let placed_digest = file_sha256(&target)?;
        if !digests_match(&placed_digest, &entry.sha256) {
            return Err(SyncError::ChecksumMismatch {
                expected: entry.sha256.clone(),
                actual: placed_digest,
            });
        }

        self.records.mark_success(
            &row.client_id,
            &row.package_name,
            &placed_digest,
            &entry.version,
        )?;
        info!(
            package = %row.package_name,
            version = %entry.version,
            target = %target.display(),
            "synced"
        );
        Ok(RowOutcome::Updated)
    }

    /// Best-effort FAILED write for a row whose attempt errored out.
    fn mark_failed(&self, row: &SyncRecord) {
        if let Err(err) =
            self.records
                .set_status(&row.client_id, &row.package_name, SyncStatus::Failed)
        {
            error!(
                client = %row.client_id,
                package = %row.package_name,
                error = %err,
                "could not record FAILED status"
            );
        }
    }
}

/// Copies the staged file to the target path, creating the parent
/// directory tree and overwriting any existing file.
///
/// This is a plain copy, not a write-temp-then-rename: a crash mid-copy
/// can leave a partially written target. The following digest check and
/// the next cycle's retry bound the damage.
fn place_file(staged: &Path, target: &Path) -> SyncResult<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(staged, target)?;
    Ok(())
}

fn remove_if_present(path: &Path) -> SyncResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
