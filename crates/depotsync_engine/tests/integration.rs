//! End-to-end cycle tests over the mock store client and both record
//! store implementations.

use depotsync_engine::{
    CatalogEntry, MemoryRecordStore, MockStoreClient, RecordStore, SqliteRecordStore,
    SyncConfig, SyncEngine, SyncRecord, SyncStatus,
};
use sha2::{Digest, Sha256};
use std::path::Path;

fn sha256_hex(content: &[u8]) -> String {
    Sha256::digest(content)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn entry_for(name: &str, content: &[u8], version: &str) -> CatalogEntry {
    CatalogEntry {
        package_name: name.into(),
        sha256: sha256_hex(content),
        version: version.into(),
    }
}

fn engine_with(cache: &Path) -> SyncEngine<MockStoreClient, MemoryRecordStore> {
    SyncEngine::new(
        SyncConfig::new("mock://store", cache),
        MockStoreClient::new(),
        MemoryRecordStore::new(),
    )
}

#[test]
fn pending_row_converges_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    let target = dir.path().join("deploy/agentX.zip");

    let engine = engine_with(&cache);
    let content = b"agent payload v2".to_vec();
    let expected_sha = sha256_hex(&content);
    engine
        .records()
        .upsert_record(SyncRecord::new("C1", "agentX.zip"));
    engine.records().set_target("C1", "agentX.zip", &target);

    let store = engine.records();
    assert_eq!(
        store.record("C1", "agentX.zip").unwrap().sync_status,
        SyncStatus::Pending
    );

    // Catalog advertises 2.0; the row has never synced.
    let client = engine_store(&engine);
    client.add_package(entry_for("agentX.zip", &content, "2.0"), content.clone());

    let report = engine.run_cycle().unwrap();
    assert_eq!(report.rows, 1);
    assert_eq!(report.updated, 1);

    // Target file placed with matching content
    assert_eq!(std::fs::read(&target).unwrap(), content);

    // Row converged with the placed file's digest and catalog version
    let record = engine.records().record("C1", "agentX.zip").unwrap();
    assert_eq!(record.sync_status, SyncStatus::Success);
    assert_eq!(record.package_checksum.as_deref(), Some(expected_sha.as_str()));
    assert_eq!(record.package_version.as_deref(), Some("2.0"));
}

#[test]
fn second_cycle_takes_fast_path() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    let target = dir.path().join("deploy/agentX.zip");

    let engine = engine_with(&cache);
    let content = b"payload".to_vec();
    engine
        .records()
        .upsert_record(SyncRecord::new("C1", "agentX.zip"));
    engine.records().set_target("C1", "agentX.zip", &target);
    engine_store(&engine).add_package(entry_for("agentX.zip", &content, "2.0"), content.clone());

    engine.run_cycle().unwrap();
    assert_eq!(engine_store(&engine).download_count(), 1);

    // Force the row back into the work set with the version intact;
    // re-running must re-confirm SUCCESS without another download.
    let mut row = engine.records().record("C1", "agentX.zip").unwrap();
    row.sync_status = SyncStatus::Pending;
    engine.records().upsert_record(row);

    let report = engine.run_cycle().unwrap();
    assert_eq!(report.converged, 1);
    assert_eq!(engine_store(&engine).download_count(), 1);

    let record = engine.records().record("C1", "agentX.zip").unwrap();
    assert_eq!(record.sync_status, SyncStatus::Success);
    assert_eq!(record.package_version.as_deref(), Some("2.0"));
}

#[test]
fn corrupted_download_fails_row_and_cleans_staging() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    let target = dir.path().join("deploy/agentX.zip");

    let engine = engine_with(&cache);
    engine
        .records()
        .upsert_record(SyncRecord::new("C1", "agentX.zip"));
    engine.records().set_target("C1", "agentX.zip", &target);

    // Catalog digest does not match the bytes the store serves.
    let mut entry = entry_for("agentX.zip", b"expected bytes", "2.0");
    entry.sha256 = "abc123".into();
    engine_store(&engine).add_package(entry, b"tampered bytes".to_vec());

    let report = engine.run_cycle().unwrap();
    assert_eq!(report.failed, 1);

    let record = engine.records().record("C1", "agentX.zip").unwrap();
    assert_eq!(record.sync_status, SyncStatus::Failed);
    // Prior digest/version untouched by the failed attempt
    assert_eq!(record.package_checksum, None);
    assert_eq!(record.package_version, None);

    // Staged file removed, nothing placed at the target
    assert!(!cache.join("agentX.zip").exists());
    assert!(!target.exists());
}

#[test]
fn download_error_marks_row_failed() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");

    let engine = engine_with(&cache);
    engine
        .records()
        .upsert_record(SyncRecord::new("C1", "agentX.zip"));
    engine_store(&engine).add_catalog_entry(entry_for("agentX.zip", b"x", "2.0"));
    engine_store(&engine).fail_downloads(503);

    let report = engine.run_cycle().unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(
        engine.records().record("C1", "agentX.zip").unwrap().sync_status,
        SyncStatus::Failed
    );
}

#[test]
fn one_failing_row_does_not_block_another() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    let good_target = dir.path().join("deploy/good.zip");

    let engine = engine_with(&cache);
    let good = b"good bytes".to_vec();

    engine.records().upsert_record(SyncRecord::new("C1", "good.zip"));
    engine.records().set_target("C1", "good.zip", &good_target);
    engine_store(&engine).add_package(entry_for("good.zip", &good, "1.0"), good.clone());

    // Bad row: catalog lists it, but the store serves corrupt bytes.
    engine.records().upsert_record(SyncRecord::new("C1", "bad.zip"));
    engine
        .records()
        .set_target("C1", "bad.zip", dir.path().join("deploy/bad.zip"));
    let mut bad_entry = entry_for("bad.zip", b"real", "1.0");
    bad_entry.sha256 = "deadbeef".into();
    engine_store(&engine).add_package(bad_entry, b"corrupt".to_vec());

    let report = engine.run_cycle().unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.failed, 1);

    assert_eq!(
        engine.records().record("C1", "good.zip").unwrap().sync_status,
        SyncStatus::Success
    );
    assert_eq!(
        engine.records().record("C1", "bad.zip").unwrap().sync_status,
        SyncStatus::Failed
    );
    assert_eq!(std::fs::read(&good_target).unwrap(), good);
}

#[test]
fn commit_failure_leaves_prior_status() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");

    let engine = engine_with(&cache);
    let mut row = SyncRecord::new("C1", "agentX.zip");
    row.package_version = Some("2.0".into());
    engine.records().upsert_record(row);
    engine_store(&engine).add_catalog_entry(entry_for("agentX.zip", b"x", "2.0"));

    // Fast path will try to commit SUCCESS, but the store is down.
    engine.records().fail_writes("db unreachable");

    let report = engine.run_cycle().unwrap();
    assert_eq!(report.commit_errors, 1);
    assert_eq!(report.failed, 0);
}

#[test]
fn target_overwrite_replaces_stale_file() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    let target = dir.path().join("deploy/agentX.zip");

    std::fs::create_dir_all(target.parent().unwrap()).unwrap();
    std::fs::write(&target, b"stale version").unwrap();

    let engine = engine_with(&cache);
    let content = b"fresh version".to_vec();
    engine
        .records()
        .upsert_record(SyncRecord::new("C1", "agentX.zip"));
    engine.records().set_target("C1", "agentX.zip", &target);
    engine_store(&engine).add_package(entry_for("agentX.zip", &content, "3.0"), content.clone());

    engine.run_cycle().unwrap();
    assert_eq!(std::fs::read(&target).unwrap(), content);
}

#[test]
fn uppercase_catalog_digest_still_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    let target = dir.path().join("deploy/agentX.zip");

    let engine = engine_with(&cache);
    let content = b"case test".to_vec();
    let mut entry = entry_for("agentX.zip", &content, "1.0");
    entry.sha256 = entry.sha256.to_uppercase();
    engine
        .records()
        .upsert_record(SyncRecord::new("C1", "agentX.zip"));
    engine.records().set_target("C1", "agentX.zip", &target);
    engine_store(&engine).add_package(entry, content);

    let report = engine.run_cycle().unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(
        engine.records().record("C1", "agentX.zip").unwrap().sync_status,
        SyncStatus::Success
    );
}

#[test]
#[cfg(unix)]
fn placement_mismatch_fails_row() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");

    let engine = engine_with(&cache);
    let content = b"real payload".to_vec();
    engine
        .records()
        .upsert_record(SyncRecord::new("C1", "agentX.zip"));
    // /dev/null accepts the copy but reads back empty, so the digest
    // computed at the target can never match the staged one.
    engine.records().set_target("C1", "agentX.zip", "/dev/null");
    engine_store(&engine).add_package(entry_for("agentX.zip", &content, "2.0"), content);

    let report = engine.run_cycle().unwrap();
    assert_eq!(report.updated, 0);
    assert_eq!(report.failed, 1);

    let record = engine.records().record("C1", "agentX.zip").unwrap();
    assert_eq!(record.sync_status, SyncStatus::Failed);
    // The failed attempt committed nothing
    assert_eq!(record.package_checksum, None);
    assert_eq!(record.package_version, None);
}

#[test]
fn sqlite_store_drives_a_full_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    let target = dir.path().join("deploy/agentX.zip");

    let records = SqliteRecordStore::open(&dir.path().join("state/depotsync.db")).unwrap();
    records.upsert_record(&SyncRecord::new("C1", "agentX.zip")).unwrap();
    records.set_target("C1", "agentX.zip", &target).unwrap();

    let client = MockStoreClient::new();
    let content = b"sqlite cycle".to_vec();
    let expected_sha = sha256_hex(&content);
    client.add_package(entry_for("agentX.zip", &content, "2.0"), content.clone());

    let engine = SyncEngine::new(SyncConfig::new("mock://store", &cache), client, records);
    let report = engine.run_cycle().unwrap();
    assert_eq!(report.updated, 1);

    let record = engine
        .records()
        .record("C1", "agentX.zip")
        .unwrap()
        .unwrap();
    assert_eq!(record.sync_status, SyncStatus::Success);
    assert_eq!(record.package_checksum.as_deref(), Some(expected_sha.as_str()));
    assert_eq!(record.package_version.as_deref(), Some("2.0"));
    assert!(engine.records().rows_needing_sync().unwrap().is_empty());
}

/// Convenience accessor for the engine's mock client.
fn engine_store(engine: &SyncEngine<MockStoreClient, MemoryRecordStore>) -> &MockStoreClient {
    engine.store_client()
}
