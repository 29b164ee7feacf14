//! # depotsync Engine
//!
//! Synchronization engine for depotsync.
//!
//! This crate provides:
//! - Whole-file SHA-256 checksum verification
//! - Store catalog client (HTTP and mock implementations)
//! - Sync record store (SQLite and in-memory implementations)
//! - The per-cycle synchronization engine
//!
//! ## Architecture
//!
//! A database tracks which package version should be at which client
//! target. Each cycle, the engine takes one catalog snapshot and one
//! snapshot of the rows needing sync, then converges every row
//! independently:
//!
//! 1. Rows whose recorded version equals the catalog version re-confirm
//!    SUCCESS without a transfer.
//! 2. Other rows are downloaded to a staging path, digest-checked,
//!    copied to their configured target, re-checked, and committed.
//!
//! ## Key Invariants
//!
//! - The catalog is authoritative; versions are compared by equality only
//! - A row makes exactly one attempt per cycle
//! - One row's failure never blocks another row's success
//! - A SUCCESS row always carries the digest and version it converged to
//! - Retry is purely re-polling: any non-SUCCESS row is retried next cycle

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod checksum;
mod config;
mod engine;
mod error;
mod http;
mod record;
mod sqlite;

pub use catalog::{catalog_map, CatalogEntry, MockStoreClient, StoreClient};
pub use checksum::{digests_match, file_sha256};
pub use config::SyncConfig;
pub use engine::{CycleReport, RowOutcome, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use http::HttpStoreClient;
pub use record::{MemoryRecordStore, RecordStore, SyncRecord, SyncStatus};
pub use sqlite::SqliteRecordStore;
