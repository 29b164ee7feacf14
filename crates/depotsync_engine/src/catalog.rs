//! Store catalog types and the client abstraction.

use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// One entry of the store's `/catalog` listing.
///
/// The version is an opaque token compared by string equality only; no
/// semantic ordering is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Package file name, unique within the catalog.
    pub package_name: String,
    /// Expected SHA-256 digest of the canonical artifact, hex encoded.
    pub sha256: String,
    /// Opaque version token.
    pub version: String,
}

/// Builds a name-keyed map from a catalog listing.
///
/// Duplicate names are not an error; the last entry wins, matching the
/// store's listing semantics.
pub fn catalog_map(entries: Vec<CatalogEntry>) -> HashMap<String, CatalogEntry> {
    entries
        .into_iter()
        .map(|e| (e.package_name.clone(), e))
        .collect()
}

/// A store client handles catalog and package transfer with the store.
///
/// This trait abstracts the HTTP layer so the engine can be driven by a
/// mock in tests.
pub trait StoreClient: Send + Sync {
    /// Fetches the catalog and returns it keyed by package name.
    fn fetch_catalog(&self) -> SyncResult<HashMap<String, CatalogEntry>>;

    /// Downloads a package's content into `dest`, creating parent
    /// directories as needed and overwriting any existing file.
    ///
    /// A failed transfer may leave a truncated file at `dest`; callers
    /// are expected to verify the digest afterwards.
    fn download_package(&self, package_name: &str, dest: &Path) -> SyncResult<PathBuf>;

    /// Uploads a local package file to the store.
    fn upload_package(&self, local_path: &Path) -> SyncResult<()>;
}

/// A mock store client for testing.
#[derive(Default)]
pub struct MockStoreClient {
    catalog: RwLock<Vec<CatalogEntry>>,
    packages: RwLock<HashMap<String, Vec<u8>>>,
    catalog_error: RwLock<Option<String>>,
    download_failure: RwLock<Option<u16>>,
    downloads: AtomicU64,
    uploads: RwLock<Vec<PathBuf>>,
}

impl MockStoreClient {
    /// Creates a new mock store client with an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a catalog entry together with the package content it serves.
    pub fn add_package(&self, entry: CatalogEntry, content: Vec<u8>) {
        self.packages
            .write()
            .insert(entry.package_name.clone(), content);
        self.catalog.write().push(entry);
    }

    /// Adds a catalog entry without any backing content.
    pub fn add_catalog_entry(&self, entry: CatalogEntry) {
        self.catalog.write().push(entry);
    }

    /// Makes `fetch_catalog` fail with the given message.
    pub fn fail_catalog(&self, message: impl Into<String>) {
        *self.catalog_error.write() = Some(message.into());
    }

    /// Makes every download fail with the given HTTP status.
    pub fn fail_downloads(&self, status: u16) {
        *self.download_failure.write() = Some(status);
    }

    /// Number of downloads performed so far.
    pub fn download_count(&self) -> u64 {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Paths passed to `upload_package` so far.
    pub fn uploaded(&self) -> Vec<PathBuf> {
        self.uploads.read().clone()
    }
}

impl StoreClient for MockStoreClient {
    fn fetch_catalog(&self) -> SyncResult<HashMap<String, CatalogEntry>> {
        if let Some(message) = self.catalog_error.read().clone() {
            return Err(SyncError::catalog_unavailable(message));
        }
        Ok(catalog_map(self.catalog.read().clone()))
    }

    fn download_package(&self, package_name: &str, dest: &Path) -> SyncResult<PathBuf> {
        self.downloads.fetch_add(1, Ordering::SeqCst);

        if let Some(status) = *self.download_failure.read() {
            return Err(SyncError::DownloadFailed {
                package: package_name.to_string(),
                status,
            });
        }

        let content = self.packages.read().get(package_name).cloned().ok_or(
            SyncError::DownloadFailed {
                package: package_name.to_string(),
                status: 404,
            },
        )?;

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, content)?;
        Ok(dest.to_path_buf())
    }

    fn upload_package(&self, local_path: &Path) -> SyncResult<()> {
        self.uploads.write().push(local_path.to_path_buf());
        Ok(())
    }
}
