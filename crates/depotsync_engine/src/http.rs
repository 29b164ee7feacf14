//! HTTP store client over reqwest.
//!
//! The engine runs one strictly sequential cycle at a time, so the
//! blocking client is used; there is no async surface in this crate.

use crate::catalog::{catalog_map, CatalogEntry, StoreClient};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use reqwest::blocking::Client;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Store client speaking the store's HTTP surface:
/// `GET /catalog`, `GET /packages/{name}`, `POST /upload`.
pub struct HttpStoreClient {
    base_url: String,
    auth_token: Option<String>,
    request_timeout: std::time::Duration,
    transfer_timeout: std::time::Duration,
    client: Client,
}

impl HttpStoreClient {
    /// Creates a client from the engine configuration.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        Ok(Self {
            base_url: config.store_base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            request_timeout: config.request_timeout,
            transfer_timeout: config.transfer_timeout,
            client,
        })
    }

    /// Returns the store base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_auth(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl StoreClient for HttpStoreClient {
    fn fetch_catalog(&self) -> SyncResult<HashMap<String, CatalogEntry>> {
        let url = self.endpoint("/catalog");
        let response = self
            .with_auth(self.client.get(&url).timeout(self.request_timeout))
            .send()
            .map_err(|e| SyncError::catalog_unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::catalog_unavailable(format!(
                "{url} returned HTTP {status}"
            )));
        }

        let entries: Vec<CatalogEntry> = response
            .json()
            .map_err(|e| SyncError::catalog_unavailable(format!("malformed catalog: {e}")))?;

        debug!(count = entries.len(), "fetched catalog");
        Ok(catalog_map(entries))
    }

    fn download_package(&self, package_name: &str, dest: &Path) -> SyncResult<PathBuf> {
        let url = self.endpoint(&format!("/packages/{package_name}"));
        let mut response = self
            .with_auth(self.client.get(&url).timeout(self.transfer_timeout))
            .send()
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::DownloadFailed {
                package: package_name.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Overwrites any pre-existing file. A transfer that dies midway
        // leaves a truncated file here; the checksum gate catches it.
        let mut file = File::create(dest)?;
        let bytes = response
            .copy_to(&mut file)
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        debug!(package = package_name, bytes, dest = %dest.display(), "downloaded package");
        Ok(dest.to_path_buf())
    }

    fn upload_package(&self, local_path: &Path) -> SyncResult<()> {
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| std::io::Error::other("upload path has no file name"))?
            .to_string();

        let body = std::fs::read(local_path)?;
        let url = self.endpoint("/upload");
        let response = self
            .with_auth(
                self.client
                    .post(&url)
                    .timeout(self.transfer_timeout)
                    .header("Content-Type", "application/zip")
                    .header("X-Filename", &file_name)
                    .body(body),
            )
            .send()
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::UploadFailed {
                status: status.as_u16(),
            });
        }

        debug!(file = file_name, "uploaded package");
        Ok(())
    }
}
