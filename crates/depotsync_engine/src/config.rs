//! Configuration for the sync engine.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the package store (e.g. "http://localhost:5001").
    pub store_base_url: String,
    /// Directory where downloads are staged before placement.
    pub cache_dir: PathBuf,
    /// Optional bearer token for store requests.
    pub auth_token: Option<String>,
    /// Connect timeout for store requests.
    pub connect_timeout: Duration,
    /// Timeout for catalog requests.
    pub request_timeout: Duration,
    /// Timeout for package downloads and uploads.
    pub transfer_timeout: Duration,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(store_base_url: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_base_url: store_base_url.into(),
            cache_dir: cache_dir.into(),
            auth_token: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            transfer_timeout: Duration::from_secs(60),
        }
    }

    /// Sets the auth token sent with store requests.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the catalog request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the package transfer timeout.
    pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    /// Returns the staging path for a package download.
    ///
    /// Derived deterministically from the package name so that repeated
    /// cycles reuse the same slot. Cycles run sequentially, so no
    /// cross-cycle collision handling is needed.
    pub fn staging_path(&self, package_name: &str) -> PathBuf {
        self.cache_dir.join(package_name)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("", "cache")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = SyncConfig::new("http://store.example.com", "/var/cache/depotsync")
            .with_auth_token("secret")
            .with_request_timeout(Duration::from_secs(5))
            .with_transfer_timeout(Duration::from_secs(120));

        assert_eq!(config.store_base_url, "http://store.example.com");
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.transfer_timeout, Duration::from_secs(120));
    }

    #[test]
    fn staging_path_is_keyed_by_name() {
        let config = SyncConfig::new("http://store", "/tmp/stage");
        assert_eq!(
            config.staging_path("Agent_1.2.3.zip"),
            PathBuf::from("/tmp/stage/Agent_1.2.3.zip")
        );
    }
}
