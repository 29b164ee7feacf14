//! Daemon configuration file parsing (depotsync.toml).

use depotsync_engine::SyncConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "depotsync.toml";

/// Daemon configuration.
///
/// Every field has a default, so an absent config file yields a runnable
/// (localhost) configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Seconds to sleep between sync cycles.
    pub poll_interval_secs: u64,
    /// Path of the SQLite database holding sync state.
    pub database_path: PathBuf,
    /// Base URL of the package store.
    pub store_base_url: String,
    /// Optional bearer token for store requests.
    pub auth_token: Option<String>,
    /// Directory where downloads are staged.
    pub cache_dir: PathBuf,
    /// Default tracing filter, overridable via `RUST_LOG`.
    pub log_filter: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            database_path: PathBuf::from("depotsync.db"),
            store_base_url: "http://localhost:5001".to_string(),
            auth_token: None,
            cache_dir: PathBuf::from("cache"),
            log_filter: "info".to_string(),
        }
    }
}

impl DaemonConfig {
    /// Loads configuration.
    ///
    /// An explicitly given path must exist and parse. Without one, the
    /// default file name is tried in the working directory and falls
    /// back to defaults if absent.
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
                Ok(toml::from_str(&content)?)
            }
            None => {
                let default_path = Path::new(CONFIG_FILE);
                if default_path.exists() {
                    let content = std::fs::read_to_string(default_path)?;
                    Ok(toml::from_str(&content)?)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// The inter-cycle sleep.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Builds the engine configuration.
    pub fn sync_config(&self) -> SyncConfig {
        let config = SyncConfig::new(&self.store_base_url, &self.cache_dir);
        match &self.auth_token {
            Some(token) => config.with_auth_token(token),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_runnable() {
        let config = DaemonConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(300));
        assert_eq!(config.store_base_url, "http://localhost:5001");
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            poll_interval_secs = 60
            database_path = "/var/lib/depotsync/state.db"
            store_base_url = "https://store.example.com"
            auth_token = "secret"
            cache_dir = "/var/cache/depotsync"
            log_filter = "debug"
        "#;

        let config: DaemonConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(
            config.database_path,
            PathBuf::from("/var/lib/depotsync/state.db")
        );
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: DaemonConfig = toml::from_str("poll_interval_secs = 5").unwrap();
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.cache_dir, PathBuf::from("cache"));
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "store_base_url = \"http://store:9999\"").unwrap();

        let config = DaemonConfig::load(Some(&path)).unwrap();
        assert_eq!(config.store_base_url, "http://store:9999");
    }

    #[test]
    fn load_missing_explicit_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = DaemonConfig::load(Some(&dir.path().join("nope.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn sync_config_carries_token() {
        let mut config = DaemonConfig::default();
        config.auth_token = Some("tok".into());
        let sync = config.sync_config();
        assert_eq!(sync.auth_token.as_deref(), Some("tok"));
        assert_eq!(sync.store_base_url, "http://localhost:5001");
    }
}
