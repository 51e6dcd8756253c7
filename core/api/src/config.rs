//! Client configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use passvault_common::{Error, Result};

/// Default service location.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Connection and storage settings for a [`crate::ApiGateway`] client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Service base URL; request paths are appended to it.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Directory holding the session database.
    pub data_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            user_agent: format!("PassVault/{}", env!("CARGO_PKG_VERSION")),
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("passvault"),
        }
    }
}

impl ClientConfig {
    /// Load a configuration file. Missing fields take their defaults.
    ///
    /// # Errors
    /// - File cannot be read
    /// - File is not valid JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Storage(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    ///
    /// # Errors
    /// - Directory or file cannot be written
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        let json =
            serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| Error::Storage(format!("Failed to write config {}: {}", path.display(), e)))
    }

    /// Check the base URL and timeout.
    ///
    /// # Errors
    /// - `InvalidInput` for a non-HTTP(S) or unparseable URL, or a zero timeout
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| Error::InvalidInput(format!("Invalid server URL '{}': {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidInput(format!(
                "Server URL must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::InvalidInput(
                "Timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Location of the session database.
    pub fn session_db_path(&self) -> PathBuf {
        self.data_dir.join("session.db")
    }
}
