//! Configuration types for the compliance client.
//!
//! [`ComplianceConfig`] is what the client runs with. [`StoredConfig`] is the
//! JSON file written by a login flow elsewhere; this crate only reads it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ComplianceError, Result};

/// Default API prefix on the compliance server.
pub const DEFAULT_API_PATH: &str = "/api";

/// Environment variable overriding the vulcano home directory.
pub const HOME_ENV: &str = "VULCANO_HOME";

/// Configuration for the compliance client.
#[derive(Debug, Clone)]
pub struct ComplianceConfig {
    /// Server URL (e.g., "<https://compliance.example.com>").
    pub server: String,

    /// API prefix appended to the server URL.
    pub api_path: String,

    /// User the token belongs to; the default profile owner.
    pub user: Option<String>,

    /// Bearer token.
    pub token: Option<String>,

    /// Accept invalid TLS certificates.
    pub insecure: bool,

    /// Request timeout.
    pub timeout: Duration,

    /// User agent string.
    pub user_agent: String,
}

impl ComplianceConfig {
    /// Creates a configuration for the given server.
    ///
    /// # Examples
    ///
    /// ```
    /// use vulcano_compliance::ComplianceConfig;
    ///
    /// let config = ComplianceConfig::new("https://compliance.example.com/");
    /// assert_eq!(config.api_url(), "https://compliance.example.com/api");
    /// ```
    #[must_use]
    pub fn new(server: impl Into<String>) -> Self {
        let server: String = server.into();
        Self {
            server: server.trim_end_matches('/').to_string(),
            api_path: DEFAULT_API_PATH.to_string(),
            user: None,
            token: None,
            insecure: false,
            timeout: Duration::from_secs(30),
            user_agent: format!("vulcano-compliance/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the API prefix.
    #[must_use]
    pub fn with_api_path(mut self, api_path: impl Into<String>) -> Self {
        let api_path: String = api_path.into();
        self.api_path = if api_path.is_empty() || api_path.starts_with('/') {
            api_path
        } else {
            format!("/{api_path}")
        };
        self
    }

    /// Sets the user.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Accepts invalid TLS certificates.
    #[must_use]
    pub const fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL of the API.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("{}{}", self.server, self.api_path)
    }
}

/// The on-disk compliance configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConfig {
    /// Server URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Logged-in user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Accept invalid TLS certificates.
    #[serde(default)]
    pub insecure: bool,
    /// API prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apipath: Option<String>,
}

impl StoredConfig {
    /// Location of the configuration file.
    ///
    /// `$VULCANO_HOME/compliance/config.json` when the variable is set,
    /// otherwise `~/.vulcano/compliance/config.json`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home = std::env::var_os(HOME_ENV).map_or_else(
            || {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".vulcano")
            },
            PathBuf::from,
        );
        home.join("compliance").join("config.json")
    }

    /// Loads the configuration from the default location.
    ///
    /// # Errors
    ///
    /// See [`StoredConfig::load_from`].
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Loads the configuration from `path`. A missing file is an empty
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No compliance configuration file");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ComplianceError::IoError {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| ComplianceError::ConfigError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Merges overrides on top of the stored values. Overrides win.
    #[must_use]
    pub fn merge(mut self, overrides: Self) -> Self {
        self.server = overrides.server.or(self.server);
        self.user = overrides.user.or(self.user);
        self.token = overrides.token.or(self.token);
        self.insecure |= overrides.insecure;
        self.apipath = overrides.apipath.or(self.apipath);
        self
    }

    /// Builds a client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ComplianceError::NotConfigured`] when no server is set;
    /// `origin` names the file consulted.
    pub fn into_config(self, origin: &Path) -> Result<ComplianceConfig> {
        let server = self
            .server
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ComplianceError::NotConfigured {
                path: origin.to_path_buf(),
            })?;

        let mut config = ComplianceConfig::new(server).with_insecure(self.insecure);
        if let Some(api_path) = self.apipath {
            config = config.with_api_path(api_path);
        }
        if let Some(user) = self.user {
            config = config.with_user(user);
        }
        if let Some(token) = self.token {
            config = config.with_token(token);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = ComplianceConfig::new("https://c.example.com");
        assert_eq!(config.api_path, "/api");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("vulcano-compliance/"));
        assert!(!config.insecure);
    }

    #[test]
    fn test_api_path_normalization() {
        let config = ComplianceConfig::new("https://c.example.com").with_api_path("v2");
        assert_eq!(config.api_url(), "https://c.example.com/v2");
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let stored = StoredConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(stored, StoredConfig::default());
    }

    #[test]
    fn test_load_and_convert() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"server": "https://c.example.com", "user": "admin", "token": "t0k", "insecure": true}"#,
        )
        .unwrap();

        let config = StoredConfig::load_from(&path)
            .unwrap()
            .into_config(&path)
            .unwrap();
        assert_eq!(config.server, "https://c.example.com");
        assert_eq!(config.user.as_deref(), Some("admin"));
        assert_eq!(config.token.as_deref(), Some("t0k"));
        assert!(config.insecure);
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            StoredConfig::load_from(&path),
            Err(ComplianceError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_no_server_is_not_configured() {
        let path = PathBuf::from("config.json");
        assert!(matches!(
            StoredConfig::default().into_config(&path),
            Err(ComplianceError::NotConfigured { .. })
        ));
    }

    #[test]
    fn test_merge_overrides_win() {
        let stored = StoredConfig {
            server: Some("https://old".to_string()),
            user: Some("admin".to_string()),
            ..StoredConfig::default()
        };
        let merged = stored.merge(StoredConfig {
            server: Some("https://new".to_string()),
            ..StoredConfig::default()
        });
        assert_eq!(merged.server.as_deref(), Some("https://new"));
        assert_eq!(merged.user.as_deref(), Some("admin"));
    }
}
