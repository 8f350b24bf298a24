//! Target backends.
//!
//! A [`Backend`] is the only way resources reach the system under audit. The
//! local backend reads the host this process runs on; the mock backend serves
//! fixed content and is used throughout the test suites.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Operating system facts reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    /// Distribution or OS name (e.g. `ubuntu`, `macos`).
    pub name: String,
    /// OS family (e.g. `unix`, `windows`).
    pub family: String,
    /// Release string, empty when unknown.
    pub release: String,
    /// CPU architecture.
    pub arch: String,
}

/// Read-only access to a target.
pub trait Backend: fmt::Debug + Send + Sync {
    /// Reads a file as UTF-8 text. Returns `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an I/O error for anything other than a missing file.
    fn read_file(&self, path: &str) -> io::Result<Option<String>>;

    /// Describes the target operating system.
    fn os_info(&self) -> OsInfo;
}

/// Backend for the local host.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalBackend;

impl LocalBackend {
    /// Creates a new local backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Backend for LocalBackend {
    fn read_file(&self, path: &str) -> io::Result<Option<String>> {
        debug!(path, "Reading local file");
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn os_info(&self) -> OsInfo {
        let os_release = fs::read_to_string("/etc/os-release").unwrap_or_default();
        let field = |key: &str| {
            os_release.lines().find_map(|line| {
                line.strip_prefix(key)
                    .and_then(|rest| rest.strip_prefix('='))
                    .map(|v| v.trim_matches('"').to_string())
            })
        };

        OsInfo {
            name: field("ID").unwrap_or_else(|| std::env::consts::OS.to_string()),
            family: std::env::consts::FAMILY.to_string(),
            release: field("VERSION_ID").unwrap_or_default(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// In-memory backend with fixed files and OS facts.
///
/// # Examples
///
/// ```rust
/// use vulcano_core::{Backend, MockBackend};
///
/// let backend = MockBackend::new().with_file("/etc/hostname", "web-01\n");
/// assert_eq!(backend.read_file("/etc/hostname").unwrap().as_deref(), Some("web-01\n"));
/// assert!(backend.read_file("/etc/missing").unwrap().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct MockBackend {
    files: HashMap<String, String>,
    unreadable: Vec<String>,
    os: OsInfo,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Creates an empty mock backend describing a generic Linux host.
    #[must_use]
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            unreadable: Vec::new(),
            os: OsInfo {
                name: "mock".to_string(),
                family: "unix".to_string(),
                release: "1.0".to_string(),
                arch: "x86_64".to_string(),
            },
        }
    }

    /// Adds a file.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    /// Marks a path as unreadable (permission denied).
    #[must_use]
    pub fn with_unreadable(mut self, path: impl Into<String>) -> Self {
        self.unreadable.push(path.into());
        self
    }

    /// Overrides the OS facts.
    #[must_use]
    pub fn with_os(mut self, os: OsInfo) -> Self {
        self.os = os;
        self
    }
}

impl Backend for MockBackend {
    fn read_file(&self, path: &str) -> io::Result<Option<String>> {
        if self.unreadable.iter().any(|p| p == path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {path}"),
            ));
        }
        Ok(self.files.get(path).cloned())
    }

    fn os_info(&self) -> OsInfo {
        self.os.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_backend_files() {
        let backend = MockBackend::new().with_file("/etc/passwd", "root:x:0:0::/root:/bin/sh");
        assert!(backend.read_file("/etc/passwd").unwrap().is_some());
        assert!(backend.read_file("/etc/shadow").unwrap().is_none());
    }

    #[test]
    fn test_mock_backend_unreadable() {
        let backend = MockBackend::new().with_unreadable("/etc/shadow");
        let err = backend.read_file("/etc/shadow").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_local_backend_missing_file() {
        let backend = LocalBackend::new();
        let result = backend.read_file("/definitely/not/here/vulcano").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_local_backend_os_info() {
        let info = LocalBackend::new().os_info();
        assert_eq!(info.arch, std::env::consts::ARCH);
        assert!(!info.family.is_empty());
    }
}
