//! Error types for compliance server operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while talking to a compliance server.
#[derive(Debug, Error)]
pub enum ComplianceError {
    /// No server is configured.
    #[error("no compliance server configured (set `server` in {path} or pass --server)")]
    NotConfigured {
        /// Configuration file that was consulted.
        path: PathBuf,
    },

    /// Failed to connect to the server.
    #[error("failed to connect to compliance server at {url}: {source}")]
    ConnectionFailed {
        /// Server URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The server rejected the credentials.
    #[error("authentication failed: {message}")]
    AuthenticationFailed {
        /// Error message.
        message: String,
    },

    /// Profile not found on the server.
    #[error("profile not found: {owner}/{name}")]
    NotFound {
        /// Owning user or organisation.
        owner: String,
        /// Profile name.
        name: String,
    },

    /// HTTP error from the server.
    #[error("HTTP error from compliance server: {status} - {message}")]
    HttpError {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// The server answered with an unexpected body.
    #[error("invalid response from compliance server: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },

    /// Configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    IoError {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON.
    #[error("invalid configuration in {path}: {source}")]
    ConfigError {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Invalid server URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// URL string.
        url: String,
    },

    /// The async runtime for blocking calls could not be started.
    #[error("failed to start async runtime: {source}")]
    Runtime {
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for ComplianceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::ConnectionFailed {
                url: err
                    .url()
                    .map_or_else(|| "unknown".to_string(), ToString::to_string),
                source: err,
            }
        } else if err.is_decode() {
            Self::InvalidResponse {
                message: err.to_string(),
            }
        } else {
            Self::HttpError {
                status: err.status().map_or(0, |s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }
}

/// Result type for compliance operations.
pub type Result<T> = std::result::Result<T, ComplianceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = ComplianceError::NotFound {
            owner: "admin".to_string(),
            name: "ssh".to_string(),
        };
        assert_eq!(err.to_string(), "profile not found: admin/ssh");
    }

    #[test]
    fn test_error_display_http() {
        let err = ComplianceError::HttpError {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error from compliance server: 500 - boom");
    }

    #[test]
    fn test_error_display_not_configured() {
        let err = ComplianceError::NotConfigured {
            path: PathBuf::from("/home/u/.vulcano/compliance/config.json"),
        };
        assert!(err.to_string().contains("config.json"));
    }
}
