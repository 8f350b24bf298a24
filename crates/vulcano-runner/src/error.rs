//! Error types for the Vulcano runner.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for target resolution.
pub type Result<T> = std::result::Result<T, ResolutionError>;

/// A profile reference could not be turned into content.
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// The path does not exist.
    #[error("profile not found: {path}")]
    NotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// I/O error with path context.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path involved in the operation.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A directory contains no profile sources.
    #[error("no .vul files found in {path}")]
    Empty {
        /// Directory that was scanned.
        path: PathBuf,
    },

    /// A file is not a profile source.
    #[error("not a profile source (expected .vul): {path}")]
    NotAProfile {
        /// Offending file.
        path: PathBuf,
    },

    /// The profile metadata file is malformed.
    #[error("invalid profile metadata in {path}: {source}")]
    Metadata {
        /// Metadata file.
        path: PathBuf,
        /// Parse error.
        #[source]
        source: vulcano_core::Error,
    },

    /// A remote reference was given but no fetcher is configured.
    #[error("cannot fetch {reference}: no remote source configured")]
    NoFetcher {
        /// The remote reference.
        reference: String,
    },

    /// The fetcher failed.
    #[error(transparent)]
    Fetch(#[from] vulcano_core::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ResolutionError::NotFound {
            path: PathBuf::from("profiles/missing.vul"),
        };
        assert_eq!(err.to_string(), "profile not found: profiles/missing.vul");
    }

    #[test]
    fn test_fetch_error_is_transparent() {
        let err = ResolutionError::from(vulcano_core::Error::Fetch {
            reference: "compliance://admin/base".to_string(),
            message: "404 Not Found".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "failed to fetch compliance://admin/base: 404 Not Found"
        );
    }
}
