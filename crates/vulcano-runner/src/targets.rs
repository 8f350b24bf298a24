//! Target resolution.
//!
//! Turns [`ProfileRef`]s into [`ResolvedSource`]s: profile source text
//! with a source ID, a line offset and a content digest.
//!
//! # Resolution rules
//!
//! 1. A `.vul` file resolves to one source
//! 2. A directory resolves to every `.vul` file below it, sorted by path;
//!    an optional `vulcano.yml` names the profile
//! 3. Inline content resolves to itself
//! 4. Remote references are handed to the configured [`ProfileFetcher`]
//!
//! One bad reference never stops the others from resolving; its error is
//! collected in [`Resolution::errors`].

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use vulcano_core::profile::{METADATA_FILE, PROFILE_EXTENSION};
use vulcano_core::{ProfileFetcher, ProfileMetadata, ProfileRef};

use crate::error::{ResolutionError, Result};

/// One unit of profile source ready for evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// Profile the source belongs to.
    pub profile_id: String,
    /// Source identifier used for error attribution.
    pub source_id: String,
    /// Profile source text.
    pub content: String,
    /// Line number of the first line of `content`.
    pub line_offset: usize,
    /// Hex SHA-256 of `content`.
    pub sha256: String,
    /// Metadata of the enclosing profile directory.
    pub metadata: Option<ProfileMetadata>,
}

impl ResolvedSource {
    /// Creates a source, computing its digest.
    #[must_use]
    pub fn new(
        profile_id: impl Into<String>,
        source_id: impl Into<String>,
        content: impl Into<String>,
        line_offset: usize,
    ) -> Self {
        let content = content.into();
        Self {
            profile_id: profile_id.into(),
            source_id: source_id.into(),
            sha256: digest(&content),
            content,
            line_offset: line_offset.max(1),
            metadata: None,
        }
    }

    /// Attaches profile metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Option<ProfileMetadata>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Output of resolving a batch of references.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Sources in reference order.
    pub sources: Vec<ResolvedSource>,
    /// References that failed, with their errors.
    pub errors: Vec<(String, ResolutionError)>,
}

/// Resolves profile references.
#[derive(Clone)]
pub struct Resolver {
    fetcher: Option<Arc<dyn ProfileFetcher>>,
    line_offset: usize,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("remote", &self.fetcher.is_some())
            .field("line_offset", &self.line_offset)
            .finish()
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// Creates a resolver for local and inline references.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fetcher: None,
            line_offset: 1,
        }
    }

    /// Sets the fetcher used for remote references.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ProfileFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Sets the line offset of file and remote sources.
    #[must_use]
    pub fn with_line_offset(mut self, line_offset: usize) -> Self {
        self.line_offset = line_offset.max(1);
        self
    }

    /// Resolves every reference, preserving input order.
    #[must_use]
    pub fn resolve(&self, references: &[ProfileRef]) -> Resolution {
        let mut resolution = Resolution::default();
        for reference in references {
            match self.resolve_one(reference) {
                Ok(sources) => resolution.sources.extend(sources),
                Err(e) => {
                    warn!(reference = %reference, error = %e, "Failed to resolve profile");
                    resolution.errors.push((reference.to_string(), e));
                }
            }
        }
        info!(
            sources = resolution.sources.len(),
            failed = resolution.errors.len(),
            "Resolved profiles"
        );
        resolution
    }

    /// Resolves one reference.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionError`] when the reference names nothing
    /// readable.
    pub fn resolve_one(&self, reference: &ProfileRef) -> Result<Vec<ResolvedSource>> {
        match reference {
            ProfileRef::Path(path) => self.resolve_path(path),
            ProfileRef::Inline {
                name,
                content,
                line,
            } => Ok(vec![ResolvedSource::new(name, name, content.as_str(), *line)]),
            ProfileRef::Remote(remote) => {
                let fetcher = self.fetcher.as_ref().ok_or_else(|| ResolutionError::NoFetcher {
                    reference: remote.to_string(),
                })?;
                let content = fetcher.fetch(remote)?;
                debug!(reference = %remote, bytes = content.len(), "Fetched remote profile");
                Ok(vec![ResolvedSource::new(
                    remote.profile_id(),
                    remote.to_string(),
                    content,
                    self.line_offset,
                )])
            }
        }
    }

    fn resolve_path(&self, path: &Path) -> Result<Vec<ResolvedSource>> {
        if !path.exists() {
            return Err(ResolutionError::NotFound {
                path: path.to_path_buf(),
            });
        }
        if path.is_dir() {
            return self.resolve_dir(path);
        }
        if path.extension() != Some(OsStr::new(PROFILE_EXTENSION)) {
            return Err(ResolutionError::NotAProfile {
                path: path.to_path_buf(),
            });
        }

        let metadata = path.parent().map(read_metadata).transpose()?.flatten();
        let profile_id = metadata
            .as_ref()
            .map_or_else(|| file_stem(path), |m| m.name.clone());
        let content = read(path)?;
        Ok(vec![ResolvedSource::new(
            profile_id,
            path.display().to_string(),
            content,
            self.line_offset,
        )
        .with_metadata(metadata)])
    }

    fn resolve_dir(&self, dir: &Path) -> Result<Vec<ResolvedSource>> {
        let metadata = read_metadata(dir)?;
        let profile_id = metadata
            .as_ref()
            .map_or_else(|| file_stem(dir), |m| m.name.clone());

        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension() == Some(OsStr::new(PROFILE_EXTENSION)))
            .map(walkdir::DirEntry::into_path)
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(ResolutionError::Empty {
                path: dir.to_path_buf(),
            });
        }

        debug!(dir = %dir.display(), files = files.len(), profile_id = %profile_id, "Scanned profile directory");
        files
            .iter()
            .map(|file| {
                Ok(ResolvedSource::new(
                    profile_id.clone(),
                    file.display().to_string(),
                    read(file)?,
                    self.line_offset,
                )
                .with_metadata(metadata.clone()))
            })
            .collect()
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| ResolutionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_metadata(dir: &Path) -> Result<Option<ProfileMetadata>> {
    let path = dir.join(METADATA_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let yaml = read(&path)?;
    ProfileMetadata::from_yaml(&yaml)
        .map(Some)
        .map_err(|source| ResolutionError::Metadata { path, source })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned())
}

/// Hex SHA-256 of `content`.
#[must_use]
pub fn digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vulcano_core::RemoteRef;

    struct StaticFetcher;

    impl ProfileFetcher for StaticFetcher {
        fn fetch(&self, reference: &RemoteRef) -> vulcano_core::Result<String> {
            match reference {
                RemoteRef::Compliance { name, .. } if name == "base" => {
                    Ok("rule 'remote' do\nend\n".to_string())
                }
                other => Err(vulcano_core::Error::Fetch {
                    reference: other.to_string(),
                    message: "404 Not Found".to_string(),
                }),
            }
        }
    }

    fn profile_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.vul"), "rule 'b' do\nend\n").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/a.vul"), "rule 'a' do\nend\n").unwrap();
        fs::write(dir.path().join("README.md"), "ignored").unwrap();
        dir
    }

    #[test]
    fn test_resolve_directory_sorted() {
        let dir = profile_dir();
        let sources = Resolver::new()
            .resolve_one(&ProfileRef::Path(dir.path().to_path_buf()))
            .unwrap();
        assert_eq!(sources.len(), 2);
        assert!(sources[0].source_id.ends_with("b.vul"));
        assert!(sources[1].source_id.ends_with("a.vul"));
        assert!(sources.iter().all(|s| s.line_offset == 1));
    }

    #[test]
    fn test_metadata_names_profile() {
        let dir = profile_dir();
        fs::write(
            dir.path().join(METADATA_FILE),
            "name: linux-baseline\ntitle: Linux Baseline\nversion: 1.0.0\n",
        )
        .unwrap();
        let sources = Resolver::new()
            .resolve_one(&ProfileRef::Path(dir.path().to_path_buf()))
            .unwrap();
        assert!(sources.iter().all(|s| s.profile_id == "linux-baseline"));
        assert_eq!(
            sources[0].metadata.as_ref().and_then(|m| m.version.as_deref()),
            Some("1.0.0")
        );
    }

    #[test]
    fn test_single_file_uses_stem() {
        let dir = profile_dir();
        let sources = Resolver::new()
            .resolve_one(&ProfileRef::Path(dir.path().join("b.vul")))
            .unwrap();
        assert_eq!(sources[0].profile_id, "b");
        assert_eq!(sources[0].sha256, digest("rule 'b' do\nend\n"));
    }

    #[test]
    fn test_errors_are_collected_per_reference() {
        let dir = profile_dir();
        let refs = vec![
            ProfileRef::Path(dir.path().join("missing.vul")),
            ProfileRef::inline("inline", "rule 'i' do\nend\n"),
            ProfileRef::Path(dir.path().join("README.md")),
        ];
        let resolution = Resolver::new().resolve(&refs);
        assert_eq!(resolution.sources.len(), 1);
        assert_eq!(resolution.sources[0].source_id, "inline");
        assert_eq!(resolution.errors.len(), 2);
        assert!(matches!(resolution.errors[0].1, ResolutionError::NotFound { .. }));
        assert!(matches!(resolution.errors[1].1, ResolutionError::NotAProfile { .. }));
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        let err = Resolver::new()
            .resolve_one(&ProfileRef::Path(dir.path().to_path_buf()))
            .unwrap_err();
        assert!(matches!(err, ResolutionError::Empty { .. }));
    }

    #[test]
    fn test_remote_references() {
        let remote = ProfileRef::parse("compliance://admin/base").unwrap();
        assert!(matches!(
            Resolver::new().resolve_one(&remote),
            Err(ResolutionError::NoFetcher { .. })
        ));

        let resolver = Resolver::new().with_fetcher(Arc::new(StaticFetcher));
        let sources = resolver.resolve_one(&remote).unwrap();
        assert_eq!(sources[0].profile_id, "admin/base");
        assert_eq!(sources[0].source_id, "compliance://admin/base");

        let missing = ProfileRef::parse("compliance://admin/other").unwrap();
        assert!(matches!(
            resolver.resolve_one(&missing),
            Err(ResolutionError::Fetch(_))
        ));
    }

    #[test]
    fn test_inline_keeps_line() {
        let reference = ProfileRef::Inline {
            name: "snippet".to_string(),
            content: "rule 'x' do\nend\n".to_string(),
            line: 40,
        };
        let sources = Resolver::new().resolve_one(&reference).unwrap();
        assert_eq!(sources[0].line_offset, 40);
    }
}
