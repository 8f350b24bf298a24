//! Profile references and metadata.
//!
//! A [`ProfileRef`] names where profile content comes from: a local file or
//! directory, an inline string, or a remote location that a
//! [`ProfileFetcher`] can turn into content.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Scheme used for profiles hosted on a compliance server.
pub const COMPLIANCE_SCHEME: &str = "compliance";

/// Name of the optional metadata file in a profile directory.
pub const METADATA_FILE: &str = "vulcano.yml";

/// Extension of profile source files.
pub const PROFILE_EXTENSION: &str = "vul";

/// A remote profile location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteRef {
    /// Plain HTTP(S) URL returning profile source.
    Url(Url),
    /// Profile stored on the compliance server.
    Compliance {
        /// Owning user or organisation.
        owner: String,
        /// Profile name.
        name: String,
    },
}

impl RemoteRef {
    /// Profile ID implied by the reference.
    #[must_use]
    pub fn profile_id(&self) -> String {
        match self {
            Self::Url(url) => url
                .path_segments()
                .and_then(|mut s| s.next_back())
                .filter(|s| !s.is_empty())
                .map_or_else(
                    || url.host_str().unwrap_or("remote").to_string(),
                    |s| s.trim_end_matches(".vul").to_string(),
                ),
            Self::Compliance { owner, name } => format!("{owner}/{name}"),
        }
    }
}

impl fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::Compliance { owner, name } => write!(f, "{COMPLIANCE_SCHEME}://{owner}/{name}"),
        }
    }
}

/// Where a profile's content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileRef {
    /// A `.vul` file or a directory of them.
    Path(PathBuf),
    /// Content supplied directly.
    Inline {
        /// Source identifier used in error messages.
        name: String,
        /// Profile source text.
        content: String,
        /// Line number of the first line of `content`.
        line: usize,
    },
    /// A remote profile.
    Remote(RemoteRef),
}

impl ProfileRef {
    /// Parses a command-line reference.
    ///
    /// `compliance://OWNER/NAME` and `http(s)://` URLs are remote; anything
    /// else is a local path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidReference`] for malformed remote references.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use vulcano_core::{ProfileRef, RemoteRef};
    ///
    /// let r = ProfileRef::parse("compliance://admin/linux-baseline").unwrap();
    /// assert_eq!(
    ///     r,
    ///     ProfileRef::Remote(RemoteRef::Compliance {
    ///         owner: "admin".into(),
    ///         name: "linux-baseline".into(),
    ///     })
    /// );
    /// assert!(matches!(ProfileRef::parse("./profiles").unwrap(), ProfileRef::Path(_)));
    /// ```
    pub fn parse(reference: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidReference {
            reference: reference.to_string(),
            reason: reason.to_string(),
        };

        if let Some(rest) = reference.strip_prefix("compliance://") {
            let (owner, name) = rest
                .split_once('/')
                .ok_or_else(|| invalid("expected compliance://OWNER/NAME"))?;
            if owner.is_empty() || name.is_empty() || name.contains('/') {
                return Err(invalid("expected compliance://OWNER/NAME"));
            }
            return Ok(Self::Remote(RemoteRef::Compliance {
                owner: owner.to_string(),
                name: name.to_string(),
            }));
        }

        if reference.starts_with("http://") || reference.starts_with("https://") {
            let url = Url::parse(reference).map_err(|e| invalid(&e.to_string()))?;
            return Ok(Self::Remote(RemoteRef::Url(url)));
        }

        if reference.is_empty() {
            return Err(invalid("empty reference"));
        }
        Ok(Self::Path(PathBuf::from(reference)))
    }

    /// Inline content starting at line 1.
    #[must_use]
    pub fn inline(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Inline {
            name: name.into(),
            content: content.into(),
            line: 1,
        }
    }
}

impl FromStr for ProfileRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ProfileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Inline { name, .. } => f.write_str(name),
            Self::Remote(remote) => write!(f, "{remote}"),
        }
    }
}

/// Contents of a profile directory's `vulcano.yml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileMetadata {
    /// Profile ID.
    pub name: String,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Profile version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Maintainer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer: Option<String>,
    /// One-line summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// License identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

impl ProfileMetadata {
    /// Parses metadata from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Metadata`] when the YAML is malformed or lacks a
    /// name.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// Turns remote references into profile source.
pub trait ProfileFetcher: Send + Sync {
    /// Fetches the source of a remote profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] when the profile cannot be retrieved.
    fn fetch(&self, reference: &RemoteRef) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path() {
        assert_eq!(
            ProfileRef::parse("profiles/base.vul").unwrap(),
            ProfileRef::Path(PathBuf::from("profiles/base.vul"))
        );
    }

    #[test]
    fn test_parse_url() {
        let r: ProfileRef = "https://example.com/profiles/ssh.vul".parse().unwrap();
        match r {
            ProfileRef::Remote(remote) => assert_eq!(remote.profile_id(), "ssh"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_invalid_compliance_reference() {
        for bad in ["compliance://admin", "compliance:///x", "compliance://a/b/c"] {
            assert!(
                matches!(ProfileRef::parse(bad), Err(Error::InvalidReference { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_display_round_trip() {
        let text = "compliance://admin/ssh";
        assert_eq!(ProfileRef::parse(text).unwrap().to_string(), text);
        assert_eq!(ProfileRef::inline("inline", "rule 'a' do end").to_string(), "inline");
    }

    #[test]
    fn test_metadata_from_yaml() {
        let meta = ProfileMetadata::from_yaml(
            "name: linux-baseline\ntitle: Linux Baseline\nversion: 2.1.0\n",
        )
        .unwrap();
        assert_eq!(meta.name, "linux-baseline");
        assert_eq!(meta.version.as_deref(), Some("2.1.0"));
        assert_eq!(meta.license, None);
    }

    #[test]
    fn test_metadata_requires_name() {
        assert!(matches!(
            ProfileMetadata::from_yaml("title: nameless\n"),
            Err(Error::Metadata(_))
        ));
    }
}
