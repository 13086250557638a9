use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// An opaque Maven version identifier such as `3.9.4`.
///
/// Ordering is left to the repositories that publish versions; equality is an
/// exact string match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MavenVersion(String);

impl MavenVersion {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for MavenVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MavenVersion {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    #[error("Version must not be empty")]
    Empty,
    #[error("Version contains characters that are not allowed in a directory name: {input}")]
    InvalidCharacters { input: String },
}

impl FromStr for MavenVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionParseError::Empty);
        }

        // Versions name directories under the versions root.
        if s == "."
            || s == ".."
            || s.chars()
                .any(|c| matches!(c, '/' | '\\' | ':') || c.is_whitespace() || c.is_control())
        {
            return Err(VersionParseError::InvalidCharacters {
                input: s.to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// The version that applies to an invocation, as decided by a resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub version: MavenVersion,
    pub install_path: PathBuf,
    /// Human-readable description of where the version was set.
    pub origin: String,
}

/// On-disk state of a version directory under the versions root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Missing,
    /// Present on disk but not usable: extraction did not complete or the
    /// marker executable is absent.
    Tainted,
    Valid,
}

impl InstallState {
    #[must_use]
    pub fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}
