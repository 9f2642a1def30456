//! Pack member paths
//!
//! Provides [`PackPath`], the validated name of a file inside a Spec Pack.

use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Path of a file within a pack
///
/// Forward-slash separated, relative, case-sensitive. Ordering is plain byte
/// order, which is the order members are serialized in.
///
/// # Examples
/// - `manifest.json`
/// - `ux/flows.json`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackPath(String);

impl PackPath {
    /// Validate and wrap a path
    ///
    /// # Errors
    /// Returns error if the path is empty, absolute, a directory, contains a
    /// backslash or NUL, or has an empty, `.` or `..` segment.
    pub fn new(path: impl Into<String>) -> Result<Self, PathError> {
        let path = path.into();
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        if path.starts_with('/') {
            return Err(PathError::Absolute(path));
        }
        if path.ends_with('/') {
            return Err(PathError::Directory(path));
        }
        if let Some(c) = path.chars().find(|c| *c == '\\' || *c == '\0') {
            return Err(PathError::InvalidCharacter { path, character: c });
        }
        if path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(PathError::InvalidSegment(path));
        }
        Ok(Self(path))
    }

    /// Path as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments
    #[inline]
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Final segment
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Extension of the final segment, without the dot
    #[inline]
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&name[idx + 1..]),
        }
    }

    /// Check if path lives under a directory prefix (e.g. `assets`)
    #[inline]
    #[must_use]
    pub fn is_under(&self, dir: &str) -> bool {
        self.0
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl Display for PackPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PackPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for PackPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PackPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for PackPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for PackPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Errors for invalid pack paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Empty path
    #[error("empty path")]
    Empty,

    /// Leading slash
    #[error("path must be relative: '{0}'")]
    Absolute(String),

    /// Trailing slash
    #[error("path names a directory: '{0}'")]
    Directory(String),

    /// Backslash or NUL
    #[error("invalid character {character:?} in path '{path}'")]
    InvalidCharacter {
        /// Offending path
        path: String,
        /// Offending character
        character: char,
    },

    /// Empty, `.` or `..` segment
    #[error("invalid segment in path '{0}'")]
    InvalidSegment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nested_relative_paths() {
        let path = PackPath::new("ux/flows.json").unwrap();
        assert_eq!(path.as_str(), "ux/flows.json");
        assert_eq!(path.segments().collect::<Vec<_>>(), vec!["ux", "flows.json"]);
        assert_eq!(path.file_name(), "flows.json");
        assert_eq!(path.extension(), Some("json"));
    }

    #[test]
    fn rejects_malformed_paths() {
        assert_eq!(PackPath::new(""), Err(PathError::Empty));
        assert!(matches!(PackPath::new("/etc/passwd"), Err(PathError::Absolute(_))));
        assert!(matches!(PackPath::new("assets/"), Err(PathError::Directory(_))));
        assert!(matches!(
            PackPath::new("a\\b"),
            Err(PathError::InvalidCharacter { character: '\\', .. })
        ));
        assert!(matches!(PackPath::new("a//b"), Err(PathError::InvalidSegment(_))));
        assert!(matches!(PackPath::new("../x"), Err(PathError::InvalidSegment(_))));
        assert!(matches!(PackPath::new("a/./b"), Err(PathError::InvalidSegment(_))));
    }

    #[test]
    fn paths_are_case_sensitive() {
        let lower = PackPath::new("readme.md").unwrap();
        let upper = PackPath::new("README.md").unwrap();
        assert_ne!(lower, upper);
        assert!(upper < lower);
    }

    #[test]
    fn extension_ignores_dotfiles() {
        assert_eq!(PackPath::new(".gitignore").unwrap().extension(), None);
        assert_eq!(PackPath::new("Makefile").unwrap().extension(), None);
    }

    #[test]
    fn is_under_matches_whole_segment() {
        let path = PackPath::new("assets/logo.png").unwrap();
        assert!(path.is_under("assets"));
        assert!(!path.is_under("asset"));
        assert!(!PackPath::new("assets").unwrap().is_under("assets"));
    }
}
