//! Pack manifest
//!
//! The optional `manifest.json` member declares the pack schema, the owning
//! project and the exact member list. A manifest that disagrees with the
//! actual members is reported as drift, never treated as fatal.

use crate::path::PackPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Member name of the manifest
pub const MANIFEST_PATH: &str = "manifest.json";

/// Schema identifier written by this crate
pub const MANIFEST_SCHEMA: &str = "specpack/v1";

/// Parsed manifest document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Schema identifier
    pub schema: String,
    /// Owning project
    pub project_id: String,
    /// Creation timestamp (placeholder for reproducible packs)
    pub created_at: String,
    /// Declared members, manifest included
    pub contents: Vec<PackPath>,
}

impl Manifest {
    /// Declared members as a set
    #[must_use]
    pub fn declared(&self) -> BTreeSet<&PackPath> {
        self.contents.iter().collect()
    }
}

/// Advisory result of reading and cross-checking a pack manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestCheck {
    /// Manifest present and `contents` matches the members exactly
    Ok(Manifest),

    /// No manifest member
    Missing,

    /// Manifest member is not a valid manifest document
    Invalid {
        /// Parser message
        reason: String,
    },

    /// Manifest parsed but `contents` disagrees with the members
    Drift {
        /// The manifest as read
        manifest: Manifest,
        /// Declared but absent
        missing: Vec<PackPath>,
        /// Present but undeclared
        unlisted: Vec<PackPath>,
    },
}

impl ManifestCheck {
    /// Whether the manifest is present and consistent
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// The parsed manifest, if one could be read
    #[must_use]
    pub fn manifest(&self) -> Option<&Manifest> {
        match self {
            Self::Ok(manifest) | Self::Drift { manifest, .. } => Some(manifest),
            Self::Missing | Self::Invalid { .. } => None,
        }
    }

    /// One-line description for warnings
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Ok(_) => "manifest consistent".to_string(),
            Self::Missing => "manifest missing".to_string(),
            Self::Invalid { reason } => format!("manifest invalid: {reason}"),
            Self::Drift {
                missing, unlisted, ..
            } => format!(
                "manifest drift: {} declared but missing, {} present but unlisted",
                missing.len(),
                unlisted.len()
            ),
        }
    }
}
