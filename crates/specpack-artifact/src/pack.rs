//! The Spec Pack model
//!
//! A [`Pack`] is an immutable, deduplicated set of named files kept in path
//! order, with a hash-map index for exact lookups. Every transformation goes
//! through [`PackBuilder`] and yields a new pack.

use crate::canonical::{canonical_document, PLACEHOLDER_TIMESTAMP};
use crate::hash::ContentHash;
use crate::manifest::{Manifest, ManifestCheck, MANIFEST_PATH, MANIFEST_SCHEMA};
use crate::path::{PackPath, PathError};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// A single pack member
///
/// Bytes are shared, so cloning a file (or a pack) never copies content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackFile {
    path: PackPath,
    bytes: Arc<[u8]>,
}

impl PackFile {
    /// Create a member
    #[inline]
    #[must_use]
    pub fn new(path: PackPath, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            path,
            bytes: bytes.into(),
        }
    }

    /// Member path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &PackPath {
        &self.path
    }

    /// Member content
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Content size in bytes
    #[inline]
    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Content digest
    #[inline]
    #[must_use]
    pub fn digest(&self) -> ContentHash {
        ContentHash::compute(&self.bytes)
    }

    /// Content as UTF-8, if it is
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    /// Content parsed as JSON, if it is
    ///
    /// # Errors
    /// Returns the parser error for non-JSON content
    pub fn as_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.bytes)
    }
}

/// Immutable Spec Pack
///
/// # Invariants
/// - paths are unique
/// - `files` is sorted by path
/// - `index[path]` is the position of `path` in `files`
#[derive(Debug, Clone, Default)]
pub struct Pack {
    files: Vec<PackFile>,
    index: HashMap<PackPath, usize>,
}

impl PartialEq for Pack {
    fn eq(&self, other: &Self) -> bool {
        self.files == other.files
    }
}

impl Eq for Pack {}

impl Pack {
    /// Empty pack
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a pack from `(path, bytes)` entries in any order
    ///
    /// # Errors
    /// Returns error if a path is invalid or appears twice
    pub fn from_entries<I, P, B>(entries: I) -> Result<Self, PackError>
    where
        I: IntoIterator<Item = (P, B)>,
        P: AsRef<str>,
        B: Into<Arc<[u8]>>,
    {
        let mut builder = PackBuilder::new();
        for (path, bytes) in entries {
            builder.insert_bytes(path.as_ref(), bytes)?;
        }
        Ok(builder.build())
    }

    fn from_sorted(map: BTreeMap<PackPath, Arc<[u8]>>) -> Self {
        let files: Vec<PackFile> = map
            .into_iter()
            .map(|(path, bytes)| PackFile { path, bytes })
            .collect();
        let index = files
            .iter()
            .enumerate()
            .map(|(i, f)| (f.path.clone(), i))
            .collect();
        Self { files, index }
    }

    /// Look up a member by exact path
    #[inline]
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&PackFile> {
        self.index.get(path).map(|&i| &self.files[i])
    }

    /// Check if a member exists
    #[inline]
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Members in path order
    #[inline]
    #[must_use]
    pub fn files(&self) -> &[PackFile] {
        &self.files
    }

    /// Member paths in order
    #[inline]
    pub fn paths(&self) -> impl Iterator<Item = &PackPath> {
        self.files.iter().map(PackFile::path)
    }

    /// Number of members
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the pack has no members
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Read and cross-check the manifest
    ///
    /// Never fails; problems are reported through [`ManifestCheck`].
    #[must_use]
    pub fn manifest(&self) -> ManifestCheck {
        let Some(file) = self.lookup(MANIFEST_PATH) else {
            return ManifestCheck::Missing;
        };
        let manifest: Manifest = match serde_json::from_slice(file.bytes()) {
            Ok(manifest) => manifest,
            Err(e) => {
                return ManifestCheck::Invalid {
                    reason: e.to_string(),
                }
            }
        };

        let declared = manifest.declared();
        let actual: BTreeSet<&PackPath> = self.paths().collect();
        let missing: Vec<PackPath> = declared.difference(&actual).map(|p| (*p).clone()).collect();
        let unlisted: Vec<PackPath> = actual.difference(&declared).map(|p| (*p).clone()).collect();

        if missing.is_empty() && unlisted.is_empty() {
            ManifestCheck::Ok(manifest)
        } else {
            ManifestCheck::Drift {
                manifest,
                missing,
                unlisted,
            }
        }
    }

    /// Project id declared by the manifest, if readable
    #[must_use]
    pub fn project_id(&self) -> Option<String> {
        self.manifest().manifest().map(|m| m.project_id.clone())
    }

    /// New pack whose manifest lists exactly the current members
    ///
    /// Keeps the existing schema, project and timestamp when a manifest can
    /// be read; otherwise writes a fresh one for `fallback_project`.
    ///
    /// # Errors
    /// Propagates builder errors (not expected for a well-formed pack)
    pub fn with_synced_manifest(&self, fallback_project: &str) -> Result<Self, PackError> {
        let existing = self.manifest().manifest().cloned();
        let mut builder = PackBuilder::from_pack(self);
        builder.remove(MANIFEST_PATH);
        match existing {
            Some(m) => builder.write_manifest(&m.schema, &m.project_id, &m.created_at)?,
            None => builder.write_manifest(MANIFEST_SCHEMA, fallback_project, PLACEHOLDER_TIMESTAMP)?,
        };
        Ok(builder.build())
    }
}

/// Builder for synthesizing packs from in-memory state
#[derive(Debug, Clone, Default)]
pub struct PackBuilder {
    files: BTreeMap<PackPath, Arc<[u8]>>,
}

impl PackBuilder {
    /// Empty builder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder seeded with an existing pack's members
    #[must_use]
    pub fn from_pack(pack: &Pack) -> Self {
        Self {
            files: pack
                .files
                .iter()
                .map(|f| (f.path.clone(), Arc::clone(&f.bytes)))
                .collect(),
        }
    }

    /// Add a new member
    ///
    /// # Errors
    /// Returns error if the path is invalid or already present
    pub fn insert_bytes(
        &mut self,
        path: &str,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<&mut Self, PackError> {
        let path = PackPath::new(path)?;
        if self.files.contains_key(&path) {
            return Err(PackError::DuplicatePath(path));
        }
        self.files.insert(path, bytes.into());
        Ok(self)
    }

    /// Add a JSON document in its canonical document form
    ///
    /// # Errors
    /// Returns error if the path is invalid or already present
    pub fn insert_json(&mut self, path: &str, value: &Value) -> Result<&mut Self, PackError> {
        self.insert_bytes(path, canonical_document(value))
    }

    /// Insert or replace a member
    pub fn upsert(&mut self, path: PackPath, bytes: impl Into<Arc<[u8]>>) -> &mut Self {
        self.files.insert(path, bytes.into());
        self
    }

    /// Copy a member from another pack, replacing any existing one
    pub fn copy_from(&mut self, file: &PackFile) -> &mut Self {
        self.files.insert(file.path.clone(), Arc::clone(&file.bytes));
        self
    }

    /// Remove a member; returns whether it existed
    pub fn remove(&mut self, path: &str) -> bool {
        self.files.remove(path).is_some()
    }

    /// Whether a member is present
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Write a manifest declaring exactly the members present at build time
    ///
    /// Uses the placeholder timestamp so the result is reproducible.
    ///
    /// # Errors
    /// Returns error if a manifest is already present
    pub fn with_manifest(&mut self, project_id: &str) -> Result<&mut Self, PackError> {
        self.write_manifest(MANIFEST_SCHEMA, project_id, PLACEHOLDER_TIMESTAMP)
    }

    fn write_manifest(
        &mut self,
        schema: &str,
        project_id: &str,
        created_at: &str,
    ) -> Result<&mut Self, PackError> {
        let manifest_path = PackPath::new(MANIFEST_PATH)?;
        if self.files.contains_key(&manifest_path) {
            return Err(PackError::DuplicatePath(manifest_path));
        }
        let mut contents: Vec<PackPath> = self.files.keys().cloned().collect();
        contents.push(manifest_path.clone());
        contents.sort();
        let manifest = Manifest {
            schema: schema.to_string(),
            project_id: project_id.to_string(),
            created_at: created_at.to_string(),
            contents,
        };
        let value = serde_json::to_value(&manifest).map_err(PackError::Manifest)?;
        self.files.insert(manifest_path, canonical_document(&value).into());
        Ok(self)
    }

    /// Finish the pack
    #[must_use]
    pub fn build(self) -> Pack {
        Pack::from_sorted(self.files)
    }
}

/// Errors constructing packs
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// Invalid member path
    #[error("invalid path: {0}")]
    Path(#[from] PathError),

    /// Same path inserted twice
    #[error("duplicate path: {0}")]
    DuplicatePath(PackPath),

    /// Manifest could not be encoded
    #[error("manifest encoding failed: {0}")]
    Manifest(#[source] serde_json::Error),
}
