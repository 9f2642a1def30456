//! Hash-guarded patches
//!
//! A [`Patch`] is a [`Diff`] made applyable: every op that touches an
//! existing member carries the digest that member must still have when the
//! patch is applied. Patches are immutable values and serialize to canonical
//! JSON, so they can be persisted as proposals independent of any apply.

use crate::diff::{Diff, DiffKind, DiffStats};
use serde::{Deserialize, Serialize};
use specpack_artifact::{canonical, ContentHash, HashError, Pack, PackPath};
use std::collections::BTreeSet;

/// Operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOpKind {
    /// Create a member that must not exist
    Add,
    /// Delete a member with the expected digest
    Remove,
    /// Replace a member with the expected digest
    Modify,
}

/// Single guarded operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOp {
    /// Target path
    pub path: PackPath,
    /// Operation kind
    pub kind: PatchOpKind,
    /// Digest the target must have before apply (modify and remove)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_base_digest: Option<ContentHash>,
    /// Replacement content (add and modify), base64 on the wire
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_bytes")]
    pub new_bytes: Option<Vec<u8>>,
}

impl PatchOp {
    /// Add `bytes` at `path`
    #[must_use]
    pub fn add(path: PackPath, bytes: Vec<u8>) -> Self {
        Self {
            path,
            kind: PatchOpKind::Add,
            expected_base_digest: None,
            new_bytes: Some(bytes),
        }
    }

    /// Remove `path`, expected to have `digest`
    #[must_use]
    pub fn remove(path: PackPath, digest: ContentHash) -> Self {
        Self {
            path,
            kind: PatchOpKind::Remove,
            expected_base_digest: Some(digest),
            new_bytes: None,
        }
    }

    /// Replace `path`, expected to have `digest`, with `bytes`
    #[must_use]
    pub fn modify(path: PackPath, digest: ContentHash, bytes: Vec<u8>) -> Self {
        Self {
            path,
            kind: PatchOpKind::Modify,
            expected_base_digest: Some(digest),
            new_bytes: Some(bytes),
        }
    }
}

/// Applyable patch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Operations in path order
    pub ops: Vec<PatchOp>,
    /// Counts from the source diff
    pub stats: DiffStats,
    /// One-line description
    pub summary: String,
    /// Project declared by the base manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_project_id: Option<String>,
    /// Project declared by the proposal manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_project_id: Option<String>,
    /// Human-readable text patch
    pub patch_text: String,
}

impl Patch {
    /// Whether the patch changes nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Paths touched by the patch
    pub fn paths(&self) -> impl Iterator<Item = &PackPath> {
        self.ops.iter().map(|op| &op.path)
    }

    /// Digest of the canonical encoding of `ops`
    ///
    /// # Errors
    /// Returns error if the ops cannot be encoded (not expected)
    pub fn ops_digest(&self) -> Result<ContentHash, PatchError> {
        Ok(ContentHash::compute_canonical(&self.ops)?)
    }

    /// Canonical JSON encoding
    ///
    /// # Errors
    /// Returns error if the patch cannot be encoded (not expected)
    pub fn to_canonical_json(&self) -> Result<String, PatchError> {
        canonical::canonicalize_serializable(self).map_err(|e| PatchError::Encode(e.into()))
    }

    /// Decode a patch from JSON
    ///
    /// # Errors
    /// Returns error for malformed JSON or base64
    pub fn from_json(json: &str) -> Result<Self, PatchError> {
        serde_json::from_str(json).map_err(PatchError::Decode)
    }
}

/// A patch persisted for later review or adoption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedProposal {
    /// Caller-assigned id
    pub proposal_id: String,
    /// When the proposal was saved (RFC 3339)
    pub saved_at: String,
    /// The proposal itself
    pub patch: Patch,
}

impl SavedProposal {
    /// Wrap a patch
    #[must_use]
    pub fn new(proposal_id: impl Into<String>, saved_at: impl Into<String>, patch: Patch) -> Self {
        Self {
            proposal_id: proposal_id.into(),
            saved_at: saved_at.into(),
            patch,
        }
    }

    /// Canonical JSON encoding
    ///
    /// # Errors
    /// Returns error if the proposal cannot be encoded (not expected)
    pub fn to_canonical_json(&self) -> Result<String, PatchError> {
        canonical::canonicalize_serializable(self).map_err(|e| PatchError::Encode(e.into()))
    }

    /// Decode a saved proposal from JSON
    ///
    /// # Errors
    /// Returns error for malformed JSON or base64
    pub fn from_json(json: &str) -> Result<Self, PatchError> {
        serde_json::from_str(json).map_err(PatchError::Decode)
    }
}

/// Build a patch turning `base` into `proposal`
///
/// `diff` must have been computed from these two packs; it is re-checked
/// entry by entry.
///
/// # Errors
/// Returns [`PatchError::StaleDiff`] naming the first path where `diff`
/// disagrees with the packs
pub fn build_patch(base: &Pack, proposal: &Pack, diff: &Diff) -> Result<Patch, PatchError> {
    let covered: BTreeSet<&PackPath> = diff.files.iter().map(|f| &f.path).collect();
    if let Some(path) = base
        .paths()
        .chain(proposal.paths())
        .find(|p| !covered.contains(p))
    {
        return Err(PatchError::StaleDiff { path: path.clone() });
    }

    let mut ops = Vec::with_capacity(diff.stats.changed());
    for entry in &diff.files {
        let old = base.lookup(entry.path.as_str());
        let new = proposal.lookup(entry.path.as_str());
        match (entry.kind, old, new) {
            (DiffKind::Unchanged, Some(o), Some(n)) if o.bytes() == n.bytes() => {}
            (DiffKind::Added, None, Some(n)) => {
                ops.push(PatchOp::add(entry.path.clone(), n.bytes().to_vec()));
            }
            (DiffKind::Removed, Some(o), None) => {
                ops.push(PatchOp::remove(entry.path.clone(), o.digest()));
            }
            (DiffKind::Modified, Some(o), Some(n)) if o.bytes() != n.bytes() => {
                ops.push(PatchOp::modify(
                    entry.path.clone(),
                    o.digest(),
                    n.bytes().to_vec(),
                ));
            }
            _ => {
                return Err(PatchError::StaleDiff {
                    path: entry.path.clone(),
                })
            }
        }
    }

    let stats = diff.stats;
    let summary = format!(
        "{} added, {} removed, {} modified, {} unchanged",
        stats.added, stats.removed, stats.modified, stats.unchanged
    );
    tracing::debug!(ops = ops.len(), %summary, "Built patch");

    Ok(Patch {
        ops,
        stats,
        summary,
        base_project_id: base.project_id(),
        proposal_project_id: proposal.project_id(),
        patch_text: diff.full_patch_text.clone(),
    })
}

/// Errors building or encoding patches
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Diff does not describe the given packs
    #[error("diff is stale at '{path}'; recompute it from the current packs")]
    StaleDiff {
        /// First disagreeing path
        path: PackPath,
    },

    /// Encoding failed
    #[error("failed to encode patch: {0}")]
    Encode(#[from] HashError),

    /// Decoding failed
    #[error("failed to decode patch: {0}")]
    Decode(#[source] serde_json::Error),
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}
