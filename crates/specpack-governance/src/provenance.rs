//! Provenance and the hash-chained history
//!
//! Each history entry hashes its predecessor's hash together with its own
//! fields, so rewriting any past entry breaks every hash after it.

use crate::error::GovernanceError;
use crate::record::HistoryEntry;
use crate::state::GovernanceEvent;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use specpack_artifact::ContentHash;

/// Digests and versions recorded with a locked snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Archive the change was computed against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_archive_digest: Option<ContentHash>,
    /// Archive the change was proposed as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_archive_digest: Option<ContentHash>,
    /// Canonical digest of the applied patch ops
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_ops_digest: Option<ContentHash>,
    /// Digest of the stored archive bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_archive_digest: Option<ContentHash>,
    /// Application version
    pub app_version: String,
    /// Validator version
    pub validator_version: String,
    /// Archive format version
    pub format_version: String,
}

/// Caller-supplied provenance digests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvenanceInputs {
    /// Base archive digest
    pub base_archive_digest: Option<ContentHash>,
    /// Proposal archive digest
    pub proposal_archive_digest: Option<ContentHash>,
    /// Patch ops digest
    pub patch_ops_digest: Option<ContentHash>,
}

impl ProvenanceInputs {
    /// No inputs
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the base archive
    #[must_use]
    pub fn with_base_archive(mut self, archive: &[u8]) -> Self {
        self.base_archive_digest = Some(ContentHash::compute(archive));
        self
    }

    /// Record the proposal archive
    #[must_use]
    pub fn with_proposal_archive(mut self, archive: &[u8]) -> Self {
        self.proposal_archive_digest = Some(ContentHash::compute(archive));
        self
    }

    /// Record the patch ops digest
    #[inline]
    #[must_use]
    pub fn with_patch_ops_digest(mut self, digest: ContentHash) -> Self {
        self.patch_ops_digest = Some(digest);
        self
    }
}

/// Hash of one history entry
#[must_use]
pub fn entry_hash(
    prev_hash: &ContentHash,
    at: &DateTime<Utc>,
    event: GovernanceEvent,
    locked_digest: Option<&ContentHash>,
) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(at.to_rfc3339_opts(SecondsFormat::Micros, true).as_bytes());
    hasher.update([0]);
    hasher.update(event.as_str().as_bytes());
    hasher.update([0]);
    if let Some(digest) = locked_digest {
        hasher.update(digest.as_bytes());
    }
    ContentHash::new(hasher.finalize().into())
}

/// Append a chained entry
pub fn append_entry(
    history: &mut Vec<HistoryEntry>,
    at: DateTime<Utc>,
    event: GovernanceEvent,
    locked_digest: Option<ContentHash>,
) {
    let prev_hash = history.last().map(|e| e.hash).unwrap_or_default();
    let hash = entry_hash(&prev_hash, &at, event, locked_digest.as_ref());
    history.push(HistoryEntry {
        at,
        event,
        locked_digest,
        prev_hash,
        hash,
    });
}

/// Re-derive the chain and check event order
///
/// # Errors
/// Returns [`GovernanceError::Inconsistent`] naming the first bad entry
pub fn verify_history(history: &[HistoryEntry]) -> Result<(), GovernanceError> {
    let mut prev = ContentHash::default();
    for (i, entry) in history.iter().enumerate() {
        let expected_event = if i % 2 == 0 {
            GovernanceEvent::Lock
        } else {
            GovernanceEvent::Unlock
        };
        if entry.event != expected_event {
            return Err(GovernanceError::Inconsistent(format!(
                "history entry {i} is '{}', expected '{expected_event}'",
                entry.event
            )));
        }
        if entry.event == GovernanceEvent::Lock && entry.locked_digest.is_none() {
            return Err(GovernanceError::Inconsistent(format!(
                "history entry {i} is a lock without locked_digest"
            )));
        }
        if entry.prev_hash != prev {
            return Err(GovernanceError::Inconsistent(format!(
                "history entry {i} does not link to its predecessor"
            )));
        }
        let expected = entry_hash(&entry.prev_hash, &entry.at, entry.event, entry.locked_digest.as_ref());
        if entry.hash != expected {
            return Err(GovernanceError::Inconsistent(format!(
                "history entry {i} hash mismatch"
            )));
        }
        prev = entry.hash;
    }
    Ok(())
}
