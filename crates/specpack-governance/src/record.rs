//! Governance records
//!
//! One [`GovernanceRecord`] per project. `version` increments on every
//! stored write and is the compare-and-swap token for [`crate::GovernanceStore`].

use crate::provenance::Provenance;
use crate::state::{GovernanceEvent, GovernanceStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use specpack_artifact::{ContentHash, FileHash};
use std::fmt::{self, Display, Formatter};
use uuid::Uuid;

/// Opaque project identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Wrap an identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ProjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The pack designated as truth at lock time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedSnapshot {
    /// When the lock happened
    pub locked_at: DateTime<Utc>,
    /// Two-level digest of the locked pack
    pub pack_digest: ContentHash,
    /// Per-file digests of the locked pack
    pub files: Vec<FileHash>,
    /// Where the pack came from
    pub provenance: Provenance,
}

/// Working copy opened by an unlock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingCopy {
    /// Fresh id per unlock
    pub working_copy_id: Uuid,
    /// When the unlock happened
    pub unlocked_at: DateTime<Utc>,
    /// Pack digest of the snapshot the copy starts from
    pub from_locked_digest: ContentHash,
}

/// Hash-chained history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the event happened
    pub at: DateTime<Utc>,
    /// Event
    pub event: GovernanceEvent,
    /// Pack digest locked (lock) or unlocked from (unlock)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_digest: Option<ContentHash>,
    /// Hash of the previous entry; zero for the first
    pub prev_hash: ContentHash,
    /// Hash of this entry
    pub hash: ContentHash,
}

/// Per-project governance state
///
/// # Invariants
/// - `status == Locked` implies `last_locked` is present
/// - `history` is append-only and alternates `lock`, `unlock`, ...
/// - every `lock` entry carries `locked_digest`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceRecord {
    /// Write counter; 0 for a project never written
    pub version: u64,
    /// Current status
    pub status: GovernanceStatus,
    /// Most recent locked snapshot, kept across unlocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_locked: Option<LockedSnapshot>,
    /// Open working copy while unlocked after a lock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working: Option<WorkingCopy>,
    /// Transition log
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl GovernanceRecord {
    /// Whether a snapshot is currently the truth
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.status == GovernanceStatus::Locked
    }

    /// Pack digest of the current truth
    #[must_use]
    pub fn truth_digest(&self) -> Option<ContentHash> {
        if self.is_locked() {
            self.last_locked.as_ref().map(|s| s.pack_digest)
        } else {
            None
        }
    }
}
