//! Error types for governance

use specpack_artifact::{ContentHash, ParseError};
use specpack_composition::{ApplyError, PatchError};

/// Governance error type
///
/// Transition and precondition errors are raised before any state is
/// written.
#[derive(Debug, thiserror::Error)]
pub enum GovernanceError {
    /// Lock requested while locked
    #[error("project is already locked")]
    AlreadyLocked,

    /// Unlock requested while unlocked
    #[error("project is not locked")]
    NotLocked,

    /// Adopt requested before any snapshot was locked
    #[error("no locked snapshot to adopt onto")]
    AdoptWithoutBase,

    /// Locked snapshot bytes are not in the snapshot store
    #[error("locked archive {digest} is missing from the snapshot store")]
    SnapshotMissing {
        /// Archive digest looked up
        digest: ContentHash,
    },

    /// Archive bytes do not decode to the pack being locked
    #[error("archive does not match pack: expected {expected}, archive holds {actual}")]
    ArchiveMismatch {
        /// Digest of the pack
        expected: ContentHash,
        /// Digest of the decoded archive
        actual: ContentHash,
    },

    /// Archive bytes could not be decoded
    #[error("archive error: {0}")]
    Archive(#[from] ParseError),

    /// Patch application failed
    #[error("apply failed: {0}")]
    Apply(#[from] ApplyError),

    /// Patch encoding failed
    #[error("patch error: {0}")]
    Patch(#[from] PatchError),

    /// Store failure or lost race
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Stored record breaks a governance invariant
    #[error("governance record is inconsistent: {0}")]
    Inconsistent(String),

    /// Background hashing task failed
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl GovernanceError {
    /// Whether the caller misused the state machine
    #[inline]
    #[must_use]
    pub fn is_transition_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyLocked | Self::NotLocked | Self::AdoptWithoutBase
        )
    }

    /// Whether retrying after reloading state may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(StoreError::VersionConflict { .. }))
    }
}

/// Store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Record changed since it was read
    #[error("version conflict for '{project}': expected {expected}, found {actual}")]
    VersionConflict {
        /// Project
        project: String,
        /// Version the writer read
        expected: u64,
        /// Version in the store
        actual: u64,
    },

    /// Backend failure
    #[error("store backend error: {0}")]
    Backend(String),
}
