//! Error types for the engine facade

use crate::config::ConfigError;
use specpack_artifact::{ArchiveError, ParseError};
use specpack_composition::{ApplyError, MergeError, PatchError};
use specpack_governance::GovernanceError;
use specpack_validate::ValidationReport;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Archive bytes could not be decoded
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    /// Pack could not be encoded
    #[error("archive failed: {0}")]
    Archive(#[from] ArchiveError),

    /// Patch could not be built or encoded
    #[error("patch failed: {0}")]
    Patch(#[from] PatchError),

    /// Patch could not be applied
    #[error("apply failed: {0}")]
    Apply(#[from] ApplyError),

    /// Group merge failed
    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    /// Governance transition failed
    #[error("governance failed: {0}")]
    Governance(#[from] GovernanceError),

    /// Pack has validation errors and cannot be locked
    #[error("pack failed validation with {} error(s)", report.errors().count())]
    ValidationFailed {
        /// Full report
        report: ValidationReport,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Background task failed
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl EngineError {
    /// Machine-readable error code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse(e) => e.code(),
            Self::Archive(_) => "ARCHIVE_ERROR",
            Self::Patch(PatchError::StaleDiff { .. }) => "STALE_DIFF",
            Self::Patch(_) => "PATCH_ERROR",
            Self::Apply(ApplyError::Conflict { .. }) => "PATCH_CONFLICT",
            Self::Apply(_) => "APPLY_ERROR",
            Self::Merge(_) => "MERGE_ERROR",
            Self::Governance(GovernanceError::AlreadyLocked) => "ALREADY_LOCKED",
            Self::Governance(GovernanceError::NotLocked) => "NOT_LOCKED",
            Self::Governance(GovernanceError::AdoptWithoutBase) => "ADOPT_WITHOUT_BASE",
            Self::Governance(GovernanceError::Apply(ApplyError::Conflict { .. })) => {
                "PATCH_CONFLICT"
            }
            Self::Governance(e) if e.is_retryable() => "VERSION_CONFLICT",
            Self::Governance(_) => "GOVERNANCE_ERROR",
            Self::ValidationFailed { .. } => "VALIDATION_FAILED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Task(_) => "INTERNAL",
        }
    }

    /// Whether retrying after reloading state may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Governance(e) if e.is_retryable())
    }

    /// Conflicting paths of a failed apply, directly or through governance
    #[must_use]
    pub fn conflicts(&self) -> &[specpack_composition::ConflictDetail] {
        match self {
            Self::Apply(e) | Self::Governance(GovernanceError::Apply(e)) => e.conflicts(),
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specpack_governance::StoreError;

    #[test]
    fn codes_distinguish_governance_misuse() {
        assert_eq!(
            EngineError::from(GovernanceError::AlreadyLocked).code(),
            "ALREADY_LOCKED"
        );
        assert_eq!(EngineError::from(GovernanceError::NotLocked).code(), "NOT_LOCKED");
        let race = EngineError::from(GovernanceError::Store(StoreError::VersionConflict {
            project: "p".to_string(),
            expected: 1,
            actual: 2,
        }));
        assert_eq!(race.code(), "VERSION_CONFLICT");
        assert!(race.is_retryable());
    }

    #[test]
    fn parse_errors_keep_their_code() {
        let err = EngineError::from(ParseError::EmptyArchive);
        assert_eq!(err.code(), ParseError::EmptyArchive.code());
        assert!(!err.is_retryable());
    }
}
