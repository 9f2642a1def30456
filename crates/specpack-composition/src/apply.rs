//! Patch application
//!
//! Every op's precondition is checked against the target pack before
//! anything changes. One failing op rejects the whole patch, and the
//! rejection names every failing path.

use crate::patch::{Patch, PatchOp, PatchOpKind};
use serde::{Deserialize, Serialize};
use specpack_artifact::{
    serialize_pack_with, ArchiveError, ArchiveOptions, ContentHash, ManifestCheck, Pack,
    PackBuilder, PackPath,
};

/// Expected-vs-actual state of one conflicting path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDetail {
    /// Conflicting path
    pub path: PackPath,
    /// Digest the patch expected; `None` means the path must be absent
    pub expected: Option<ContentHash>,
    /// Digest found; `None` means the path is absent
    pub actual: Option<ContentHash>,
}

/// Successful apply
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// The new pack
    pub merged: Pack,
    /// `merged` serialized as an archive
    pub archive: Vec<u8>,
    /// Advisory findings about `merged`
    pub warnings: Vec<String>,
}

/// Apply `patch` to `pack` with default archive options
///
/// # Errors
/// See [`apply_patch_with`]
pub fn apply_patch(pack: &Pack, patch: &Patch) -> Result<ApplyOutcome, ApplyError> {
    apply_patch_with(pack, patch, ArchiveOptions::default())
}

/// Apply `patch` to `pack`
///
/// `pack` is never modified; the result is a new pack.
///
/// # Errors
/// - [`ApplyError::MalformedOp`] if an op lacks the digest or bytes its kind requires
/// - [`ApplyError::Conflict`] if any precondition fails
/// - [`ApplyError::Archive`] if the merged pack cannot be serialized
pub fn apply_patch_with(
    pack: &Pack,
    patch: &Patch,
    options: ArchiveOptions,
) -> Result<ApplyOutcome, ApplyError> {
    for op in &patch.ops {
        check_shape(op)?;
    }

    let details: Vec<ConflictDetail> = patch.ops.iter().filter_map(|op| precondition(pack, op)).collect();
    if !details.is_empty() {
        tracing::warn!(
            conflicts = details.len(),
            paths = ?details.iter().map(|d| d.path.as_str()).collect::<Vec<_>>(),
            "Patch rejected: base has moved"
        );
        return Err(ApplyError::Conflict { details });
    }

    let mut builder = PackBuilder::from_pack(pack);
    for op in &patch.ops {
        match (op.kind, &op.new_bytes) {
            (PatchOpKind::Remove, _) => {
                builder.remove(op.path.as_str());
            }
            (PatchOpKind::Add | PatchOpKind::Modify, Some(bytes)) => {
                builder.upsert(op.path.clone(), bytes.clone());
            }
            // Rejected by check_shape
            (PatchOpKind::Add | PatchOpKind::Modify, None) => {}
        }
    }
    let merged = builder.build();

    let mut warnings = Vec::new();
    match merged.manifest() {
        ManifestCheck::Ok(_) => {}
        ManifestCheck::Missing if !pack.contains(specpack_artifact::MANIFEST_PATH) => {}
        check => warnings.push(check.describe()),
    }
    for warning in &warnings {
        tracing::warn!(%warning, "Merged pack");
    }

    let archive = serialize_pack_with(&merged, options)?;
    tracing::info!(ops = patch.ops.len(), files = merged.len(), "Applied patch");

    Ok(ApplyOutcome {
        merged,
        archive,
        warnings,
    })
}

fn check_shape(op: &PatchOp) -> Result<(), ApplyError> {
    let reason = match op.kind {
        PatchOpKind::Add if op.new_bytes.is_none() => "add without new_bytes",
        PatchOpKind::Modify if op.new_bytes.is_none() => "modify without new_bytes",
        PatchOpKind::Modify | PatchOpKind::Remove if op.expected_base_digest.is_none() => {
            "missing expected_base_digest"
        }
        _ => return Ok(()),
    };
    Err(ApplyError::MalformedOp {
        path: op.path.clone(),
        reason,
    })
}

fn precondition(pack: &Pack, op: &PatchOp) -> Option<ConflictDetail> {
    let actual = pack.lookup(op.path.as_str()).map(|f| f.digest());
    let expected = match op.kind {
        PatchOpKind::Add => None,
        PatchOpKind::Modify | PatchOpKind::Remove => op.expected_base_digest,
    };
    (actual != expected).then(|| ConflictDetail {
        path: op.path.clone(),
        expected,
        actual,
    })
}

/// Errors applying patches
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// One or more preconditions failed; nothing was applied
    #[error("patch conflicts on {} path(s)", details.len())]
    Conflict {
        /// One entry per failing path
        details: Vec<ConflictDetail>,
    },

    /// Op is missing data its kind requires
    #[error("malformed op for '{path}': {reason}")]
    MalformedOp {
        /// Op path
        path: PackPath,
        /// What is missing
        reason: &'static str,
    },

    /// Merged pack could not be serialized
    #[error("failed to serialize merged pack: {0}")]
    Archive(#[from] ArchiveError),
}

impl ApplyError {
    /// Conflicting paths, if this is a conflict
    #[must_use]
    pub fn conflicts(&self) -> &[ConflictDetail] {
        match self {
            Self::Conflict { details } => details,
            Self::MalformedOp { .. } | Self::Archive(_) => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::patch::build_patch;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use specpack_artifact::{parse_pack, PackHashReport};
    use specpack_test_utils::{
        arb_pack, arb_text_pack, pack_from, sample_spec_pack, sample_spec_pack_with,
        scenario_base, scenario_proposal,
    };

    fn patch_between(a: &Pack, b: &Pack) -> Patch {
        build_patch(a, b, &diff(a, b)).unwrap()
    }

    fn digest(pack: &Pack) -> ContentHash {
        PackHashReport::compute(pack).pack_digest
    }

    #[test]
    fn scenario_apply_reaches_proposal() {
        let base = scenario_base();
        let proposal = scenario_proposal();
        let outcome = apply_patch(&base, &patch_between(&base, &proposal)).unwrap();

        assert_eq!(digest(&outcome.merged), digest(&proposal));
        assert_eq!(parse_pack(&outcome.archive).unwrap(), outcome.merged);
        assert!(outcome.warnings.is_empty());
        assert_eq!(base, scenario_base());
    }

    #[test]
    fn scenario_conflict_names_moved_file() {
        let base = scenario_base();
        let patch = patch_between(&base, &scenario_proposal());
        let live = pack_from(&[("A", "x"), ("B", "z2")]);

        let err = apply_patch(&live, &patch).unwrap_err();
        assert_eq!(
            err.conflicts(),
            &[ConflictDetail {
                path: PackPath::new("B").unwrap(),
                expected: Some(ContentHash::compute(b"y")),
                actual: Some(ContentHash::compute(b"z2")),
            }]
        );
    }

    #[test]
    fn every_failing_path_is_reported() {
        let base = scenario_base();
        let patch = patch_between(&base, &scenario_proposal());
        let live = pack_from(&[("A", "x"), ("C", "already here")]);

        let err = apply_patch(&live, &patch).unwrap_err();
        let paths: Vec<&str> = err.conflicts().iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["B", "C"]);
        let c = &err.conflicts()[1];
        assert_eq!(c.expected, None);
        assert_eq!(c.actual, Some(ContentHash::compute(b"already here")));
    }

    #[test]
    fn malformed_op_is_rejected_before_preconditions() {
        let base = scenario_base();
        let mut patch = patch_between(&base, &scenario_proposal());
        patch.ops[0].new_bytes = None;
        assert!(matches!(
            apply_patch(&base, &patch),
            Err(ApplyError::MalformedOp { .. })
        ));
    }

    #[test]
    fn manifest_drift_is_a_warning() {
        let base = sample_spec_pack("demo");
        let mut builder = PackBuilder::from_pack(&base);
        builder.insert_bytes("notes.md", b"hi\n".to_vec()).unwrap();
        let proposal = builder.build();

        let outcome = apply_patch(&base, &patch_between(&base, &proposal)).unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].starts_with("manifest drift"));
    }

    #[test]
    fn synced_manifest_applies_cleanly() {
        let base = sample_spec_pack("demo");
        let proposal = sample_spec_pack_with(
            "demo",
            "design/palette.json",
            serde_json::json!({"mode": "dark", "colors": {"primary": "#000000"}}),
        );
        let outcome = apply_patch(&base, &patch_between(&base, &proposal)).unwrap();
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.merged, proposal);
    }

    #[test]
    fn empty_members_and_empty_targets_apply() {
        let base = scenario_base();
        let blanked = pack_from(&[("A", ""), ("E", "")]);
        let outcome = apply_patch(&base, &patch_between(&base, &blanked)).unwrap();
        assert_eq!(outcome.merged, blanked);
        assert_eq!(outcome.merged.lookup("E").unwrap().size(), 0);

        let cleared = apply_patch(&base, &patch_between(&base, &Pack::empty())).unwrap();
        assert!(cleared.merged.is_empty());
    }

    proptest! {
        #[test]
        fn patch_is_inverse_of_diff(a in arb_pack(6), b in arb_pack(6)) {
            let outcome = apply_patch(&a, &patch_between(&a, &b)).unwrap();
            prop_assert_eq!(digest(&outcome.merged), digest(&b));
        }

        #[test]
        fn text_patch_is_inverse_of_diff(a in arb_text_pack(4), b in arb_text_pack(4)) {
            let outcome = apply_patch(&a, &patch_between(&a, &b)).unwrap();
            prop_assert_eq!(outcome.merged, b);
        }

        #[test]
        fn mutating_a_touched_file_conflicts_on_that_path(
            a in arb_pack(6),
            b in arb_pack(6),
            pick in any::<prop::sample::Index>(),
        ) {
            let patch = patch_between(&a, &b);
            let touched: Vec<&PackPath> = patch
                .ops
                .iter()
                .filter(|op| op.kind != PatchOpKind::Add)
                .map(|op| &op.path)
                .collect();
            prop_assume!(!touched.is_empty());
            let victim = touched[pick.index(touched.len())].clone();

            let mut builder = PackBuilder::from_pack(&a);
            let mut mutated = a.lookup(victim.as_str()).unwrap().bytes().to_vec();
            mutated.push(0xAA);
            builder.upsert(victim.clone(), mutated);
            let live = builder.build();

            let err = apply_patch(&live, &patch).unwrap_err();
            prop_assert!(err.conflicts().iter().any(|d| d.path == victim));
        }
    }
}
