//! End-to-end flows from proposal to locked truth.

use pretty_assertions::assert_eq;
use serde_json::json;
use specpack_artifact::{PackHashReport, MANIFEST_PATH};
use specpack_composition::{DiffStats, GroupName, GroupSelection, GroupSource};
use specpack_core::{EngineConfig, EngineError, SpecPackEngine};
use specpack_governance::{
    verify_history, GovernanceError, GovernanceEvent, GovernanceStatus, LockRequest, ProjectId,
    ProvenanceInputs,
};
use specpack_test_utils::{
    pack_from, sample_spec_pack, sample_spec_pack_with, scenario_base, scenario_proposal,
};

fn engine() -> SpecPackEngine {
    SpecPackEngine::new(EngineConfig::new().with_app_version("scenario/1"))
}

#[tokio::test]
async fn abc_scenario_locks_the_proposal_and_survives_unlock() {
    let engine = engine();
    let project = ProjectId::from("abc");
    let base = scenario_base();
    let proposal = scenario_proposal();

    let change = engine.propose(&base, &proposal).unwrap();
    assert_eq!(
        change.diff.stats,
        DiffStats {
            added: 1,
            removed: 0,
            modified: 1,
            unchanged: 1,
        }
    );

    let applied = engine.apply(&base, &change.patch).await.unwrap();
    let proposal_digest = PackHashReport::compute(&proposal).pack_digest;
    assert_eq!(PackHashReport::compute(&applied.merged).pack_digest, proposal_digest);

    // Scenario packs carry no manifest, so lock through governance directly
    let locked = engine
        .governance()
        .lock(
            &project,
            LockRequest::new(applied.merged.clone(), applied.archive.clone()),
        )
        .await
        .unwrap();
    assert_eq!(locked.status, GovernanceStatus::Locked);
    assert_eq!(locked.last_locked.as_ref().unwrap().pack_digest, proposal_digest);

    let unlocked = engine.unlock(&project).await.unwrap();
    assert_eq!(unlocked.status, GovernanceStatus::Unlocked);
    assert_eq!(unlocked.last_locked, locked.last_locked);
    assert_eq!(
        unlocked.working.as_ref().unwrap().from_locked_digest,
        proposal_digest
    );
    assert_eq!(engine.locked_pack(&project).await.unwrap(), Some(applied.merged));
}

#[tokio::test]
async fn drifted_live_pack_is_a_conflict_on_b() {
    let engine = engine();
    let base = scenario_base();
    let live = pack_from(&[("A", "x"), ("B", "z2")]);
    let change = engine.propose(&base, &scenario_proposal()).unwrap();

    let err = engine.apply(&live, &change.patch).await.unwrap_err();
    assert_eq!(err.code(), "PATCH_CONFLICT");
    let conflicts = err.conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].path.as_str(), "B");
    assert_eq!(
        conflicts[0].expected,
        base.lookup("B").map(specpack_artifact::PackFile::digest)
    );
    assert_eq!(
        conflicts[0].actual,
        live.lookup("B").map(specpack_artifact::PackFile::digest)
    );
}

#[tokio::test]
async fn second_lock_fails_and_history_does_not_grow() {
    let engine = engine();
    let project = ProjectId::from("demo");
    let pack = sample_spec_pack("demo");

    let first = engine
        .lock(&project, &pack, ProvenanceInputs::new())
        .await
        .unwrap();
    assert_eq!(
        first.last_locked.as_ref().unwrap().pack_digest,
        PackHashReport::compute(&pack).pack_digest
    );

    let err = engine
        .lock(&project, &pack, ProvenanceInputs::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Governance(GovernanceError::AlreadyLocked)
    ));
    assert_eq!(engine.record(&project).await.unwrap().history, first.history);
}

#[tokio::test]
async fn edit_cycle_keeps_a_verifiable_history() {
    let engine = engine();
    let project = ProjectId::from("demo");
    let v1 = sample_spec_pack("demo");
    let v1_archive = engine.serialize(&v1).await.unwrap();
    engine
        .lock(
            &project,
            &v1,
            ProvenanceInputs::new().with_base_archive(&v1_archive),
        )
        .await
        .unwrap();
    engine.unlock(&project).await.unwrap();

    let v2 = sample_spec_pack_with(
        "demo",
        "design/palette.json",
        json!({"mode": "dark", "colors": {"primary": "#3366ff", "surface": "#101010"}}),
    );
    let change = engine.propose(&v1, &v2).unwrap();
    let outcome = engine.adopt(&project, &change.patch).await.unwrap();

    let record = outcome.record;
    assert_eq!(record.status, GovernanceStatus::Locked);
    assert_eq!(
        record.truth_digest(),
        Some(PackHashReport::compute(&v2).pack_digest)
    );
    let events: Vec<_> = record.history.iter().map(|e| e.event).collect();
    assert_eq!(
        events,
        vec![
            GovernanceEvent::Lock,
            GovernanceEvent::Unlock,
            GovernanceEvent::Lock
        ]
    );
    verify_history(&record.history).unwrap();

    let provenance = &record.last_locked.as_ref().unwrap().provenance;
    assert_eq!(
        provenance.patch_ops_digest,
        Some(change.patch.ops_digest().unwrap())
    );
    assert!(provenance.base_archive_digest.is_some());
    assert_eq!(provenance.app_version, "scenario/1");
}

#[tokio::test]
async fn adopt_without_any_lock_is_rejected() {
    let engine = engine();
    let pack = sample_spec_pack("demo");
    let change = engine.propose(&pack, &pack).unwrap();
    let err = engine
        .adopt(&ProjectId::from("fresh"), &change.patch)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ADOPT_WITHOUT_BASE");
}

#[tokio::test]
async fn merged_groups_can_be_locked() {
    let engine = engine();
    let project = ProjectId::from("demo");
    let base = sample_spec_pack("demo");
    let current = sample_spec_pack_with(
        "demo",
        "design/palette.json",
        json!({"mode": "dark", "colors": {"primary": "#000000"}}),
    );

    let selection = GroupSelection::new().with(GroupName::Design, GroupSource::Base);
    let outcome = engine.merge(&base, &current, None, &selection).unwrap();
    assert_eq!(
        outcome.merged.lookup("design/palette.json"),
        base.lookup("design/palette.json")
    );
    assert!(outcome.merged.contains(MANIFEST_PATH));

    let record = engine
        .lock(&project, &outcome.merged, ProvenanceInputs::new())
        .await
        .unwrap();
    assert!(record.is_locked());
}
