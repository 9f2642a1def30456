//! Async engine facade
//!
//! Pure operations (validate, diff, build patch, merge) run inline. Archive
//! encode/decode, hashing and apply run on the blocking pool. Governance
//! writes are gated on a passing validation report.

use crate::config::EngineConfig;
use crate::error::EngineError;
use futures::try_join;
use specpack_artifact::{parse_pack, serialize_pack_with, Pack, PackHashReport};
use specpack_composition::{
    apply_patch_with, build_patch, diff, merge_groups, ApplyOutcome, Diff, GroupSelection,
    MergeOutcome, Patch, SavedProposal,
};
use specpack_governance::{
    Clock, Governance, GovernanceRecord, GovernanceStore, LockRequest, PatchLockOutcome,
    ProjectId, ProvenanceInputs, SnapshotStore, SystemClock,
};
use specpack_validate::{validate, ValidationReport};
use std::sync::Arc;
use uuid::Uuid;

/// A decoded archive with its digests and diagnostics
#[derive(Debug, Clone)]
pub struct ImportedPack {
    /// Decoded pack
    pub pack: Pack,
    /// Per-file and pack digests
    pub hashes: PackHashReport,
    /// Validation diagnostics
    pub validation: ValidationReport,
}

/// Diff and patch between two packs
#[derive(Debug, Clone)]
pub struct Proposal {
    /// Per-path comparison
    pub diff: Diff,
    /// Guarded patch taking base to proposal
    pub patch: Patch,
}

/// Spec Pack engine
#[derive(Debug)]
pub struct SpecPackEngine {
    config: EngineConfig,
    governance: Governance,
    clock: Arc<dyn Clock>,
}

impl SpecPackEngine {
    /// Engine with in-memory governance storage
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let governance = Governance::in_memory(config.governance());
        Self {
            config,
            governance,
            clock: Arc::new(SystemClock),
        }
    }

    /// Engine over caller-provided governance storage
    #[must_use]
    pub fn with_stores(
        config: EngineConfig,
        store: Arc<dyn GovernanceStore>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        let governance = Governance::new(store, snapshots, config.governance());
        Self {
            config,
            governance,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for proposals and governance
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.governance = self.governance.with_clock(Arc::clone(&clock));
        self.clock = clock;
        self
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Governance service, for transitions that skip the validation gate
    #[inline]
    #[must_use]
    pub fn governance(&self) -> &Governance {
        &self.governance
    }

    /// Decode archive bytes
    ///
    /// # Errors
    /// Returns [`EngineError::Parse`] for corrupt or empty archives
    pub async fn parse(&self, bytes: impl Into<Arc<[u8]>>) -> Result<Pack, EngineError> {
        let bytes: Arc<[u8]> = bytes.into();
        Ok(tokio::task::spawn_blocking(move || parse_pack(&bytes)).await??)
    }

    /// Encode a pack with the configured compression
    ///
    /// # Errors
    /// Returns [`EngineError::Archive`] if the zip writer fails
    pub async fn serialize(&self, pack: &Pack) -> Result<Vec<u8>, EngineError> {
        let pack = pack.clone();
        let options = self.config.archive_options();
        Ok(tokio::task::spawn_blocking(move || serialize_pack_with(&pack, options)).await??)
    }

    /// Per-file and pack digests
    ///
    /// # Errors
    /// Returns [`EngineError::Task`] if the hashing task panics
    pub async fn hash(&self, pack: &Pack) -> Result<PackHashReport, EngineError> {
        let pack = pack.clone();
        Ok(tokio::task::spawn_blocking(move || PackHashReport::compute(&pack)).await?)
    }

    /// Decode, hash and validate an archive
    ///
    /// Validation issues are returned in the result, never as an error.
    ///
    /// # Errors
    /// Returns [`EngineError::Parse`] if the bytes do not decode
    pub async fn import(&self, bytes: impl Into<Arc<[u8]>>) -> Result<ImportedPack, EngineError> {
        let pack = self.parse(bytes).await?;
        let (hashes, validation) = try_join!(self.hash(&pack), async {
            let pack = pack.clone();
            Ok::<_, EngineError>(tokio::task::spawn_blocking(move || validate(&pack)).await?)
        })?;
        tracing::info!(
            files = pack.len(),
            digest = %hashes.pack_digest.short(),
            status = ?validation.status,
            "Imported pack"
        );
        Ok(ImportedPack {
            pack,
            hashes,
            validation,
        })
    }

    /// Validate a pack
    #[must_use]
    pub fn validate(&self, pack: &Pack) -> ValidationReport {
        validate(pack)
    }

    /// Compare two packs
    #[must_use]
    pub fn diff(&self, base: &Pack, proposal: &Pack) -> Diff {
        diff(base, proposal)
    }

    /// Build a patch from a diff of the same two packs
    ///
    /// # Errors
    /// Returns [`EngineError::Patch`] if the diff does not describe the packs
    pub fn build_patch(&self, base: &Pack, proposal: &Pack, diff: &Diff) -> Result<Patch, EngineError> {
        Ok(build_patch(base, proposal, diff)?)
    }

    /// Diff two packs and build the patch between them
    ///
    /// # Errors
    /// See [`SpecPackEngine::build_patch`]
    pub fn propose(&self, base: &Pack, proposal: &Pack) -> Result<Proposal, EngineError> {
        let diff = diff(base, proposal);
        let patch = build_patch(base, proposal, &diff)?;
        Ok(Proposal { diff, patch })
    }

    /// Apply a patch with the configured compression
    ///
    /// # Errors
    /// Returns [`EngineError::Apply`]; conflicts are listed by
    /// [`EngineError::conflicts`]
    pub async fn apply(&self, pack: &Pack, patch: &Patch) -> Result<ApplyOutcome, EngineError> {
        let pack = pack.clone();
        let patch = patch.clone();
        let options = self.config.archive_options();
        Ok(tokio::task::spawn_blocking(move || apply_patch_with(&pack, &patch, options)).await??)
    }

    /// Cherry-pick document groups
    ///
    /// # Errors
    /// Returns [`EngineError::Merge`] if a group selects a missing secondary
    pub fn merge(
        &self,
        base: &Pack,
        current: &Pack,
        secondary: Option<&Pack>,
        selection: &GroupSelection,
    ) -> Result<MergeOutcome, EngineError> {
        Ok(merge_groups(base, current, secondary, selection)?)
    }

    /// Wrap a patch as a saved proposal with a fresh id
    #[must_use]
    pub fn save_proposal(&self, patch: Patch) -> SavedProposal {
        let saved_at = self
            .clock
            .now()
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        SavedProposal::new(Uuid::new_v4().to_string(), saved_at, patch)
    }

    /// Current governance record
    ///
    /// # Errors
    /// Propagates store errors
    pub async fn record(&self, project: &ProjectId) -> Result<GovernanceRecord, EngineError> {
        Ok(self.governance.record(project).await?)
    }

    /// Lock a pack as the project's truth
    ///
    /// # Errors
    /// - [`EngineError::ValidationFailed`] if the pack has validation errors
    /// - governance errors
    pub async fn lock(
        &self,
        project: &ProjectId,
        pack: &Pack,
        inputs: ProvenanceInputs,
    ) -> Result<GovernanceRecord, EngineError> {
        gate(pack)?;
        let archive = self.serialize(pack).await?;
        let request = LockRequest::new(pack.clone(), archive).with_inputs(inputs);
        Ok(self.governance.lock(project, request).await?)
    }

    /// Apply a patch to `base` and lock the result
    ///
    /// # Errors
    /// - [`EngineError::Apply`] if the patch conflicts with `base`
    /// - [`EngineError::ValidationFailed`] if the merged pack has errors
    /// - governance errors
    pub async fn lock_patch(
        &self,
        project: &ProjectId,
        base: &Pack,
        patch: &Patch,
        inputs: ProvenanceInputs,
    ) -> Result<PatchLockOutcome, EngineError> {
        let outcome = self.apply(base, patch).await?;
        gate(&outcome.merged)?;
        let inputs = inputs.with_patch_ops_digest(patch.ops_digest()?);
        let request =
            LockRequest::new(outcome.merged.clone(), outcome.archive).with_inputs(inputs);
        let record = self.governance.lock(project, request).await?;
        Ok(PatchLockOutcome {
            record,
            merged: outcome.merged,
            warnings: outcome.warnings,
        })
    }

    /// Apply a patch onto the last locked snapshot and lock the result
    ///
    /// The merged pack is validated while the project is held, so a
    /// concurrent relock cannot swap the base underneath the check.
    ///
    /// # Errors
    /// - [`EngineError::ValidationFailed`] if the merged pack has errors
    /// - governance errors, including adopt without a locked base
    pub async fn adopt(
        &self,
        project: &ProjectId,
        patch: &Patch,
    ) -> Result<PatchLockOutcome, EngineError> {
        self.governance.adopt_checked(project, patch, gate).await
    }

    /// Reopen the project's truth for editing
    ///
    /// # Errors
    /// Governance errors, including unlock while unlocked
    pub async fn unlock(&self, project: &ProjectId) -> Result<GovernanceRecord, EngineError> {
        Ok(self.governance.unlock(project).await?)
    }

    /// Last locked pack, if any
    ///
    /// # Errors
    /// Propagates store and decode errors
    pub async fn locked_pack(&self, project: &ProjectId) -> Result<Option<Pack>, EngineError> {
        Ok(self.governance.locked_pack(project).await?)
    }
}

fn gate(pack: &Pack) -> Result<(), EngineError> {
    let report = validate(pack);
    if report.is_pass() {
        return Ok(());
    }
    tracing::warn!(errors = report.errors().count(), "Refusing to lock invalid pack");
    Err(EngineError::ValidationFailed { report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use specpack_governance::{verify_history, FixedClock};
    use specpack_test_utils::{sample_spec_pack, sample_spec_pack_with};

    fn engine() -> SpecPackEngine {
        SpecPackEngine::new(EngineConfig::new().with_app_version("test/1"))
    }

    #[tokio::test]
    async fn import_reports_hashes_and_diagnostics() {
        let engine = engine();
        let pack = sample_spec_pack("demo");
        let bytes = engine.serialize(&pack).await.unwrap();

        let imported = engine.import(bytes).await.unwrap();
        assert_eq!(imported.pack, pack);
        assert_eq!(imported.hashes, PackHashReport::compute(&pack));
        assert!(imported.validation.is_pass());
    }

    #[tokio::test]
    async fn import_rejects_garbage() {
        let err = engine().import(b"not a zip".to_vec()).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_ARCHIVE");
    }

    #[tokio::test]
    async fn invalid_pack_is_not_locked() {
        let engine = engine();
        let project = ProjectId::from("demo");
        let broken = sample_spec_pack_with("demo", "ux/scenes.json", json!({"scenes": []}));

        let err = engine
            .lock(&project, &broken, ProvenanceInputs::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_FAILED");
        assert_eq!(engine.record(&project).await.unwrap().version, 0);
    }

    #[tokio::test]
    async fn lock_stamps_configured_versions() {
        let engine = engine();
        let project = ProjectId::from("demo");
        let record = engine
            .lock(&project, &sample_spec_pack("demo"), ProvenanceInputs::new())
            .await
            .unwrap();
        let provenance = &record.last_locked.unwrap().provenance;
        assert_eq!(provenance.app_version, "test/1");
        assert_eq!(provenance.validator_version, specpack_validate::VALIDATOR_VERSION);
    }

    #[tokio::test]
    async fn adopt_is_gated_on_the_merged_pack() {
        let engine = engine();
        let project = ProjectId::from("demo");
        let base = sample_spec_pack("demo");
        engine
            .lock(&project, &base, ProvenanceInputs::new())
            .await
            .unwrap();
        engine.unlock(&project).await.unwrap();

        let broken = sample_spec_pack_with("demo", "ux/scenes.json", json!({"scenes": []}));
        let proposal = engine.propose(&base, &broken).unwrap();
        let err = engine.adopt(&project, &proposal.patch).await.unwrap_err();
        assert!(matches!(err, EngineError::ValidationFailed { .. }));
        assert_eq!(engine.record(&project).await.unwrap().history.len(), 2);
    }

    #[tokio::test]
    async fn adopt_racing_a_relock_only_locks_valid_packs() {
        let engine = engine();
        let project = ProjectId::from("demo");
        let v1 = sample_spec_pack("demo");
        engine
            .lock(&project, &v1, ProvenanceInputs::new())
            .await
            .unwrap();
        engine.unlock(&project).await.unwrap();

        let v2 = sample_spec_pack_with(
            "demo",
            "design/palette.json",
            json!({"mode": "dark", "colors": {"primary": "#000000"}}),
        );
        let patch = engine.propose(&v1, &v2).unwrap().patch;
        // Applies cleanly onto this too, but the result has no entry scene
        let broken = sample_spec_pack_with("demo", "ux/scenes.json", json!({"scenes": []}));
        let broken_archive = engine.serialize(&broken).await.unwrap();

        let (adopted, _) = tokio::join!(engine.adopt(&project, &patch), async {
            let request = LockRequest::new(broken.clone(), broken_archive.clone());
            let _ = engine.governance().lock(&project, request).await;
            let _ = engine.governance().unlock(&project).await;
        });

        if let Ok(outcome) = adopted {
            assert!(validate(&outcome.merged).is_pass());
            assert_eq!(
                outcome.record.truth_digest(),
                Some(PackHashReport::compute(&outcome.merged).pack_digest)
            );
        }
        let record = engine.record(&project).await.unwrap();
        verify_history(&record.history).unwrap();
    }

    #[tokio::test]
    async fn saved_proposals_use_the_clock() {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()));
        let engine = engine().with_clock(clock);
        let base = sample_spec_pack("demo");
        let patch = engine.propose(&base, &base).unwrap().patch;

        let saved = engine.save_proposal(patch.clone());
        assert_eq!(saved.saved_at, "2024-01-02T03:04:05Z");
        assert_eq!(saved.patch, patch);
        assert!(Uuid::parse_str(&saved.proposal_id).is_ok());
    }
}
