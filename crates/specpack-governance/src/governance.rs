//! Governance service
//!
//! Transitions read the record, validate, then write it back with
//! compare-and-swap. Within one process, transitions for the same project
//! are also serialized by a per-project mutex, so a version conflict means a
//! writer in another process. Snapshot bytes are written only once the
//! record write has gone through.

use crate::error::GovernanceError;
use crate::provenance::{append_entry, Provenance, ProvenanceInputs};
use crate::record::{GovernanceRecord, LockedSnapshot, ProjectId, WorkingCopy};
use crate::state::{validate_transition, GovernanceEvent};
use crate::store::{GovernanceStore, InMemoryStore, SnapshotStore};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use specpack_artifact::{
    parse_pack, ArchiveOptions, ContentHash, Pack, PackHashReport, FORMAT_VERSION,
};
use specpack_composition::{apply_patch_with, ApplyOutcome, Patch};
use specpack_validate::VALIDATOR_VERSION;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Time source for timestamps
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays
#[derive(Debug)]
pub struct FixedClock(RwLock<DateTime<Utc>>);

impl FixedClock {
    /// Clock stopped at `at`
    #[must_use]
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(RwLock::new(at))
    }

    /// Move the clock forward
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.0.write();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.read()
    }
}

/// Versions stamped into provenance, and the archive options for merged packs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernanceConfig {
    /// Application version
    pub app_version: String,
    /// Validator version
    pub validator_version: String,
    /// Archive format version
    pub format_version: String,
    /// Options for archives produced by patch apply
    pub archive: ArchiveOptions,
}

impl GovernanceConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With application version
    #[inline]
    #[must_use]
    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    /// With archive options
    #[inline]
    #[must_use]
    pub fn with_archive_options(mut self, archive: ArchiveOptions) -> Self {
        self.archive = archive;
        self
    }
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            app_version: concat!("specpack/", env!("CARGO_PKG_VERSION")).to_string(),
            validator_version: VALIDATOR_VERSION.to_string(),
            format_version: FORMAT_VERSION.to_string(),
            archive: ArchiveOptions::default(),
        }
    }
}

/// A pack to lock, with the archive bytes that will be preserved
#[derive(Debug, Clone)]
pub struct LockRequest {
    /// Pack to designate as truth
    pub pack: Pack,
    /// Its serialized archive
    pub archive: Arc<[u8]>,
    /// Provenance digests
    pub inputs: ProvenanceInputs,
}

impl LockRequest {
    /// Request without provenance inputs
    #[must_use]
    pub fn new(pack: Pack, archive: impl Into<Arc<[u8]>>) -> Self {
        Self {
            pack,
            archive: archive.into(),
            inputs: ProvenanceInputs::default(),
        }
    }

    /// With provenance inputs
    #[inline]
    #[must_use]
    pub fn with_inputs(mut self, inputs: ProvenanceInputs) -> Self {
        self.inputs = inputs;
        self
    }
}

/// Result of locking a patched pack
#[derive(Debug, Clone)]
pub struct PatchLockOutcome {
    /// Stored record after the lock
    pub record: GovernanceRecord,
    /// The pack now locked
    pub merged: Pack,
    /// Apply warnings
    pub warnings: Vec<String>,
}

/// Lock/unlock governance over projects
#[derive(Debug)]
pub struct Governance {
    store: Arc<dyn GovernanceStore>,
    snapshots: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    config: GovernanceConfig,
    project_locks: DashMap<ProjectId, Arc<Mutex<()>>>,
}

impl Governance {
    /// Service over the given stores
    #[must_use]
    pub fn new(
        store: Arc<dyn GovernanceStore>,
        snapshots: Arc<dyn SnapshotStore>,
        config: GovernanceConfig,
    ) -> Self {
        Self {
            store,
            snapshots,
            clock: Arc::new(SystemClock),
            config,
            project_locks: DashMap::new(),
        }
    }

    /// Service over a fresh in-memory store
    #[must_use]
    pub fn in_memory(config: GovernanceConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::new(store.clone(), store, config)
    }

    /// Replace the clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    /// Current record for a project
    ///
    /// # Errors
    /// Propagates store errors
    pub async fn record(&self, project: &ProjectId) -> Result<GovernanceRecord, GovernanceError> {
        Ok(self.store.load(project).await?)
    }

    /// Designate a pack as truth
    ///
    /// # Errors
    /// - [`GovernanceError::AlreadyLocked`] if the project is locked
    /// - [`GovernanceError::ArchiveMismatch`] if the archive is not the pack
    /// - store errors, including a lost compare-and-swap
    pub async fn lock(
        &self,
        project: &ProjectId,
        request: LockRequest,
    ) -> Result<GovernanceRecord, GovernanceError> {
        let _held = self.hold(project).await;
        self.lock_held(project, request).await
    }

    /// Apply a patch to `base` and lock the result
    ///
    /// Nothing is written if the apply fails.
    ///
    /// # Errors
    /// As [`Governance::lock`], plus [`GovernanceError::Apply`]
    pub async fn lock_from_patch(
        &self,
        project: &ProjectId,
        base: &Pack,
        patch: &Patch,
        inputs: ProvenanceInputs,
    ) -> Result<PatchLockOutcome, GovernanceError> {
        let _held = self.hold(project).await;
        self.ensure_lockable(project).await?;
        let inputs = inputs.with_patch_ops_digest(patch.ops_digest()?);
        let outcome = self.apply_for_lock(base, patch).await?;
        self.commit_patch_lock(project, outcome, inputs).await
    }

    /// Apply a patch onto the last locked snapshot and lock the result
    ///
    /// # Errors
    /// - [`GovernanceError::AdoptWithoutBase`] if nothing was ever locked
    /// - [`GovernanceError::SnapshotMissing`] if the snapshot bytes are gone
    /// - as [`Governance::lock_from_patch`]
    pub async fn adopt(
        &self,
        project: &ProjectId,
        patch: &Patch,
    ) -> Result<PatchLockOutcome, GovernanceError> {
        self.adopt_checked(project, patch, |_| Ok(())).await
    }

    /// [`Governance::adopt`], with `check` run on the merged pack first
    ///
    /// `check` runs while the project is held, so the pack it accepts is the
    /// pack that gets locked. Nothing is written if it fails.
    ///
    /// # Errors
    /// As [`Governance::adopt`], plus whatever `check` returns
    pub async fn adopt_checked<E, F>(
        &self,
        project: &ProjectId,
        patch: &Patch,
        check: F,
    ) -> Result<PatchLockOutcome, E>
    where
        E: From<GovernanceError>,
        F: FnOnce(&Pack) -> Result<(), E>,
    {
        let _held = self.hold(project).await;

        let (base, base_archive_digest) = self.adopt_base(project).await?;
        let inputs = ProvenanceInputs {
            base_archive_digest: Some(base_archive_digest),
            ..ProvenanceInputs::default()
        }
        .with_patch_ops_digest(patch.ops_digest().map_err(GovernanceError::from)?);
        let outcome = self.apply_for_lock(&base, patch).await?;

        check(&outcome.merged)?;
        Ok(self.commit_patch_lock(project, outcome, inputs).await?)
    }

    /// Reopen the truth for editing
    ///
    /// # Errors
    /// - [`GovernanceError::NotLocked`] if the project is unlocked
    /// - store errors, including a lost compare-and-swap
    pub async fn unlock(&self, project: &ProjectId) -> Result<GovernanceRecord, GovernanceError> {
        let _held = self.hold(project).await;

        let record = self.store.load(project).await?;
        let status = validate_transition(record.status, GovernanceEvent::Unlock)?;
        let from_locked_digest = record
            .last_locked
            .as_ref()
            .map(|s| s.pack_digest)
            .ok_or_else(|| GovernanceError::Inconsistent("locked without a snapshot".to_string()))?;

        let now = self.clock.now();
        let mut next = record.clone();
        next.status = status;
        next.working = Some(WorkingCopy {
            working_copy_id: Uuid::new_v4(),
            unlocked_at: now,
            from_locked_digest,
        });
        append_entry(&mut next.history, now, GovernanceEvent::Unlock, Some(from_locked_digest));

        let stored = self
            .store
            .compare_and_swap(project, record.version, next)
            .await?;
        tracing::info!(
            %project,
            from = %from_locked_digest.short(),
            version = stored.version,
            "Unlocked project"
        );
        Ok(stored)
    }

    /// Archive bytes of the last locked snapshot, locked or not
    ///
    /// # Errors
    /// Propagates store errors
    pub async fn locked_archive(
        &self,
        project: &ProjectId,
    ) -> Result<Option<Arc<[u8]>>, GovernanceError> {
        let record = self.store.load(project).await?;
        match record.last_locked {
            Some(snapshot) => Ok(Some(self.snapshot_archive(&snapshot).await?.1)),
            None => Ok(None),
        }
    }

    /// Decoded pack of the last locked snapshot
    ///
    /// # Errors
    /// Propagates store and decode errors
    pub async fn locked_pack(&self, project: &ProjectId) -> Result<Option<Pack>, GovernanceError> {
        match self.locked_archive(project).await? {
            Some(archive) => Ok(Some(decode(archive).await?)),
            None => Ok(None),
        }
    }

    async fn hold(&self, project: &ProjectId) -> ProjectGuard<'_> {
        let lock = Arc::clone(
            self.project_locks
                .entry(project.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        ProjectGuard {
            locks: &self.project_locks,
            project: project.clone(),
            held: Some(lock.lock_owned().await),
        }
    }

    async fn ensure_lockable(&self, project: &ProjectId) -> Result<GovernanceRecord, GovernanceError> {
        let record = self.store.load(project).await?;
        validate_transition(record.status, GovernanceEvent::Lock)?;
        Ok(record)
    }

    /// Last locked pack and its archive digest
    async fn adopt_base(&self, project: &ProjectId) -> Result<(Pack, ContentHash), GovernanceError> {
        let record = self.ensure_lockable(project).await?;
        let Some(snapshot) = record.last_locked else {
            return Err(GovernanceError::AdoptWithoutBase);
        };
        let (archive_digest, archive) = self.snapshot_archive(&snapshot).await?;
        Ok((decode(archive).await?, archive_digest))
    }

    async fn snapshot_archive(
        &self,
        snapshot: &LockedSnapshot,
    ) -> Result<(ContentHash, Arc<[u8]>), GovernanceError> {
        let digest = snapshot.provenance.locked_archive_digest.ok_or_else(|| {
            GovernanceError::Inconsistent("snapshot has no locked_archive_digest".to_string())
        })?;
        let archive = self
            .snapshots
            .get(&digest)
            .await?
            .ok_or(GovernanceError::SnapshotMissing { digest })?;
        Ok((digest, archive))
    }

    async fn apply_for_lock(&self, base: &Pack, patch: &Patch) -> Result<ApplyOutcome, GovernanceError> {
        let base = base.clone();
        let patch = patch.clone();
        let options = self.config.archive;
        Ok(tokio::task::spawn_blocking(move || apply_patch_with(&base, &patch, options)).await??)
    }

    async fn commit_patch_lock(
        &self,
        project: &ProjectId,
        outcome: ApplyOutcome,
        inputs: ProvenanceInputs,
    ) -> Result<PatchLockOutcome, GovernanceError> {
        let request = LockRequest::new(outcome.merged.clone(), outcome.archive).with_inputs(inputs);
        let record = self.lock_held(project, request).await?;
        Ok(PatchLockOutcome {
            record,
            merged: outcome.merged,
            warnings: outcome.warnings,
        })
    }

    async fn lock_held(
        &self,
        project: &ProjectId,
        request: LockRequest,
    ) -> Result<GovernanceRecord, GovernanceError> {
        let record = self.store.load(project).await?;
        let status = validate_transition(record.status, GovernanceEvent::Lock)?;

        let LockRequest {
            pack,
            archive,
            inputs,
        } = request;
        let report = tokio::task::spawn_blocking(move || PackHashReport::compute(&pack)).await?;
        let archived = decode(Arc::clone(&archive)).await?;
        let archived_digest =
            tokio::task::spawn_blocking(move || PackHashReport::compute(&archived).pack_digest)
                .await?;
        if archived_digest != report.pack_digest {
            return Err(GovernanceError::ArchiveMismatch {
                expected: report.pack_digest,
                actual: archived_digest,
            });
        }

        let locked_archive_digest = ContentHash::compute(&archive);
        let now = self.clock.now();
        let snapshot = LockedSnapshot {
            locked_at: now,
            pack_digest: report.pack_digest,
            files: report.files,
            provenance: Provenance {
                base_archive_digest: inputs.base_archive_digest,
                proposal_archive_digest: inputs.proposal_archive_digest,
                patch_ops_digest: inputs.patch_ops_digest,
                locked_archive_digest: Some(locked_archive_digest),
                app_version: self.config.app_version.clone(),
                validator_version: self.config.validator_version.clone(),
                format_version: self.config.format_version.clone(),
            },
        };

        let mut next = record.clone();
        next.status = status;
        next.working = None;
        append_entry(&mut next.history, now, GovernanceEvent::Lock, Some(snapshot.pack_digest));
        next.last_locked = Some(snapshot);

        let stored = self
            .store
            .compare_and_swap(project, record.version, next)
            .await?;
        // Only committed locks reach the snapshot store
        self.snapshots.put(locked_archive_digest, archive).await?;
        tracing::info!(
            %project,
            digest = %report.pack_digest.short(),
            version = stored.version,
            "Locked project"
        );
        Ok(stored)
    }
}

/// Holds a project's mutex; drops the map entry once nobody else wants it
struct ProjectGuard<'a> {
    locks: &'a DashMap<ProjectId, Arc<Mutex<()>>>,
    project: ProjectId,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for ProjectGuard<'_> {
    fn drop(&mut self) {
        drop(self.held.take());
        // Each waiter holds its own clone
        self.locks
            .remove_if(&self.project, |_, lock| Arc::strong_count(lock) == 1);
    }
}

async fn decode(archive: Arc<[u8]>) -> Result<Pack, GovernanceError> {
    Ok(tokio::task::spawn_blocking(move || parse_pack(&archive)).await??)
}
