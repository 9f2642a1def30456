//! Governance persistence
//!
//! [`GovernanceStore`] holds one record per project and only accepts a write
//! from a caller that read the current version. [`SnapshotStore`] keeps
//! locked archive bytes by digest so they survive unlocks.

use crate::error::StoreError;
use crate::record::{GovernanceRecord, ProjectId};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use specpack_artifact::ContentHash;
use std::sync::Arc;

/// Versioned governance record storage
#[async_trait]
pub trait GovernanceStore: Send + Sync + std::fmt::Debug {
    /// Current record; a default record at version 0 if none was written
    async fn load(&self, project: &ProjectId) -> Result<GovernanceRecord, StoreError>;

    /// Replace the record if its version is still `expected_version`
    ///
    /// The stored record gets version `expected_version + 1` and is
    /// returned.
    ///
    /// # Errors
    /// Returns [`StoreError::VersionConflict`] if another writer got there first
    async fn compare_and_swap(
        &self,
        project: &ProjectId,
        expected_version: u64,
        next: GovernanceRecord,
    ) -> Result<GovernanceRecord, StoreError>;
}

/// Content-addressed archive storage
#[async_trait]
pub trait SnapshotStore: Send + Sync + std::fmt::Debug {
    /// Store archive bytes under their digest
    async fn put(&self, digest: ContentHash, archive: Arc<[u8]>) -> Result<(), StoreError>;

    /// Archive bytes for a digest
    async fn get(&self, digest: &ContentHash) -> Result<Option<Arc<[u8]>>, StoreError>;
}

/// In-process store for both records and snapshots
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: DashMap<ProjectId, GovernanceRecord>,
    snapshots: DashMap<ContentHash, Arc<[u8]>>,
}

impl InMemoryStore {
    /// Empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots
    #[inline]
    #[must_use]
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }
}

#[async_trait]
impl GovernanceStore for InMemoryStore {
    async fn load(&self, project: &ProjectId) -> Result<GovernanceRecord, StoreError> {
        Ok(self
            .records
            .get(project)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }

    async fn compare_and_swap(
        &self,
        project: &ProjectId,
        expected_version: u64,
        mut next: GovernanceRecord,
    ) -> Result<GovernanceRecord, StoreError> {
        let conflict = |actual| StoreError::VersionConflict {
            project: project.to_string(),
            expected: expected_version,
            actual,
        };
        next.version = expected_version + 1;

        match self.records.entry(project.clone()) {
            Entry::Occupied(mut entry) => {
                let actual = entry.get().version;
                if actual != expected_version {
                    return Err(conflict(actual));
                }
                entry.insert(next.clone());
            }
            Entry::Vacant(entry) => {
                if expected_version != 0 {
                    return Err(conflict(0));
                }
                entry.insert(next.clone());
            }
        }
        Ok(next)
    }
}

#[async_trait]
impl SnapshotStore for InMemoryStore {
    async fn put(&self, digest: ContentHash, archive: Arc<[u8]>) -> Result<(), StoreError> {
        self.snapshots.entry(digest).or_insert(archive);
        Ok(())
    }

    async fn get(&self, digest: &ContentHash) -> Result<Option<Arc<[u8]>>, StoreError> {
        Ok(self.snapshots.get(digest).map(|a| Arc::clone(a.value())))
    }
}
