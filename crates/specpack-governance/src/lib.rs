//! Spec Pack governance
//!
//! Designates one pack per project as the truth and reopens it for editing.
//!
//! # Core Concepts
//!
//! - [`GovernanceStatus`]: `unlocked` or `locked`; transitions via
//!   [`validate_transition`]
//! - [`GovernanceRecord`]: status, the last [`LockedSnapshot`], the open
//!   [`WorkingCopy`] and a hash-chained history
//! - [`GovernanceStore`]: versioned persistence with compare-and-swap
//! - [`SnapshotStore`]: locked archive bytes, addressed by digest
//! - [`Governance`]: the service running `lock`, `unlock` and `adopt`
//!
//! Locked bytes are never overwritten. An unlock leaves `last_locked` in
//! place and opens a new working copy from it.
//!
//! # Example
//!
//! ```rust,ignore
//! use specpack_governance::{Governance, GovernanceConfig, LockRequest, ProjectId};
//!
//! let gov = Governance::in_memory(GovernanceConfig::default());
//! let project = ProjectId::from("proj-1");
//! let record = gov.lock(&project, LockRequest::new(pack, archive)).await?;
//! assert!(record.is_locked());
//! gov.unlock(&project).await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod governance;
mod provenance;
mod record;
mod state;
mod store;

pub use error::{GovernanceError, StoreError};
pub use governance::{
    Clock, FixedClock, Governance, GovernanceConfig, LockRequest, PatchLockOutcome, SystemClock,
};
pub use provenance::{append_entry, entry_hash, verify_history, Provenance, ProvenanceInputs};
pub use record::{GovernanceRecord, HistoryEntry, LockedSnapshot, ProjectId, WorkingCopy};
pub use state::{allowed_transitions, validate_transition, GovernanceEvent, GovernanceStatus};
pub use store::{GovernanceStore, InMemoryStore, SnapshotStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
