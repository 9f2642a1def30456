//! Spec Pack composition
//!
//! Operations that compare and combine packs:
//!
//! - [`diff`]: added / removed / modified / unchanged per path, with unified
//!   text patches for text members
//! - [`build_patch`]: turn a diff into a [`Patch`] whose ops carry the base
//!   digest they expect
//! - [`apply_patch`]: optimistic compare-and-swap over every touched path;
//!   all or nothing
//! - [`merge_groups`]: cherry-pick whole document groups from up to three packs
//!
//! # Example
//!
//! ```rust,ignore
//! use specpack_composition::{apply_patch, build_patch, diff};
//!
//! let d = diff(&base, &proposal);
//! let patch = build_patch(&base, &proposal, &d)?;
//! match apply_patch(&live, &patch) {
//!     Ok(outcome) => save(outcome.archive),
//!     Err(e) => for c in e.conflicts() {
//!         eprintln!("{} moved: expected {:?}, found {:?}", c.path, c.expected, c.actual);
//!     },
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod apply;
mod diff;
mod merge;
mod patch;
mod text;

pub use apply::{apply_patch, apply_patch_with, ApplyError, ApplyOutcome, ConflictDetail};
pub use diff::{diff, Diff, DiffKind, DiffStats, FileDiff};
pub use merge::{merge_groups, GroupName, GroupSelection, GroupSource, MergeError, MergeOutcome};
pub use patch::{build_patch, Patch, PatchError, PatchOp, PatchOpKind, SavedProposal};
pub use text::{is_text_path, CONTEXT_LINES, TEXT_EXTENSIONS};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
