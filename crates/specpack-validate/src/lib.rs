//! Spec Pack validator
//!
//! Produces a [`ValidationReport`] for a [`Pack`] in three cumulative tiers:
//!
//! - **Structural**: manifest presence and cross-check, document parseability,
//!   unregistered members
//! - **Schema**: closed value sets on known documents ([`DocumentKind`])
//! - **Referential**: IA tree shape, scene and flow references
//!
//! Every tier runs regardless of earlier findings. Validation has no hidden
//! state: the same pack always yields the same report.
//!
//! # Example
//!
//! ```rust,ignore
//! use specpack_validate::validate;
//!
//! let report = validate(&pack);
//! if !report.is_pass() {
//!     for issue in report.errors() {
//!         eprintln!("{}: {}", issue.code, issue.message);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod document;
mod issue;
mod references;
mod schema;
mod structural;

pub use document::{DocumentKind, ASSETS_DIR};
pub use issue::{IssueCode, Severity, ValidationIssue, ValidationReport, ValidationStatus};
pub use schema::EnumField;

use document::Documents;
use specpack_artifact::Pack;

/// Validator version stamped into provenance
pub const VALIDATOR_VERSION: &str = concat!("specpack-validate/", env!("CARGO_PKG_VERSION"));

/// Validate a pack
#[must_use]
pub fn validate(pack: &Pack) -> ValidationReport {
    let (docs, parse_failures) = Documents::collect(pack);

    let mut issues = Vec::new();
    structural::check(pack, &parse_failures, &mut issues);
    schema::check(&docs, &mut issues);
    references::check(&docs, &mut issues);

    let report = ValidationReport::from_issues(issues);
    tracing::debug!(
        files = pack.len(),
        errors = report.errors().count(),
        warnings = report.warnings().count(),
        "Validated pack"
    );
    report
}
