//! Structural tier: manifest presence and cross-check, document parseability,
//! unknown members.

use crate::document::{DocumentKind, ASSETS_DIR};
use crate::issue::{IssueCode, ValidationIssue};
use specpack_artifact::{ManifestCheck, Pack, PackPath, MANIFEST_PATH, MANIFEST_SCHEMA};
use std::collections::BTreeSet;

pub(crate) fn check(
    pack: &Pack,
    parse_failures: &[(PackPath, String)],
    issues: &mut Vec<ValidationIssue>,
) {
    check_manifest(pack, issues);

    for (path, reason) in parse_failures {
        // An unreadable manifest is already reported as MANIFEST_INVALID
        if path.as_str() == MANIFEST_PATH {
            continue;
        }
        issues.push(
            ValidationIssue::error(
                IssueCode::DocumentInvalidJson,
                format!("document is not valid JSON: {reason}"),
            )
            .in_file(path),
        );
    }

    for path in pack.paths() {
        if DocumentKind::from_path(path.as_str()).is_none() && !path.is_under(ASSETS_DIR) {
            issues.push(
                ValidationIssue::warn(
                    IssueCode::DocumentUnknown,
                    "file is not a registered document",
                )
                .in_file(path),
            );
        }
    }
}

fn check_manifest(pack: &Pack, issues: &mut Vec<ValidationIssue>) {
    let Ok(manifest_path) = PackPath::new(MANIFEST_PATH) else {
        return;
    };

    let check = pack.manifest();
    let manifest = match &check {
        ManifestCheck::Missing => {
            issues.push(ValidationIssue::error(
                IssueCode::ManifestMissing,
                format!("pack has no {MANIFEST_PATH}"),
            ));
            return;
        }
        ManifestCheck::Invalid { reason } => {
            issues.push(
                ValidationIssue::error(IssueCode::ManifestInvalid, format!("unreadable manifest: {reason}"))
                    .in_file(&manifest_path),
            );
            return;
        }
        ManifestCheck::Ok(manifest) | ManifestCheck::Drift { manifest, .. } => manifest,
    };

    if manifest.schema != MANIFEST_SCHEMA {
        issues.push(
            ValidationIssue::warn(
                IssueCode::ManifestSchemaUnknown,
                format!("schema '{}' is not '{MANIFEST_SCHEMA}'", manifest.schema),
            )
            .in_file(&manifest_path)
            .at("/schema"),
        );
    }

    let mut seen = BTreeSet::new();
    for (i, entry) in manifest.contents.iter().enumerate() {
        if !seen.insert(entry) {
            issues.push(
                ValidationIssue::warn(
                    IssueCode::ManifestDuplicateEntry,
                    format!("'{entry}' is listed more than once"),
                )
                .in_file(&manifest_path)
                .at(format!("/contents/{i}")),
            );
        }
    }

    if let ManifestCheck::Drift {
        missing, unlisted, ..
    } = &check
    {
        for path in missing {
            issues.push(
                ValidationIssue::error(
                    IssueCode::ManifestFileMissing,
                    "listed in manifest but absent from pack",
                )
                .in_file(path),
            );
        }
        for path in unlisted {
            issues.push(
                ValidationIssue::warn(
                    IssueCode::ManifestFileUnlisted,
                    "present in pack but not listed in manifest",
                )
                .in_file(path),
            );
        }
    }
}
