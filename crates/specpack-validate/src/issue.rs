//! Validation issues and reports

use serde::{Deserialize, Serialize};
use specpack_artifact::PackPath;
use std::fmt::{self, Display, Formatter};

/// Issue severity
///
/// Declaration order is the report order: errors sort before warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks trust decisions (locking, adoption)
    Error,
    /// Advisory only
    Warn,
}

/// Machine-readable issue codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    /// No manifest member
    ManifestMissing,
    /// Manifest member unreadable
    ManifestInvalid,
    /// Manifest declares an unknown schema
    ManifestSchemaUnknown,
    /// Manifest lists a path twice
    ManifestDuplicateEntry,
    /// Listed file absent from the pack
    ManifestFileMissing,
    /// File present but not listed
    ManifestFileUnlisted,
    /// Registered document is not JSON
    DocumentInvalidJson,
    /// Registered document has the wrong shape
    DocumentInvalidShape,
    /// File not in the document registry
    DocumentUnknown,
    /// Enumerated field has a value outside its set
    FieldInvalidValue,
    /// Enumerated field absent; a default applies
    FieldMissing,
    /// Palette color is not a hex color
    PaletteColorInvalid,
    /// IA tree node id used twice
    IaDuplicateNode,
    /// IA tree child references an unknown node
    IaUnknownChild,
    /// IA tree contains a cycle
    IaCycle,
    /// IA tree node references an unknown scene
    IaUnknownScene,
    /// Scene id used twice
    SceneDuplicateId,
    /// No scene marked as entry
    SceneEntryMissing,
    /// More than one scene marked as entry
    SceneEntryMultiple,
    /// Flow step references an unknown scene
    FlowUnresolvedScene,
}

impl IssueCode {
    /// Stable code string
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManifestMissing => "MANIFEST_MISSING",
            Self::ManifestInvalid => "MANIFEST_INVALID",
            Self::ManifestSchemaUnknown => "MANIFEST_SCHEMA_UNKNOWN",
            Self::ManifestDuplicateEntry => "MANIFEST_DUPLICATE_ENTRY",
            Self::ManifestFileMissing => "MANIFEST_FILE_MISSING",
            Self::ManifestFileUnlisted => "MANIFEST_FILE_UNLISTED",
            Self::DocumentInvalidJson => "DOCUMENT_INVALID_JSON",
            Self::DocumentInvalidShape => "DOCUMENT_INVALID_SHAPE",
            Self::DocumentUnknown => "DOCUMENT_UNKNOWN",
            Self::FieldInvalidValue => "FIELD_INVALID_VALUE",
            Self::FieldMissing => "FIELD_MISSING",
            Self::PaletteColorInvalid => "PALETTE_COLOR_INVALID",
            Self::IaDuplicateNode => "IA_DUPLICATE_NODE",
            Self::IaUnknownChild => "IA_UNKNOWN_CHILD",
            Self::IaCycle => "IA_CYCLE",
            Self::IaUnknownScene => "IA_UNKNOWN_SCENE",
            Self::SceneDuplicateId => "SCENE_DUPLICATE_ID",
            Self::SceneEntryMissing => "SCENE_ENTRY_MISSING",
            Self::SceneEntryMultiple => "SCENE_ENTRY_MULTIPLE",
            Self::FlowUnresolvedScene => "FLOW_UNRESOLVED_SCENE",
        }
    }
}

impl Display for IssueCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Severity
    pub severity: Severity,
    /// Machine-readable code
    pub code: IssueCode,
    /// Human-readable description
    pub message: String,
    /// Pack member the issue is about
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PackPath>,
    /// JSON pointer within the member
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
}

impl ValidationIssue {
    /// Error-severity issue
    #[must_use]
    pub fn error(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Warning-severity issue
    #[must_use]
    pub fn warn(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warn, code, message)
    }

    fn new(severity: Severity, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            file: None,
            pointer: None,
        }
    }

    /// Attach the member path
    #[must_use]
    pub fn in_file(mut self, file: &PackPath) -> Self {
        self.file = Some(file.clone());
        self
    }

    /// Attach a JSON pointer
    #[must_use]
    pub fn at(mut self, pointer: impl Into<String>) -> Self {
        self.pointer = Some(pointer.into());
        self
    }

    fn sort_key(&self) -> (Option<&str>, Severity, &'static str, Option<&str>, &str) {
        (
            self.file.as_ref().map(PackPath::as_str),
            self.severity,
            self.code.as_str(),
            self.pointer.as_deref(),
            &self.message,
        )
    }
}

/// Overall verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// No error-severity issues
    Pass,
    /// At least one error-severity issue
    Fail,
}

/// Result of validating a pack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Verdict
    pub status: ValidationStatus,
    /// Issues in deterministic order
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Build a report; sorts issues and derives the status
    #[must_use]
    pub fn from_issues(mut issues: Vec<ValidationIssue>) -> Self {
        issues.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        issues.dedup();
        let status = if issues.iter().any(|i| i.severity == Severity::Error) {
            ValidationStatus::Fail
        } else {
            ValidationStatus::Pass
        };
        Self { status, issues }
    }

    /// Whether the report passed
    #[inline]
    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.status == ValidationStatus::Pass
    }

    /// Error-severity issues
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    /// Warning-severity issues
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warn)
    }

    /// Issues with a given code
    pub fn with_code(&self, code: IssueCode) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> PackPath {
        PackPath::new(p).unwrap()
    }

    #[test]
    fn warn_only_report_passes() {
        let report = ValidationReport::from_issues(vec![ValidationIssue::warn(
            IssueCode::DocumentUnknown,
            "x",
        )]);
        assert!(report.is_pass());
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn any_error_fails() {
        let report = ValidationReport::from_issues(vec![
            ValidationIssue::warn(IssueCode::DocumentUnknown, "x"),
            ValidationIssue::error(IssueCode::IaCycle, "y"),
        ]);
        assert_eq!(report.status, ValidationStatus::Fail);
        assert_eq!(report.errors().count(), 1);
    }

    #[test]
    fn issues_sort_by_file_then_severity_then_code() {
        let report = ValidationReport::from_issues(vec![
            ValidationIssue::warn(IssueCode::FieldMissing, "m").in_file(&path("b.json")),
            ValidationIssue::error(IssueCode::IaCycle, "c").in_file(&path("b.json")),
            ValidationIssue::error(IssueCode::ManifestMissing, "none"),
            ValidationIssue::warn(IssueCode::DocumentUnknown, "u").in_file(&path("a.json")),
            ValidationIssue::error(IssueCode::FieldInvalidValue, "v")
                .in_file(&path("b.json"))
                .at("/z"),
            ValidationIssue::error(IssueCode::FieldInvalidValue, "v")
                .in_file(&path("b.json"))
                .at("/a"),
        ]);
        let order: Vec<(Option<&str>, &str, Option<&str>)> = report
            .issues
            .iter()
            .map(|i| (i.file.as_ref().map(PackPath::as_str), i.code.as_str(), i.pointer.as_deref()))
            .collect();
        assert_eq!(
            order,
            vec![
                (None, "MANIFEST_MISSING", None),
                (Some("a.json"), "DOCUMENT_UNKNOWN", None),
                (Some("b.json"), "FIELD_INVALID_VALUE", Some("/a")),
                (Some("b.json"), "FIELD_INVALID_VALUE", Some("/z")),
                (Some("b.json"), "IA_CYCLE", None),
                (Some("b.json"), "FIELD_MISSING", None),
            ]
        );
    }

    #[test]
    fn serializes_with_lowercase_severity_and_code_strings() {
        let issue = ValidationIssue::error(IssueCode::SceneEntryMissing, "no entry")
            .in_file(&path("ux/scenes.json"));
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["severity"], "error");
        assert_eq!(json["code"], "SCENE_ENTRY_MISSING");
        assert!(json.get("pointer").is_none());
    }
}
