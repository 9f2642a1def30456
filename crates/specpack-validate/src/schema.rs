//! Per-field schema tier
//!
//! Enumerated fields of known documents must hold one of a closed set of
//! values. A missing field is a warning (the default applies); an unknown
//! value is an error. Shape problems that make a document unwalkable are
//! reported here once, so the referential tier can skip malformed entries.

use crate::document::{pointer_token, Document, DocumentKind, Documents};
use crate::issue::{IssueCode, ValidationIssue};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$")
        .expect("hex color pattern is valid")
});

/// Closed-set string field
#[derive(Debug, Clone, Copy)]
pub struct EnumField {
    /// Object key
    pub key: &'static str,
    /// Accepted values
    pub allowed: &'static [&'static str],
    /// Value assumed when absent
    pub default: &'static str,
}

const BUILD_INTENT_FIELDS: &[EnumField] = &[
    EnumField {
        key: "platform",
        allowed: &["web", "mobile", "desktop"],
        default: "web",
    },
    EnumField {
        key: "stage",
        allowed: &["prototype", "mvp", "production"],
        default: "prototype",
    },
    EnumField {
        key: "audience",
        allowed: &["internal", "consumer", "business"],
        default: "consumer",
    },
];

const PALETTE_FIELDS: &[EnumField] = &[EnumField {
    key: "mode",
    allowed: &["light", "dark", "system"],
    default: "system",
}];

const IA_NODE_FIELDS: &[EnumField] = &[EnumField {
    key: "kind",
    allowed: &["page", "section", "modal"],
    default: "page",
}];

const SCENE_FIELDS: &[EnumField] = &[EnumField {
    key: "layout",
    allowed: &["stack", "grid", "split"],
    default: "stack",
}];

const FLOW_STEP_FIELDS: &[EnumField] = &[EnumField {
    key: "trigger",
    allowed: &["tap", "submit", "auto", "back"],
    default: "tap",
}];

impl DocumentKind {
    /// Enumerated fields checked on the document root
    #[must_use]
    pub fn root_fields(self) -> &'static [EnumField] {
        match self {
            Self::BuildIntent => BUILD_INTENT_FIELDS,
            Self::Palette => PALETTE_FIELDS,
            Self::Manifest | Self::IaTree | Self::Scenes | Self::Flows => &[],
        }
    }
}

pub(crate) fn check(docs: &Documents, issues: &mut Vec<ValidationIssue>) {
    for (kind, doc) in docs.iter() {
        // Manifest fields are covered by the structural tier
        if kind == DocumentKind::Manifest {
            continue;
        }
        let Some(root) = doc.value.as_object() else {
            issues.push(
                ValidationIssue::error(IssueCode::DocumentInvalidShape, "document root must be an object")
                    .in_file(&doc.path),
            );
            continue;
        };

        check_fields(doc, root, "", kind.root_fields(), issues);

        match kind {
            DocumentKind::Palette => check_colors(doc, root, issues),
            DocumentKind::IaTree => {
                for_each_entry(doc, root, "nodes", "", issues, |node, pointer, issues| {
                    check_fields(doc, node, &pointer, IA_NODE_FIELDS, issues);
                });
            }
            DocumentKind::Scenes => {
                for_each_entry(doc, root, "scenes", "", issues, |scene, pointer, issues| {
                    check_fields(doc, scene, &pointer, SCENE_FIELDS, issues);
                });
            }
            DocumentKind::Flows => {
                for_each_entry(doc, root, "flows", "", issues, |flow, pointer, issues| {
                    for_each_entry(doc, flow, "steps", &pointer, issues, |step, pointer, issues| {
                        check_fields(doc, step, &pointer, FLOW_STEP_FIELDS, issues);
                    });
                });
            }
            DocumentKind::Manifest | DocumentKind::BuildIntent => {}
        }
    }
}

/// Visit each object in `parent[key]`, reporting shape errors for a missing
/// or non-array list and for non-object entries.
fn for_each_entry<F>(
    doc: &Document,
    parent: &Map<String, Value>,
    key: &str,
    base_pointer: &str,
    issues: &mut Vec<ValidationIssue>,
    mut visit: F,
) where
    F: FnMut(&Map<String, Value>, String, &mut Vec<ValidationIssue>),
{
    let list_pointer = format!("{base_pointer}/{key}");
    let Some(items) = parent.get(key).and_then(Value::as_array) else {
        issues.push(
            ValidationIssue::error(
                IssueCode::DocumentInvalidShape,
                format!("'{key}' must be an array"),
            )
            .in_file(&doc.path)
            .at(list_pointer),
        );
        return;
    };
    for (i, item) in items.iter().enumerate() {
        let pointer = format!("{list_pointer}/{i}");
        match item.as_object() {
            Some(obj) => visit(obj, pointer, issues),
            None => issues.push(
                ValidationIssue::error(IssueCode::DocumentInvalidShape, "entry must be an object")
                    .in_file(&doc.path)
                    .at(pointer),
            ),
        }
    }
}

fn check_fields(
    doc: &Document,
    object: &Map<String, Value>,
    base_pointer: &str,
    fields: &[EnumField],
    issues: &mut Vec<ValidationIssue>,
) {
    for field in fields {
        let pointer = format!("{base_pointer}/{}", field.key);
        match object.get(field.key) {
            None | Some(Value::Null) => issues.push(
                ValidationIssue::warn(
                    IssueCode::FieldMissing,
                    format!(
                        "'{}' is not set; default will be assumed ('{}')",
                        field.key, field.default
                    ),
                )
                .in_file(&doc.path)
                .at(pointer),
            ),
            Some(Value::String(s)) if field.allowed.contains(&s.as_str()) => {}
            Some(other) => issues.push(
                ValidationIssue::error(
                    IssueCode::FieldInvalidValue,
                    format!(
                        "'{}' is {other}; expected one of {}",
                        field.key,
                        field.allowed.join(", ")
                    ),
                )
                .in_file(&doc.path)
                .at(pointer),
            ),
        }
    }
}

fn check_colors(doc: &Document, root: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    let Some(colors) = root.get("colors") else {
        return;
    };
    let Some(colors) = colors.as_object() else {
        issues.push(
            ValidationIssue::error(IssueCode::DocumentInvalidShape, "'colors' must be an object")
                .in_file(&doc.path)
                .at("/colors"),
        );
        return;
    };
    for (name, value) in colors {
        let valid = value.as_str().is_some_and(|s| HEX_COLOR.is_match(s));
        if !valid {
            issues.push(
                ValidationIssue::error(
                    IssueCode::PaletteColorInvalid,
                    format!("color '{name}' is {value}; expected #rgb, #rrggbb or #rrggbbaa"),
                )
                .in_file(&doc.path)
                .at(format!("/colors/{}", pointer_token(name))),
            );
        }
    }
}
