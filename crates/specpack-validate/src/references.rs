//! Cross-document referential integrity
//!
//! - the IA tree must be a DAG whose children all resolve
//! - flow steps must resolve to declared scenes
//! - exactly one scene is the entry point
//!
//! Malformed entries were already reported by the schema tier and are
//! skipped here.

use crate::document::{Document, DocumentKind, Documents};
use crate::issue::{IssueCode, ValidationIssue};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub(crate) fn check(docs: &Documents, issues: &mut Vec<ValidationIssue>) {
    let scenes = docs.get(DocumentKind::Scenes).map(|doc| check_scenes(doc, issues));

    if let Some(doc) = docs.get(DocumentKind::IaTree) {
        check_ia_tree(doc, scenes.as_ref(), issues);
    }
    if let Some(doc) = docs.get(DocumentKind::Flows) {
        check_flows(doc, scenes.as_ref(), issues);
    }
}

fn entries<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = (usize, &'a serde_json::Map<String, Value>)> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .enumerate()
        .filter_map(|(i, v)| v.as_object().map(|o| (i, o)))
}

/// Returns the declared scene ids
fn check_scenes(doc: &Document, issues: &mut Vec<ValidationIssue>) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    let mut entry_scenes = Vec::new();

    for (i, scene) in entries(&doc.value, "scenes") {
        match scene.get("id").and_then(Value::as_str) {
            Some(id) => {
                if !ids.insert(id.to_string()) {
                    issues.push(
                        ValidationIssue::error(
                            IssueCode::SceneDuplicateId,
                            format!("scene id '{id}' is declared more than once"),
                        )
                        .in_file(&doc.path)
                        .at(format!("/scenes/{i}/id")),
                    );
                }
                if scene.get("entry").and_then(Value::as_bool) == Some(true) {
                    entry_scenes.push(id.to_string());
                }
            }
            None => issues.push(
                ValidationIssue::error(IssueCode::DocumentInvalidShape, "scene must have a string 'id'")
                    .in_file(&doc.path)
                    .at(format!("/scenes/{i}")),
            ),
        }
    }

    match entry_scenes.len() {
        1 => {}
        0 => issues.push(
            ValidationIssue::error(
                IssueCode::SceneEntryMissing,
                "no scene is marked as the entry point",
            )
            .in_file(&doc.path)
            .at("/scenes"),
        ),
        _ => issues.push(
            ValidationIssue::error(
                IssueCode::SceneEntryMultiple,
                format!(
                    "{} scenes are marked as the entry point: {}",
                    entry_scenes.len(),
                    entry_scenes.join(", ")
                ),
            )
            .in_file(&doc.path)
            .at("/scenes"),
        ),
    }

    ids
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

struct IaNode<'a> {
    index: usize,
    /// (position in `children`, child id) for children that resolve
    children: Vec<(usize, &'a str)>,
}

fn check_ia_tree(doc: &Document, scenes: Option<&BTreeSet<String>>, issues: &mut Vec<ValidationIssue>) {
    // First pass: ids, in declaration order
    let mut nodes: BTreeMap<&str, IaNode<'_>> = BTreeMap::new();
    let mut order: Vec<&str> = Vec::new();
    for (i, node) in entries(&doc.value, "nodes") {
        let Some(id) = node.get("id").and_then(Value::as_str) else {
            issues.push(
                ValidationIssue::error(IssueCode::DocumentInvalidShape, "node must have a string 'id'")
                    .in_file(&doc.path)
                    .at(format!("/nodes/{i}")),
            );
            continue;
        };
        if nodes.contains_key(id) {
            issues.push(
                ValidationIssue::error(
                    IssueCode::IaDuplicateNode,
                    format!("node id '{id}' is declared more than once"),
                )
                .in_file(&doc.path)
                .at(format!("/nodes/{i}/id")),
            );
            continue;
        }
        nodes.insert(
            id,
            IaNode {
                index: i,
                children: Vec::new(),
            },
        );
        order.push(id);
    }

    // Second pass: edges and scene references
    for (i, node) in entries(&doc.value, "nodes") {
        let Some(id) = node.get("id").and_then(Value::as_str) else {
            continue;
        };
        if nodes.get(id).map(|n| n.index) != Some(i) {
            continue;
        }

        let mut resolved = Vec::new();
        if let Some(children) = node.get("children").and_then(Value::as_array) {
            for (j, child) in children.iter().enumerate() {
                let pointer = format!("/nodes/{i}/children/{j}");
                match child.as_str() {
                    Some(child_id) if nodes.contains_key(child_id) => resolved.push((j, child_id)),
                    Some(child_id) => issues.push(
                        ValidationIssue::error(
                            IssueCode::IaUnknownChild,
                            format!("node '{id}' lists unknown child '{child_id}'"),
                        )
                        .in_file(&doc.path)
                        .at(pointer),
                    ),
                    None => issues.push(
                        ValidationIssue::error(IssueCode::DocumentInvalidShape, "child must be a node id string")
                            .in_file(&doc.path)
                            .at(pointer),
                    ),
                }
            }
        }
        if let Some(entry) = nodes.get_mut(id) {
            entry.children = resolved;
        }

        if let (Some(scene_ids), Some(scene)) = (scenes, node.get("scene").and_then(Value::as_str)) {
            if !scene_ids.contains(scene) {
                issues.push(
                    ValidationIssue::warn(
                        IssueCode::IaUnknownScene,
                        format!("node '{id}' references unknown scene '{scene}'"),
                    )
                    .in_file(&doc.path)
                    .at(format!("/nodes/{i}/scene")),
                );
            }
        }
    }

    // Third pass: cycles
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();
    for id in order {
        if !marks.contains_key(id) {
            walk(doc, id, &nodes, &mut marks, &mut stack, issues);
        }
    }
}

/// Depth-first walk from `root` with an explicit frame stack.
///
/// Each frame is a node id and the index of its next child to follow, so a
/// long chain costs heap instead of call stack. `stack` mirrors the frames
/// and holds the current path for cycle reporting.
fn walk<'a>(
    doc: &Document,
    root: &'a str,
    nodes: &BTreeMap<&'a str, IaNode<'a>>,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
    issues: &mut Vec<ValidationIssue>,
) {
    let mut frames: Vec<(&'a str, usize)> = vec![(root, 0)];
    marks.insert(root, Mark::Visiting);
    stack.push(root);

    while let Some(frame) = frames.last_mut() {
        let (id, next) = *frame;
        let edge = nodes
            .get(id)
            .and_then(|node| node.children.get(next).map(|&(j, child)| (node.index, j, child)));
        let Some((index, j, child)) = edge else {
            frames.pop();
            stack.pop();
            marks.insert(id, Mark::Visited);
            continue;
        };
        frame.1 += 1;

        match marks.get(child) {
            Some(Mark::Visited) => {}
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|s| *s == child).unwrap_or(0);
                let mut cycle: Vec<&str> = stack[start..].to_vec();
                cycle.push(child);
                issues.push(
                    ValidationIssue::error(
                        IssueCode::IaCycle,
                        format!("navigation cycle: {}", cycle.join(" -> ")),
                    )
                    .in_file(&doc.path)
                    .at(format!("/nodes/{index}/children/{j}")),
                );
            }
            None => {
                marks.insert(child, Mark::Visiting);
                stack.push(child);
                frames.push((child, 0));
            }
        }
    }
}

fn check_flows(doc: &Document, scenes: Option<&BTreeSet<String>>, issues: &mut Vec<ValidationIssue>) {
    for (i, flow) in entries(&doc.value, "flows") {
        let flow_id = flow.get("id").and_then(Value::as_str).unwrap_or("?");
        let Some(steps) = flow.get("steps").and_then(Value::as_array) else {
            continue;
        };
        for (j, step) in steps.iter().enumerate() {
            let Some(step) = step.as_object() else {
                continue;
            };
            let pointer = format!("/flows/{i}/steps/{j}/scene");
            let scene = step.get("scene").and_then(Value::as_str);
            let resolved = match (scene, scenes) {
                (Some(scene), Some(ids)) => ids.contains(scene),
                _ => false,
            };
            if resolved {
                continue;
            }
            let message = match (scene, scenes) {
                (None, _) => format!("flow '{flow_id}' step {j} has no scene reference"),
                (Some(scene), None) => format!(
                    "flow '{flow_id}' references scene '{scene}' but {} is absent",
                    DocumentKind::Scenes.path()
                ),
                (Some(scene), Some(_)) => {
                    format!("flow '{flow_id}' references unknown scene '{scene}'")
                }
            };
            issues.push(
                ValidationIssue::error(IssueCode::FlowUnresolvedScene, message)
                    .in_file(&doc.path)
                    .at(pointer),
            );
        }
    }
}
