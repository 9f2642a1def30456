//! Testing utilities for the Spec Pack workspace
//!
//! Shared fixtures and proptest strategies.

#![allow(missing_docs)]

use proptest::prelude::*;
use serde_json::{json, Value};
use specpack_artifact::{Pack, PackBuilder};

/// Pack of plain text members, no manifest
pub fn pack_from(entries: &[(&str, &str)]) -> Pack {
    Pack::from_entries(entries.iter().map(|(p, c)| (*p, c.as_bytes().to_vec()))).unwrap()
}

/// `{A: "x", B: "y"}`
pub fn scenario_base() -> Pack {
    pack_from(&[("A", "x"), ("B", "y")])
}

/// `{A: "x", B: "z", C: "w"}`
pub fn scenario_proposal() -> Pack {
    pack_from(&[("A", "x"), ("B", "z"), ("C", "w")])
}

/// Documents of a pack that validates with no issues
pub fn sample_documents() -> Vec<(&'static str, Value)> {
    vec![
        (
            "spec/build_intent.json",
            json!({"platform": "web", "stage": "mvp", "audience": "consumer"}),
        ),
        (
            "design/palette.json",
            json!({"mode": "light", "colors": {"primary": "#3366ff", "surface": "#ffffff"}}),
        ),
        (
            "ia/tree.json",
            json!({"nodes": [
                {"id": "root", "kind": "page", "children": ["settings"], "scene": "home"},
                {"id": "settings", "kind": "section", "children": [], "scene": "settings"}
            ]}),
        ),
        (
            "ux/scenes.json",
            json!({"scenes": [
                {"id": "home", "layout": "stack", "entry": true},
                {"id": "settings", "layout": "grid"}
            ]}),
        ),
        (
            "ux/flows.json",
            json!({"flows": [
                {"id": "open-settings", "steps": [
                    {"scene": "home", "trigger": "auto"},
                    {"scene": "settings", "trigger": "tap"}
                ]}
            ]}),
        ),
    ]
}

/// Manifested pack built from documents
pub fn spec_pack_with(project_id: &str, documents: &[(&str, Value)]) -> Pack {
    let mut builder = PackBuilder::new();
    for (path, value) in documents {
        builder.insert_json(path, value).unwrap();
    }
    builder.with_manifest(project_id).unwrap();
    builder.build()
}

/// Valid, manifested pack for `project_id`
pub fn sample_spec_pack(project_id: &str) -> Pack {
    spec_pack_with(project_id, &sample_documents())
}

/// Sample pack with one document replaced (or added)
pub fn sample_spec_pack_with(project_id: &str, path: &str, value: Value) -> Pack {
    let mut documents: Vec<(&str, Value)> = sample_documents()
        .into_iter()
        .filter(|(p, _)| *p != path)
        .collect();
    documents.push((path, value));
    spec_pack_with(project_id, &documents)
}

/// Valid member paths of one to three segments
pub fn arb_pack_path() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z][a-z0-9_]{0,7}", 1..=3).prop_map(|segments| segments.join("/"))
}

/// Packs of up to `max_files` text and binary members, no manifest
pub fn arb_pack(max_files: usize) -> impl Strategy<Value = Pack> {
    prop::collection::btree_map(
        arb_pack_path(),
        prop::collection::vec(any::<u8>(), 0..64),
        0..=max_files,
    )
    .prop_map(|files| Pack::from_entries(files).unwrap())
}

/// Packs whose members are newline-separated text lines
pub fn arb_text_pack(max_files: usize) -> impl Strategy<Value = Pack> {
    prop::collection::btree_map(
        arb_pack_path().prop_map(|p| format!("{p}.txt")),
        prop::collection::vec("[a-z ]{0,12}", 0..6).prop_map(|lines| lines.join("\n")),
        0..=max_files,
    )
    .prop_map(|files| {
        Pack::from_entries(files.into_iter().map(|(p, c)| (p, c.into_bytes()))).unwrap()
    })
}
