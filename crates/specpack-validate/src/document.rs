//! Registry of known pack documents
//!
//! Each known document is a [`DocumentKind`] variant with a fixed member path
//! and its own field rules. The registry is additive: members it does not
//! know are reported as warnings, never rejected.

use serde_json::Value;
use specpack_artifact::{Pack, PackPath, MANIFEST_PATH};
use std::collections::BTreeMap;

/// Directory whose members are opaque assets, never reported as unknown
pub const ASSETS_DIR: &str = "assets";

/// Known document types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocumentKind {
    /// `manifest.json`
    Manifest,
    /// `spec/build_intent.json`: what is being built, for whom
    BuildIntent,
    /// `design/palette.json`: color mode and named colors
    Palette,
    /// `ia/tree.json`: information architecture tree
    IaTree,
    /// `ux/scenes.json`: screens, exactly one entry
    Scenes,
    /// `ux/flows.json`: step sequences over scenes
    Flows,
}

impl DocumentKind {
    /// Every registered kind
    pub const ALL: [Self; 6] = [
        Self::Manifest,
        Self::BuildIntent,
        Self::Palette,
        Self::IaTree,
        Self::Scenes,
        Self::Flows,
    ];

    /// Fixed member path
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Manifest => MANIFEST_PATH,
            Self::BuildIntent => "spec/build_intent.json",
            Self::Palette => "design/palette.json",
            Self::IaTree => "ia/tree.json",
            Self::Scenes => "ux/scenes.json",
            Self::Flows => "ux/flows.json",
        }
    }

    /// Kind registered at a path
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.path() == path)
    }
}

/// A registered document found in a pack
#[derive(Debug, Clone)]
pub(crate) struct Document {
    pub(crate) path: PackPath,
    pub(crate) value: Value,
}

/// Registered documents that parsed as JSON, keyed by kind
#[derive(Debug, Clone, Default)]
pub(crate) struct Documents {
    parsed: BTreeMap<DocumentKind, Document>,
}

impl Documents {
    /// Parse every registered document present in the pack
    ///
    /// Returns the parsed set and the kinds that failed to parse, with the
    /// parser message.
    pub(crate) fn collect(pack: &Pack) -> (Self, Vec<(PackPath, String)>) {
        let mut parsed = BTreeMap::new();
        let mut failures = Vec::new();
        for kind in DocumentKind::ALL {
            let Some(file) = pack.lookup(kind.path()) else {
                continue;
            };
            match file.as_json() {
                Ok(value) => {
                    parsed.insert(
                        kind,
                        Document {
                            path: file.path().clone(),
                            value,
                        },
                    );
                }
                Err(e) => failures.push((file.path().clone(), e.to_string())),
            }
        }
        (Self { parsed }, failures)
    }

    pub(crate) fn get(&self, kind: DocumentKind) -> Option<&Document> {
        self.parsed.get(&kind)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (DocumentKind, &Document)> {
        self.parsed.iter().map(|(k, d)| (*k, d))
    }
}

/// Escape one JSON pointer reference token
pub(crate) fn pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}
