//! Group merge
//!
//! Builds a pack by taking whole document groups from one of up to three
//! source packs. This is a selection, not a content merge: a path is always
//! copied verbatim from exactly one source.

use serde::{Deserialize, Serialize};
use specpack_artifact::{ManifestCheck, Pack, PackBuilder, MANIFEST_PATH};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Named document group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupName {
    /// Build intent
    Intent,
    /// Visual design
    Design,
    /// Information architecture
    Ia,
    /// Scenes and flows
    Ux,
}

impl GroupName {
    /// Every group
    pub const ALL: [Self; 4] = [Self::Intent, Self::Design, Self::Ia, Self::Ux];

    /// Member paths belonging to the group
    #[must_use]
    pub fn paths(self) -> &'static [&'static str] {
        match self {
            Self::Intent => &["spec/build_intent.json"],
            Self::Design => &["design/palette.json"],
            Self::Ia => &["ia/tree.json"],
            Self::Ux => &["ux/scenes.json", "ux/flows.json"],
        }
    }

    /// Group a path belongs to
    #[must_use]
    pub fn of_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.paths().contains(&path))
    }

    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Intent => "intent",
            Self::Design => "design",
            Self::Ia => "ia",
            Self::Ux => "ux",
        }
    }
}

impl Display for GroupName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source pack for a group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupSource {
    /// The common ancestor
    Base,
    /// The working pack
    #[default]
    Current,
    /// An alternative pack
    Secondary,
}

impl Display for GroupSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Base => "base",
            Self::Current => "current",
            Self::Secondary => "secondary",
        })
    }
}

/// Source chosen per group; unselected groups come from `current`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupSelection(BTreeMap<GroupName, GroupSource>);

impl GroupSelection {
    /// Empty selection
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `group` from `source`
    #[must_use]
    pub fn with(mut self, group: GroupName, source: GroupSource) -> Self {
        self.0.insert(group, source);
        self
    }

    /// Source for a group
    #[must_use]
    pub fn source_for(&self, group: GroupName) -> GroupSource {
        self.0.get(&group).copied().unwrap_or_default()
    }

    /// Explicit selections in group order
    pub fn iter(&self) -> impl Iterator<Item = (GroupName, GroupSource)> + '_ {
        self.0.iter().map(|(g, s)| (*g, *s))
    }
}

impl FromIterator<(GroupName, GroupSource)> for GroupSelection {
    fn from_iter<I: IntoIterator<Item = (GroupName, GroupSource)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Successful merge
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The new pack
    pub merged: Pack,
    /// Advisory findings
    pub warnings: Vec<String>,
}

/// Assemble a pack group by group
///
/// # Errors
/// Returns [`MergeError::SecondaryMissing`] if a group selects the secondary
/// source and none was supplied
pub fn merge_groups(
    base: &Pack,
    current: &Pack,
    secondary: Option<&Pack>,
    selection: &GroupSelection,
) -> Result<MergeOutcome, MergeError> {
    if secondary.is_none() {
        if let Some((group, _)) = selection.iter().find(|(_, s)| *s == GroupSource::Secondary) {
            return Err(MergeError::SecondaryMissing { group });
        }
    }

    let mut builder = PackBuilder::from_pack(current);
    let mut warnings = Vec::new();

    for (group, source) in selection.iter() {
        let from = match source {
            GroupSource::Base => base,
            GroupSource::Current => current,
            GroupSource::Secondary => match secondary {
                Some(pack) => pack,
                None => return Err(MergeError::SecondaryMissing { group }),
            },
        };
        for path in group.paths() {
            builder.remove(path);
            match from.lookup(path) {
                Some(file) => {
                    builder.copy_from(file);
                }
                None => warnings.push(format!(
                    "group '{group}': {path} is absent in {source} pack"
                )),
            }
        }
    }

    let merged = builder.build();
    match merged.manifest() {
        ManifestCheck::Ok(_) => {}
        ManifestCheck::Missing if !current.contains(MANIFEST_PATH) => {}
        check => warnings.push(check.describe()),
    }

    tracing::debug!(
        groups = ?selection.iter().collect::<Vec<_>>(),
        files = merged.len(),
        warnings = warnings.len(),
        "Merged groups"
    );
    Ok(MergeOutcome { merged, warnings })
}

/// Errors merging groups
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// A group selects the secondary pack but none was given
    #[error("group '{group}' selects the secondary pack, which was not supplied")]
    SecondaryMissing {
        /// First such group
        group: GroupName,
    },
}
