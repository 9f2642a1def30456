//! Structural diff between two packs
//!
//! A pure function of its inputs: nothing is cached and nothing carries an
//! identity beyond the two packs, so recomputing is always safe.

use crate::text::file_patch;
use serde::{Deserialize, Serialize};
use specpack_artifact::{Pack, PackPath};
use std::collections::BTreeSet;

/// How a path differs between base and proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    /// Only in the proposal
    Added,
    /// Only in the base
    Removed,
    /// In both, bytes differ
    Modified,
    /// In both, byte-identical
    Unchanged,
}

/// Per-path diff entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    /// Member path
    pub path: PackPath,
    /// Classification
    pub kind: DiffKind,
    /// Base-side size
    pub old_size: Option<u64>,
    /// Proposal-side size
    pub new_size: Option<u64>,
    /// Unified diff or size summary; empty when unchanged
    pub patch_text: String,
}

/// Entry counts per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    /// Added paths
    pub added: usize,
    /// Removed paths
    pub removed: usize,
    /// Modified paths
    pub modified: usize,
    /// Unchanged paths
    pub unchanged: usize,
}

impl DiffStats {
    fn record(&mut self, kind: DiffKind) {
        match kind {
            DiffKind::Added => self.added += 1,
            DiffKind::Removed => self.removed += 1,
            DiffKind::Modified => self.modified += 1,
            DiffKind::Unchanged => self.unchanged += 1,
        }
    }

    /// Number of paths that differ
    #[inline]
    #[must_use]
    pub fn changed(&self) -> usize {
        self.added + self.removed + self.modified
    }
}

/// Diff of two packs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    /// One entry per path in either pack, in path order
    pub files: Vec<FileDiff>,
    /// Counts per kind
    pub stats: DiffStats,
    /// Concatenated patch text of every changed entry
    pub full_patch_text: String,
}

impl Diff {
    /// Entries that are not unchanged
    pub fn changes(&self) -> impl Iterator<Item = &FileDiff> {
        self.files.iter().filter(|f| f.kind != DiffKind::Unchanged)
    }

    /// Entry for a path
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&FileDiff> {
        self.files
            .binary_search_by(|f| f.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.files[i])
    }

    /// Whether the packs differ at all
    #[inline]
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.stats.changed() > 0
    }
}

/// Compare `base` with `proposal`
#[must_use]
pub fn diff(base: &Pack, proposal: &Pack) -> Diff {
    let paths: BTreeSet<&PackPath> = base.paths().chain(proposal.paths()).collect();

    let mut files = Vec::with_capacity(paths.len());
    let mut stats = DiffStats::default();
    let mut full_patch_text = String::new();

    for path in paths {
        let old = base.lookup(path.as_str());
        let new = proposal.lookup(path.as_str());
        let kind = match (old, new) {
            (None, Some(_)) => DiffKind::Added,
            (Some(_), None) => DiffKind::Removed,
            (Some(o), Some(n)) if o.bytes() == n.bytes() => DiffKind::Unchanged,
            _ => DiffKind::Modified,
        };
        stats.record(kind);

        let patch_text = if kind == DiffKind::Unchanged {
            String::new()
        } else {
            file_patch(path, old, new)
        };
        full_patch_text.push_str(&patch_text);

        files.push(FileDiff {
            path: path.clone(),
            kind,
            old_size: old.map(|f| f.size()),
            new_size: new.map(|f| f.size()),
            patch_text,
        });
    }

    tracing::debug!(
        added = stats.added,
        removed = stats.removed,
        modified = stats.modified,
        unchanged = stats.unchanged,
        "Computed pack diff"
    );

    Diff {
        files,
        stats,
        full_patch_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use specpack_test_utils::{pack_from, scenario_base, scenario_proposal};

    #[test]
    fn scenario_stats() {
        let d = diff(&scenario_base(), &scenario_proposal());
        assert_eq!(
            d.stats,
            DiffStats {
                added: 1,
                removed: 0,
                modified: 1,
                unchanged: 1,
            }
        );
        let kinds: Vec<(&str, DiffKind)> =
            d.files.iter().map(|f| (f.path.as_str(), f.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("A", DiffKind::Unchanged),
                ("B", DiffKind::Modified),
                ("C", DiffKind::Added),
            ]
        );
    }

    #[test]
    fn removal_is_detected() {
        let d = diff(&scenario_proposal(), &scenario_base());
        let c = d.file("C").unwrap();
        assert_eq!(c.kind, DiffKind::Removed);
        assert_eq!(c.old_size, Some(1));
        assert_eq!(c.new_size, None);
    }

    #[test]
    fn full_patch_concatenates_changes_in_path_order() {
        let base = pack_from(&[("a.txt", "1\n"), ("b.txt", "same\n"), ("c.txt", "x\n")]);
        let proposal = pack_from(&[("a.txt", "2\n"), ("b.txt", "same\n")]);
        let d = diff(&base, &proposal);

        let expected: String = d.changes().map(|f| f.patch_text.as_str()).collect();
        assert_eq!(d.full_patch_text, expected);
        assert!(d.full_patch_text.find("a/a.txt") < d.full_patch_text.find("a/c.txt"));
        assert!(!d.full_patch_text.contains("b.txt"));
    }

    #[test]
    fn identical_packs_have_no_changes() {
        let d = diff(&scenario_base(), &scenario_base());
        assert!(!d.has_changes());
        assert!(d.full_patch_text.is_empty());
    }

    #[test]
    fn inputs_are_untouched() {
        let base = scenario_base();
        let proposal = scenario_proposal();
        let _ = diff(&base, &proposal);
        assert_eq!(base, scenario_base());
        assert_eq!(proposal, scenario_proposal());
    }
}
