//! Per-file textual patches
//!
//! Members with a known text extension whose content is UTF-8 on every
//! present side get a line-based unified diff. Everything else gets a
//! size-only description.

use similar::TextDiff;
use specpack_artifact::{PackFile, PackPath};

/// Extensions classified as text
pub const TEXT_EXTENSIONS: &[&str] = &[
    "json", "md", "txt", "yaml", "yml", "csv", "html", "css", "svg", "toml",
];

/// Lines of context around each hunk
pub const CONTEXT_LINES: usize = 3;

const DEV_NULL: &str = "/dev/null";

/// Whether a path has a text extension
#[must_use]
pub fn is_text_path(path: &PackPath) -> bool {
    path.extension()
        .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Patch text for one changed member
///
/// `old` is the base side, `new` the proposal side; at least one is present.
pub(crate) fn file_patch(path: &PackPath, old: Option<&PackFile>, new: Option<&PackFile>) -> String {
    let old_text = old.map(PackFile::as_text);
    let new_text = new.map(PackFile::as_text);

    // Some(None) means present but not UTF-8
    let textual = is_text_path(path)
        && !matches!(old_text, Some(None))
        && !matches!(new_text, Some(None));

    if textual {
        unified(
            path,
            old_text.flatten(),
            new_text.flatten(),
            old.is_some(),
            new.is_some(),
        )
    } else {
        binary_summary(path, old.map(PackFile::size), new.map(PackFile::size))
    }
}

fn unified(path: &PackPath, old: Option<&str>, new: Option<&str>, has_old: bool, has_new: bool) -> String {
    let old_header = if has_old {
        format!("a/{path}")
    } else {
        DEV_NULL.to_string()
    };
    let new_header = if has_new {
        format!("b/{path}")
    } else {
        DEV_NULL.to_string()
    };

    let rendered = TextDiff::from_lines(old.unwrap_or(""), new.unwrap_or(""))
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(&old_header, &new_header)
        .to_string();

    // Adding or removing an empty file produces no hunks
    if rendered.is_empty() {
        format!("--- {old_header}\n+++ {new_header}\n")
    } else {
        rendered
    }
}

fn binary_summary(path: &PackPath, old_size: Option<u64>, new_size: Option<u64>) -> String {
    match (old_size, new_size) {
        (None, Some(new)) => format!("Binary file b/{path} added ({new} bytes)\n"),
        (Some(old), None) => format!("Binary file a/{path} removed ({old} bytes)\n"),
        (Some(old), Some(new)) => {
            format!("Binary files a/{path} and b/{path} differ ({old} -> {new} bytes)\n")
        }
        (None, None) => String::new(),
    }
}
