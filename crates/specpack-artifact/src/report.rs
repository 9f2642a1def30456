//! Per-file and whole-pack digests
//!
//! The pack digest is the digest of the canonical encoding of the sorted
//! per-file list, never of archive bytes, so it is insensitive to incidental
//! archive differences (compression, member order in foreign archives).

use crate::canonical::canonicalize;
use crate::hash::ContentHash;
use crate::pack::Pack;
use crate::path::PackPath;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Digest entry for one member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHash {
    /// Member path
    pub path: PackPath,
    /// Content digest
    pub digest: ContentHash,
    /// Content size in bytes
    pub size: u64,
}

/// Hash report of a whole pack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackHashReport {
    /// Digest over the canonical file list
    pub pack_digest: ContentHash,
    /// Per-file digests, sorted by path
    pub files: Vec<FileHash>,
}

impl PackHashReport {
    /// Hash every member and derive the pack digest
    ///
    /// # Performance
    /// Member digests are computed in parallel; O(total bytes).
    #[must_use]
    pub fn compute(pack: &Pack) -> Self {
        let files: Vec<FileHash> = pack
            .files()
            .par_iter()
            .map(|f| FileHash {
                path: f.path().clone(),
                digest: f.digest(),
                size: f.size(),
            })
            .collect();
        let pack_digest = pack_digest(&files);
        Self { pack_digest, files }
    }

    /// Digest for a path, if present
    #[must_use]
    pub fn digest_of(&self, path: &str) -> Option<ContentHash> {
        self.files
            .binary_search_by(|f| f.path.as_str().cmp(path))
            .ok()
            .map(|i| self.files[i].digest)
    }
}

/// Digest of a file list (sorted by path before encoding)
#[must_use]
pub fn pack_digest(files: &[FileHash]) -> ContentHash {
    let mut sorted: Vec<&FileHash> = files.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));
    let list: Vec<Value> = sorted
        .iter()
        .map(|f| json!({"path": f.path.as_str(), "digest": f.digest.to_string(), "size": f.size}))
        .collect();
    ContentHash::compute(canonicalize(&Value::Array(list)).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_files_in_order() {
        let pack = Pack::from_entries([("b", b"2".to_vec()), ("a", b"1".to_vec())]).unwrap();
        let report = PackHashReport::compute(&pack);
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.files[0].path.as_str(), "a");
        assert_eq!(report.files[0].size, 1);
        assert_eq!(report.digest_of("b"), Some(ContentHash::compute(b"2")));
        assert_eq!(report.digest_of("c"), None);
    }

    #[test]
    fn pack_digest_is_two_level() {
        let pack = Pack::from_entries([("a", b"1".to_vec())]).unwrap();
        let expected_text = format!(
            r#"[{{"path":"a","digest":"{}","size":1}}]"#,
            ContentHash::compute(b"1")
        );
        assert_eq!(
            PackHashReport::compute(&pack).pack_digest,
            ContentHash::compute(expected_text.as_bytes())
        );
    }

    #[test]
    fn pack_digest_ignores_list_order() {
        let pack = Pack::from_entries([("a", b"1".to_vec()), ("b", b"2".to_vec())]).unwrap();
        let report = PackHashReport::compute(&pack);
        let mut reversed = report.files.clone();
        reversed.reverse();
        assert_eq!(pack_digest(&reversed), report.pack_digest);
    }

    #[test]
    fn pack_digest_sensitive_to_content_and_name() {
        let a = Pack::from_entries([("a", b"1".to_vec())]).unwrap();
        let b = Pack::from_entries([("a", b"2".to_vec())]).unwrap();
        let c = Pack::from_entries([("c", b"1".to_vec())]).unwrap();
        let da = PackHashReport::compute(&a).pack_digest;
        assert_ne!(da, PackHashReport::compute(&b).pack_digest);
        assert_ne!(da, PackHashReport::compute(&c).pack_digest);
    }
}
