//! Spec Pack artifact model
//!
//! Deterministic, content-addressed document archives.
//!
//! # Core Concepts
//!
//! - [`Pack`]: immutable, path-ordered set of named files
//! - [`PackPath`]: validated member path
//! - [`ContentHash`]: 32-byte SHA-256 digest for content addressing
//! - [`PackHashReport`]: per-file digests plus the two-level pack digest
//! - [`canonical`]: byte-stable JSON encoding
//! - [`parse_pack`] / [`serialize_pack`]: reproducible zip codec
//!
//! # Example
//!
//! ```rust,ignore
//! use specpack_artifact::{PackBuilder, PackHashReport, serialize_pack, parse_pack};
//!
//! let mut builder = PackBuilder::new();
//! builder.insert_json("spec/build_intent.json", &intent)?.with_manifest("proj-1")?;
//! let pack = builder.build();
//!
//! let bytes = serialize_pack(&pack)?;
//! assert_eq!(parse_pack(&bytes)?, pack);
//! println!("digest: {}", PackHashReport::compute(&pack).pack_digest);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod canonical;

mod archive;
mod hash;
mod manifest;
mod pack;
mod path;
mod report;

pub use archive::{
    parse_pack, serialize_pack, serialize_pack_with, ArchiveError, ArchiveOptions, Compression,
    ParseError,
};
pub use canonical::{CanonicalError, PLACEHOLDER_TIMESTAMP};
pub use hash::{ContentHash, HashError};
pub use manifest::{Manifest, ManifestCheck, MANIFEST_PATH, MANIFEST_SCHEMA};
pub use pack::{Pack, PackBuilder, PackError, PackFile};
pub use path::{PackPath, PathError};
pub use report::{pack_digest, FileHash, PackHashReport};

/// Archive format version stamped into provenance
pub const FORMAT_VERSION: &str = "specpack-zip/1";

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn synthesized_pack_survives_archive_roundtrip_with_same_digest() {
        let mut builder = PackBuilder::new();
        builder
            .insert_json("ux/scenes.json", &json!({"scenes": [{"id": "home", "entry": true}]}))
            .unwrap()
            .with_manifest("demo")
            .unwrap();
        let pack = builder.build();

        let bytes = serialize_pack(&pack).unwrap();
        let parsed = parse_pack(&bytes).unwrap();

        assert_eq!(
            PackHashReport::compute(&pack).pack_digest,
            PackHashReport::compute(&parsed).pack_digest
        );
        assert!(parsed.manifest().is_ok());
    }

    #[test]
    fn digest_does_not_depend_on_compression() {
        let pack = Pack::from_entries([("a.txt", b"hello".to_vec())]).unwrap();
        let stored =
            serialize_pack_with(&pack, ArchiveOptions::with_compression(Compression::Stored))
                .unwrap();
        let deflated = serialize_pack(&pack).unwrap();
        assert_ne!(stored, deflated);
        assert_eq!(
            PackHashReport::compute(&parse_pack(&stored).unwrap()).pack_digest,
            PackHashReport::compute(&parse_pack(&deflated).unwrap()).pack_digest
        );
    }
}
