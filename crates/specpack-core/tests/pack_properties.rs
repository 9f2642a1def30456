//! Cross-crate properties of the pack codec, diff/patch and validator.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use specpack_artifact::{parse_pack, serialize_pack, Pack, PackBuilder, PackHashReport};
use specpack_composition::{apply_patch, build_patch, diff, ApplyError};
use specpack_test_utils::{arb_pack, arb_pack_path, arb_text_pack, sample_spec_pack_with};
use specpack_validate::validate;

proptest! {
    /// Serializing, parsing and serializing again yields the same bytes.
    #[test]
    fn archive_roundtrip_is_byte_stable(pack in arb_pack(8)) {
        prop_assume!(!pack.is_empty());
        let first = serialize_pack(&pack).unwrap();
        let parsed = parse_pack(&first).unwrap();
        let second = serialize_pack(&parsed).unwrap();

        prop_assert_eq!(&parsed, &pack);
        prop_assert_eq!(first, second);
        prop_assert_eq!(
            PackHashReport::compute(&parsed).pack_digest,
            PackHashReport::compute(&pack).pack_digest
        );
    }

    /// Insertion order does not reach the archive bytes or the digest.
    #[test]
    fn insertion_order_is_irrelevant(
        entries in prop::collection::btree_map(arb_pack_path(), "[a-z]{0,16}", 1..8)
            .prop_map(|m| m.into_iter().collect::<Vec<_>>())
            .prop_shuffle()
    ) {
        let mut forward = PackBuilder::new();
        for (path, content) in &entries {
            forward.insert_bytes(path, content.as_bytes().to_vec()).unwrap();
        }
        let mut backward = PackBuilder::new();
        for (path, content) in entries.iter().rev() {
            backward.insert_bytes(path, content.as_bytes().to_vec()).unwrap();
        }
        let (a, b) = (forward.build(), backward.build());

        prop_assert_eq!(serialize_pack(&a).unwrap(), serialize_pack(&b).unwrap());
        prop_assert_eq!(
            PackHashReport::compute(&a).pack_digest,
            PackHashReport::compute(&b).pack_digest
        );
    }

    /// Applying the patch built from diff(a, b) to a yields b.
    #[test]
    fn patch_from_diff_reproduces_the_proposal(a in arb_text_pack(6), b in arb_text_pack(6)) {
        let d = diff(&a, &b);
        let patch = build_patch(&a, &b, &d).unwrap();
        let outcome = apply_patch(&a, &patch).unwrap();

        prop_assert_eq!(
            PackHashReport::compute(&outcome.merged).pack_digest,
            PackHashReport::compute(&b).pack_digest
        );
        prop_assert_eq!(d.stats.changed(), patch.ops.len());
    }

    /// Any mutation of a touched path in the target is reported as a conflict on that path.
    #[test]
    fn drift_on_a_touched_path_is_named(a in arb_text_pack(6), b in arb_text_pack(6), pick in any::<prop::sample::Index>()) {
        let d = diff(&a, &b);
        let patch = build_patch(&a, &b, &d).unwrap();
        let touched: Vec<_> = patch
            .ops
            .iter()
            .filter(|op| op.expected_base_digest.is_some())
            .map(|op| op.path.clone())
            .collect();
        prop_assume!(!touched.is_empty());
        let victim = pick.get(&touched);

        let mut drifted = PackBuilder::from_pack(&a);
        drifted.upsert(victim.clone(), b"drifted\n".to_vec());
        let drifted = drifted.build();
        prop_assume!(drifted != a);

        match apply_patch(&drifted, &patch) {
            Err(ApplyError::Conflict { details }) => {
                prop_assert_eq!(details.len(), 1);
                prop_assert_eq!(&details[0].path, victim);
            }
            other => prop_assert!(false, "expected conflict, got {:?}", other.map(|o| o.merged)),
        }
    }

    /// The validator has no hidden state.
    #[test]
    fn validation_is_repeatable(pack in arb_pack(6)) {
        prop_assert_eq!(validate(&pack), validate(&pack));
    }
}

#[test]
fn broken_spec_pack_validates_identically_twice() {
    let pack = sample_spec_pack_with(
        "demo",
        "ia/tree.json",
        json!({"nodes": [
            {"id": "a", "kind": "page", "children": ["b"]},
            {"id": "b", "kind": "portal", "children": ["a", "ghost"]}
        ]}),
    );
    let first = validate(&pack);
    let second = validate(&pack);
    assert!(!first.is_pass());
    assert_eq!(first, second);
}

#[test]
fn empty_pack_archive_is_rejected_on_parse() {
    let bytes = serialize_pack(&Pack::empty()).unwrap();
    assert_eq!(parse_pack(&bytes).unwrap_err().code(), "EMPTY_ARCHIVE");
}
