//! # Property-Based Tests
//!
//! Idempotence and density invariants of the photo-slot maintenance
//! operations, plus codec stability, checked with proptest.

use lineage_core::codec::number_sensitive_cmp;
use lineage_core::{LineageDate, PhotoSlot, ProviderLocator, Record};
use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use std::cmp::Ordering;

// =============================================================================
// STRATEGIES
// =============================================================================

/// A URI: either a provider shorthand or a plain link, drawn from a small
/// pool so duplicates are common.
fn uri() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z0-9_-]{1,4}".prop_map(|code| format!("ig://{}", code)),
        (0u8..6).prop_map(|n| format!("https://example.com/{}.jpg", n)),
    ]
}

fn slot() -> impl Strategy<Value = PhotoSlot> {
    (
        uri(),
        proptest::option::of("[a-c]{1,6}"),
        vec("[a-c]", 0..3),
        proptest::option::of((2010i32..2024, 1u32..13, 1u32..29)),
    )
        .prop_map(|(uri, author, tags, date)| {
            let mut slot = PhotoSlot::new(uri);
            slot.author = author;
            slot.tags = tags;
            slot.commitdate = date
                .and_then(|(y, m, d)| LineageDate::from_ymd(y, m, d))
                .map(|d| d.to_string());
            slot
        })
}

/// A record with photo slots at arbitrary, possibly sparse, indices.
fn sparse_record() -> impl Strategy<Value = Record> {
    (btree_set(1u32..40, 0..12), vec(slot(), 12)).prop_map(|(indices, slots)| {
        let mut record = Record::new("panda");
        for (index, slot) in indices.into_iter().zip(slots) {
            record.photos.insert(index, slot);
        }
        record
    })
}

/// Dense indices 1..=n.
fn dense_record() -> impl Strategy<Value = Record> {
    vec(slot(), 0..12).prop_map(|slots| {
        let mut record = Record::new("panda");
        for (i, slot) in slots.into_iter().enumerate() {
            record.photos.insert(i as u32 + 1, slot);
        }
        record
    })
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Compacting twice equals compacting once, and the result is dense.
    #[test]
    fn compact_is_idempotent_and_dense(mut record in sparse_record(), bound in 0u32..50) {
        let count = record.photos.len();
        record.compact(bound);
        prop_assert!(record.photos.is_dense());
        prop_assert_eq!(record.photos.len(), count);

        let once = record.clone();
        prop_assert!(!record.compact(bound));
        prop_assert_eq!(record, once);
    }

    /// Merging twice equals merging once; no two slots share a resolved URI.
    #[test]
    fn merge_is_idempotent_and_dense(mut record in sparse_record()) {
        let provider = ProviderLocator::default();
        record.merge_duplicates(&provider, 0);
        prop_assert!(record.photos.is_dense());

        let mut seen = std::collections::BTreeSet::new();
        for (_, slot) in record.photos.iter() {
            prop_assert!(seen.insert(provider.resolve(&slot.uri)));
        }

        let once = record.clone();
        prop_assert_eq!(record.merge_duplicates(&provider, 0), 0);
        prop_assert_eq!(record, once);
    }

    /// Reordering twice equals reordering once, and keeps a dense record dense.
    #[test]
    fn reorder_is_idempotent_and_dense(mut record in dense_record()) {
        let provider = ProviderLocator::default();
        let count = record.photos.len();
        record.reorder_by_provider_locator(&provider);
        prop_assert!(record.photos.is_dense());
        prop_assert_eq!(record.photos.len(), count);

        let once = record.clone();
        prop_assert!(!record.reorder_by_provider_locator(&provider));
        prop_assert_eq!(record, once);
    }

    /// Delete followed by compact keeps the sequence dense.
    #[test]
    fn delete_then_compact_is_dense(mut record in dense_record(), victim in 1u32..13) {
        let before = record.photos.len();
        let deleted = record.delete(victim);
        record.compact(before as u32);
        prop_assert!(record.photos.is_dense());
        prop_assert_eq!(record.photos.len(), before - usize::from(deleted));
    }

    /// Writing a record and parsing it back yields the same text again.
    #[test]
    fn written_records_are_stable(record in dense_record()) {
        let text = record.to_text();
        let reparsed = Record::parse(&text, "p.txt").expect("reparse");
        prop_assert_eq!(reparsed.to_text(), text);
    }

    /// The number-sensitive order is a total order consistent with equality.
    #[test]
    fn number_sensitive_order_is_antisymmetric(
        a in "[a-z0-9]{1,3}(\\.[a-z0-9]{1,3}){0,2}",
        b in "[a-z0-9]{1,3}(\\.[a-z0-9]{1,3}){0,2}",
    ) {
        let forward = number_sensitive_cmp(&a, &b);
        let backward = number_sensitive_cmp(&b, &a);
        prop_assert_eq!(forward, backward.reverse());
        if a == b {
            prop_assert_eq!(forward, Ordering::Equal);
        }
    }
}
