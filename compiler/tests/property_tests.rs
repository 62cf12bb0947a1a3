// Property-based tests for optimizer invariants.
//
// Three categories:
// 1. Access round-trip: rendered access sets re-extract to the same offsets
// 2. Box algebra laws: idempotence, commutativity, zero identity
// 3. Halo emptiness is consistent with the outward ordering
//
// Uses proptest with explicit, bounded strategies to keep runs fast.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use stopt::access::{extract_accesses, render_access};
use stopt::bounds::{Box3, Halo, Offset};

// ── Strategies ──────────────────────────────────────────────────────────────

/// Offsets within the default halo of 3 on each axis.
fn arb_offset() -> impl Strategy<Value = Offset> {
    prop::array::uniform3(-3i32..=3)
}

/// A small access list over a fixed pool of array names. Names avoid the
/// axis letters so the rendered text stays unambiguous.
fn arb_accesses() -> impl Strategy<Value = Vec<(String, Offset)>> {
    let name = prop_oneof![
        Just("uin".to_string()),
        Just("wgt".to_string()),
        Just("flx".to_string()),
        Just("acol".to_string()),
        Just("k88".to_string()),
    ];
    prop::collection::vec((name, arb_offset()), 1..12)
}

fn arb_box() -> impl Strategy<Value = Box3> {
    prop::collection::vec(arb_offset(), 1..6)
        .prop_map(|offsets| Box3::from_offsets(offsets.iter()))
}

// ── Access round-trip ───────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn rendered_accesses_reextract_identically(accesses in arb_accesses()) {
        let mut expected: BTreeMap<String, BTreeSet<Offset>> = BTreeMap::new();
        for (name, offset) in &accesses {
            expected.entry(name.clone()).or_default().insert(*offset);
        }
        // interleave the accesses with expression noise
        let body = accesses
            .iter()
            .map(|(name, offset)| render_access(name, *offset))
            .collect::<Vec<_>>()
            .join(" + 0.5 * ");
        let body = format!("auto res = {body};");
        prop_assert_eq!(extract_accesses(&body), expected);
    }

    #[test]
    fn reparsing_the_printed_form_is_stable(accesses in arb_accesses()) {
        let body = accesses
            .iter()
            .map(|(name, offset)| render_access(name, *offset))
            .collect::<Vec<_>>()
            .join(" - ");
        let first = extract_accesses(&body);
        let printed = first
            .iter()
            .flat_map(|(name, offsets)| {
                offsets.iter().map(move |offset| render_access(name, *offset))
            })
            .collect::<Vec<_>>()
            .join(" + ");
        prop_assert_eq!(extract_accesses(&printed), first);
    }
}

// ── Box algebra laws ────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn outward_max_is_idempotent(a in arb_box()) {
        prop_assert_eq!(a.outward_max(a), a);
    }

    #[test]
    fn outward_min_is_idempotent(a in arb_box()) {
        prop_assert_eq!(a.outward_min(a), a);
    }

    #[test]
    fn outward_ops_are_commutative(a in arb_box(), b in arb_box()) {
        prop_assert_eq!(a.outward_max(b), b.outward_max(a));
        prop_assert_eq!(a.outward_min(b), b.outward_min(a));
    }

    #[test]
    fn sum_with_zero_is_identity(a in arb_box()) {
        prop_assert_eq!(a.sum(Box3::ZERO), a);
        prop_assert_eq!(Box3::ZERO.sum(a), a);
    }

    #[test]
    fn halo_between_box_and_itself_is_empty(a in arb_box()) {
        prop_assert!(Halo::between(a, a).is_empty());
    }

    #[test]
    fn halo_against_outward_max_is_empty(a in arb_box(), b in arb_box()) {
        // the outward max covers both boxes, so nothing remains to exchange
        let cover = a.outward_max(b);
        prop_assert!(Halo::between(a, cover).is_empty());
        prop_assert!(Halo::between(b, cover).is_empty());
    }
}

// ── Zero-box base case ──────────────────────────────────────────────────────

#[test]
fn sum_of_two_zero_boxes_is_the_zero_box() {
    assert_eq!(Box3::ZERO.sum(Box3::ZERO), Box3::ZERO);
}
