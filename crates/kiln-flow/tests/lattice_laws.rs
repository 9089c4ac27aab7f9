use kiln_flow::FieldAssignment;
use proptest::prelude::*;

const FIELDS: [&str; 4] = ["a", "b", "c", "d"];

fn arb_block() -> impl Strategy<Value = FieldAssignment> {
    proptest::sample::subsequence(FIELDS.to_vec(), 0..=FIELDS.len()).prop_map(FieldAssignment::of)
}

/// States reachable by sequencing blocks and if-style pending arms.
fn arb_state() -> impl Strategy<Value = FieldAssignment> {
    arb_block().prop_recursive(3, 16, 2, |inner| {
        prop_oneof![
            (inner.clone(), arb_block()).prop_map(|(state, block)| state.combine_with(block)),
            (arb_block(), inner.clone())
                .prop_map(|(state, arm)| state.combine_with(FieldAssignment::branch(arm))),
            (inner.clone(), inner).prop_map(|(a, b)| a.intersect(b)),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 256, failure_persistence: None, .. ProptestConfig::default() })]

    #[test]
    fn total_is_the_identity_of_intersect(x in arb_state()) {
        prop_assert_eq!(FieldAssignment::Total.intersect(x.clone()), x.clone());
        prop_assert_eq!(x.clone().intersect(FieldAssignment::Total), x);
    }

    #[test]
    fn intersect_is_commutative_and_idempotent(x in arb_state(), y in arb_state()) {
        prop_assert_eq!(x.clone().intersect(y.clone()), y.clone().intersect(x.clone()));
        prop_assert_eq!(x.clone().intersect(x.clone()), x);
    }

    #[test]
    fn meet_keeps_what_both_sides_guarantee(x in arb_state(), y in arb_state()) {
        let meet = x.clone().intersect(y.clone());
        for field in FIELDS {
            if x.contains(field) && y.contains(field) {
                prop_assert!(meet.contains(field), "{field} missing from {meet:?}");
            }
        }
    }

    #[test]
    fn total_absorbs_sequencing(x in arb_state()) {
        prop_assert!(x.clone().combine_with(FieldAssignment::Total).is_total());
        prop_assert!(FieldAssignment::Total.combine_with(x).is_total());
    }
}

#[test]
fn if_else_merge() {
    let pre = FieldAssignment::empty();
    let both = pre
        .clone()
        .combine_with(FieldAssignment::branch(pre.clone().assign("a")))
        .intersect(FieldAssignment::branch(pre.clone().assign("a")));
    assert!(both.contains("a"));

    let one = pre
        .clone()
        .combine_with(FieldAssignment::branch(pre.clone().assign("a")))
        .intersect(FieldAssignment::branch(pre));
    assert!(!one.contains("a"));
}

#[test]
fn block_intersection_example() {
    assert_eq!(
        FieldAssignment::of(["a"]).intersect(FieldAssignment::of(["a", "b"])),
        FieldAssignment::of(["a"])
    );
}
