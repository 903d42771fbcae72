//! Property tests for the range planner.

use std::collections::BTreeSet;

use proptest::prelude::*;

use scella_core::EntityId;
use scella_query::{PredicateFragment, RangePlanner};

fn fragment_ids(fragment: &PredicateFragment) -> BTreeSet<EntityId> {
    match fragment {
        PredicateFragment::Range { low, high } => (*low..=*high).collect(),
        PredicateFragment::Enumerated(ids) => ids.iter().copied().collect(),
    }
}

proptest! {
    #[test]
    fn plan_covers_exactly_the_input_set(
        ids in proptest::collection::vec(0u64..2000, 0..300),
        cap in 1usize..50,
        threshold in 0usize..20,
    ) {
        let planner = RangePlanner::new(cap, threshold);
        let plan = planner.plan(&ids).unwrap();

        let expected: BTreeSet<EntityId> = ids.iter().copied().collect();
        let mut covered = BTreeSet::new();
        for fragment in &plan {
            for id in fragment_ids(fragment) {
                // Fragments never overlap.
                prop_assert!(covered.insert(id), "id {id} covered twice");
            }
        }
        prop_assert_eq!(covered, expected);
    }

    #[test]
    fn plan_is_order_independent(
        ids in proptest::collection::vec(0u64..500, 1..100),
    ) {
        let planner = RangePlanner::new(10, 3);
        let forward = planner.plan(&ids).unwrap();

        let mut reversed = ids.clone();
        reversed.reverse();
        prop_assert_eq!(planner.plan(&reversed).unwrap(), forward);
    }

    #[test]
    fn enumerated_fragments_respect_cap(
        ids in proptest::collection::vec(0u64..1000, 0..200),
        cap in 1usize..20,
    ) {
        let planner = RangePlanner::new(cap, 5);
        for fragment in planner.plan(&ids).unwrap() {
            if let PredicateFragment::Enumerated(members) = fragment {
                prop_assert!(!members.is_empty());
                prop_assert!(members.len() <= cap);
            }
        }
    }

    #[test]
    fn ranges_only_for_runs_beyond_threshold(
        start in 0u64..1000,
        len in 1usize..40,
        threshold in 0usize..20,
    ) {
        let ids: Vec<EntityId> = (start..start + len as u64).collect();
        let planner = RangePlanner::new(1000, threshold);
        let plan = planner.plan(&ids).unwrap();

        if len > threshold {
            prop_assert_eq!(
                plan,
                vec![PredicateFragment::Range { low: start, high: start + len as u64 - 1 }]
            );
        } else {
            prop_assert_eq!(plan, vec![PredicateFragment::Enumerated(ids)]);
        }
    }
}
