//! Property-based tests for the invariants enumerated by this crate's
//! governing specification, Section 8.

use kademlia_routing_core::{Id, Node, NodeLeastRecentSet, NodeMostRecentSet, Router, RouterConfig, Timestamp};
use proptest::prelude::*;

fn id_for(n: u8) -> Id {
    Id::from_bit_str(&format!("{n:04b}")).unwrap()
}

fn node_for(n: u8) -> Node {
    Node::new(id_for(n), format!("link-{n}")).unwrap()
}

fn touch_seq() -> impl Strategy<Value = Vec<(u64, u8)>> {
    prop::collection::vec((0u64..6, 1u8..16), 0..40)
}

proptest! {
    /// Invariant 1 & 2 for NodeMostRecentSet: bounded size, no duplicate ids.
    #[test]
    fn most_recent_set_stays_bounded_and_unique(touches in touch_seq()) {
        let local = id_for(0);
        let mut set = NodeMostRecentSet::new(local, 3);
        for (time, raw_id) in touches {
            set.touch(Timestamp::new(time), node_for(raw_id)).unwrap();
            prop_assert!(set.len() <= 3);
            let dump = set.dump();
            let mut seen = std::collections::HashSet::new();
            for activity in dump {
                prop_assert!(seen.insert(activity.node.id().clone()));
            }
            for pair in dump.windows(2) {
                prop_assert!(pair[0].time <= pair[1].time);
            }
        }
    }

    /// Invariant 1 & 2 for NodeLeastRecentSet, same shape, opposite policy.
    #[test]
    fn least_recent_set_stays_bounded_and_unique(touches in touch_seq()) {
        let local = id_for(0);
        let mut set = NodeLeastRecentSet::new(local, 3);
        for (time, raw_id) in touches {
            set.touch(Timestamp::new(time), node_for(raw_id)).unwrap();
            prop_assert!(set.len() <= 3);
            let dump = set.dump();
            let mut seen = std::collections::HashSet::new();
            for activity in dump {
                prop_assert!(seen.insert(activity.node.id().clone()));
            }
            for pair in dump.windows(2) {
                prop_assert!(pair[0].time <= pair[1].time);
            }
        }
    }

    /// Invariant 7: touch then remove restores the prior dump.
    #[test]
    fn touch_then_remove_round_trips(raw_id in 1u8..16, time in 0u64..6) {
        let local = id_for(0);
        let mut set = NodeMostRecentSet::new(local.clone(), 3);
        let before = set.dump().to_vec();
        let node = node_for(raw_id);
        set.touch(Timestamp::new(time), node.clone()).unwrap();
        set.remove(&node).unwrap();
        prop_assert_eq!(set.dump(), before.as_slice());

        let mut least = NodeLeastRecentSet::new(local, 3);
        let before_least = least.dump().to_vec();
        least.touch(Timestamp::new(time), node.clone()).unwrap();
        least.remove(&node).unwrap();
        prop_assert_eq!(least.dump(), before_least.as_slice());
    }

    /// Invariant 4: find results are sorted by ascending XOR distance and
    /// never exceed max.
    #[test]
    fn find_is_sorted_and_bounded(touches in touch_seq(), max in 0usize..10) {
        let mut router = Router::new(id_for(0), RouterConfig::for_testing()).unwrap();
        for (time, raw_id) in touches {
            let _ = router.touch(Timestamp::new(time), node_for(raw_id));
        }
        let target = id_for(5);
        let found = router.find(&target, max, true).unwrap();
        prop_assert!(found.len() <= max);
        let mut last_distance = None;
        for n in &found {
            let distance = target.xor_distance(n.id()).unwrap();
            if let Some(prev) = &last_distance {
                prop_assert!(*prev <= distance);
            }
            last_distance = Some(distance);
        }
    }
}
