//! Immutable diff records returned by every mutating operation.
//!
//! Reference: SPEC_FULL.md Section 2 / spec.md Section 3 ("Change sets").

use crate::domain::entities::Activity;

/// What changed in a single ordered set as the result of one operation.
///
/// `added`, `removed`, and `updated` never share an element. The sentinel
/// `NO_CHANGE` value is simply `ActivityChangeSet::default()` -- all three
/// lists empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityChangeSet {
    pub added: Vec<Activity>,
    pub removed: Vec<Activity>,
    pub updated: Vec<Activity>,
}

impl ActivityChangeSet {
    /// The empty change set, returned whenever an operation had no effect.
    pub fn no_change() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }

    pub fn added(activity: Activity) -> Self {
        Self {
            added: vec![activity],
            ..Self::default()
        }
    }

    pub fn removed(activity: Activity) -> Self {
        Self {
            removed: vec![activity],
            ..Self::default()
        }
    }
}

/// What changed in a [`KBucket`](crate::domain::routing_table::KBucket) as
/// the result of one operation: its live set's change and its cache's
/// change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KBucketChangeSet {
    pub bucket: ActivityChangeSet,
    pub cache: ActivityChangeSet,
}

impl KBucketChangeSet {
    pub fn no_change() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bucket.is_empty() && self.cache.is_empty()
    }
}

/// What changed as the result of a [`Router`](crate::domain::router::Router)
/// `touch`: the tree's change plus the near set's change, merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterChangeSet {
    pub bucket: ActivityChangeSet,
    pub cache: ActivityChangeSet,
    pub near_set: ActivityChangeSet,
}

impl RouterChangeSet {
    pub fn no_change() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bucket.is_empty() && self.cache.is_empty() && self.near_set.is_empty()
    }

    pub fn from_parts(tree: KBucketChangeSet, near_set: ActivityChangeSet) -> Self {
        Self {
            bucket: tree.bucket,
            cache: tree.cache,
            near_set,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Node, Timestamp};
    use crate::domain::id::Id;

    fn activity(bits: &str, time: u64) -> Activity {
        let node = Node::new(Id::from_bit_str(bits).unwrap(), "addr").unwrap();
        Activity::new(node, Timestamp::new(time))
    }

    #[test]
    fn no_change_is_empty() {
        assert!(ActivityChangeSet::no_change().is_empty());
        assert!(KBucketChangeSet::no_change().is_empty());
        assert!(RouterChangeSet::no_change().is_empty());
    }

    #[test]
    fn non_empty_change_set_is_not_empty() {
        let change = ActivityChangeSet::added(activity("1010", 1));
        assert!(!change.is_empty());
    }

    #[test]
    fn router_change_set_merges_tree_and_near_set() {
        let tree = KBucketChangeSet {
            bucket: ActivityChangeSet::added(activity("1010", 1)),
            cache: ActivityChangeSet::no_change(),
        };
        let near = ActivityChangeSet::added(activity("1010", 1));
        let merged = RouterChangeSet::from_parts(tree, near);
        assert!(!merged.is_empty());
        assert_eq!(merged.bucket.added.len(), 1);
        assert_eq!(merged.near_set.added.len(), 1);
    }
}
