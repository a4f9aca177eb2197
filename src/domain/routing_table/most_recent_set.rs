//! Bounded, time-ordered set favoring recently-seen peers.
//!
//! Reference: SPEC_FULL.md / spec.md Section 4.1.

use tracing::trace;

use crate::domain::change_set::ActivityChangeSet;
use crate::domain::entities::{Activity, Node, Timestamp};
use crate::domain::errors::RoutingError;
use crate::domain::id::Id;

/// A bounded sequence of [`Activity`] ordered head (oldest) to tail
/// (newest). Used both as a [`KBucket`](super::KBucket)'s replacement
/// cache and as the router's near set.
///
/// On overflow the **head** (oldest) is evicted, favoring recent activity.
#[derive(Debug, Clone)]
pub struct NodeMostRecentSet {
    local_id: Id,
    capacity: usize,
    entries: Vec<Activity>,
}

impl NodeMostRecentSet {
    pub fn new(local_id: Id, capacity: usize) -> Self {
        Self {
            local_id,
            capacity,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.entries.iter().any(|a| a.node.id() == id)
    }

    /// Head-to-tail (oldest-to-newest) snapshot.
    pub fn dump(&self) -> &[Activity] {
        &self.entries
    }

    fn find_link_conflict(&self, node: &Node) -> Option<&Activity> {
        self.entries
            .iter()
            .find(|a| a.node.id() == node.id() && a.node.link() != node.link())
    }

    /// Insert or refresh `node`'s activity at `time`.
    pub fn touch(
        &mut self,
        time: Timestamp,
        node: Node,
    ) -> Result<ActivityChangeSet, RoutingError> {
        if node.id() == &self.local_id {
            return Err(RoutingError::InvalidId {
                reason: "cannot touch the local id into a node set".to_string(),
            });
        }
        if node.id().bit_length() != self.local_id.bit_length() {
            return Err(RoutingError::InvalidId {
                reason: "node id bit length does not match local id".to_string(),
            });
        }
        if let Some(existing) = self.find_link_conflict(&node) {
            return Err(RoutingError::LinkConflict {
                id: node.id().clone(),
                existing: existing.node.link().to_string(),
                incoming: node.link().to_string(),
            });
        }

        let new_entry = Activity::new(node, time);
        let old_entry = self.remove_entry(new_entry.node.id());

        insert_in_time_order(&mut self.entries, new_entry.clone());

        if old_entry.is_some() {
            // Pure update: removing-then-reinserting can't change the
            // total count, so no eviction is possible here (invariant 1).
            trace!(id = ?new_entry.node.id(), "most-recent-set: refreshed existing entry");
            return Ok(ActivityChangeSet {
                updated: vec![new_entry],
                ..ActivityChangeSet::default()
            });
        }

        let evicted = if self.entries.len() > self.capacity {
            Some(self.entries.remove(0))
        } else {
            None
        };

        if evicted.as_ref() == Some(&new_entry) {
            trace!(id = ?new_entry.node.id(), "most-recent-set: newcomer immediately evicted, no change");
            return Ok(ActivityChangeSet::no_change());
        }

        trace!(id = ?new_entry.node.id(), evicted = evicted.is_some(), "most-recent-set: admitted entry");
        Ok(ActivityChangeSet {
            added: vec![new_entry],
            removed: evicted.into_iter().collect(),
            updated: Vec::new(),
        })
    }

    /// Remove `node`'s id, failing on a link conflict.
    pub fn remove(&mut self, node: &Node) -> Result<ActivityChangeSet, RoutingError> {
        if let Some(existing) = self.find_link_conflict(node) {
            return Err(RoutingError::LinkConflict {
                id: node.id().clone(),
                existing: existing.node.link().to_string(),
                incoming: node.link().to_string(),
            });
        }
        match self.remove_entry(node.id()) {
            Some(removed) => Ok(ActivityChangeSet::removed(removed)),
            None => Ok(ActivityChangeSet::no_change()),
        }
    }

    /// Shrink or grow capacity. Shrinking evicts the oldest
    /// `old_capacity - new_capacity` entries.
    pub fn resize(&mut self, new_capacity: usize) -> ActivityChangeSet {
        let mut removed = Vec::new();
        while self.entries.len() > new_capacity {
            removed.push(self.entries.remove(0));
        }
        self.capacity = new_capacity;
        if removed.is_empty() {
            ActivityChangeSet::no_change()
        } else {
            ActivityChangeSet {
                removed,
                ..ActivityChangeSet::default()
            }
        }
    }

    /// Pop up to `count` tail (newest) entries. Tolerates `count` larger
    /// than the current size by stopping early.
    pub fn remove_most_recent(&mut self, count: usize) -> ActivityChangeSet {
        let mut removed = Vec::new();
        for _ in 0..count {
            match self.entries.pop() {
                Some(activity) => removed.push(activity),
                None => break,
            }
        }
        if removed.is_empty() {
            ActivityChangeSet::no_change()
        } else {
            ActivityChangeSet {
                removed,
                ..ActivityChangeSet::default()
            }
        }
    }

    /// Remove any entry for `id` unconditionally, bypassing the
    /// link-conflict check. Used when a sibling set (e.g. a bucket's
    /// `live` set admitting the same id) takes ownership of it.
    pub(super) fn discard(&mut self, id: &Id) -> ActivityChangeSet {
        match self.remove_entry(id) {
            Some(removed) => ActivityChangeSet::removed(removed),
            None => ActivityChangeSet::no_change(),
        }
    }

    /// Rebuild a set from entries already known to be in time order and
    /// within capacity, bypassing `touch`'s admission logic. Used only by
    /// `KBucket::split` to redistribute an existing set's entries.
    pub(super) fn restore(local_id: Id, capacity: usize, entries: Vec<Activity>) -> Self {
        Self {
            local_id,
            capacity,
            entries,
        }
    }

    fn remove_entry(&mut self, id: &Id) -> Option<Activity> {
        let pos = self.entries.iter().position(|a| a.node.id() == id)?;
        Some(self.entries.remove(pos))
    }
}

/// Insert `activity` so the sequence stays non-decreasing in time,
/// head-to-tail, with newcomers sorting after existing equal-time
/// incumbents (spec.md Section 9, open question).
pub(super) fn insert_in_time_order(entries: &mut Vec<Activity>, activity: Activity) {
    let position = entries
        .iter()
        .rposition(|existing| existing.time <= activity.time)
        .map(|i| i + 1)
        .unwrap_or(0);
    entries.insert(position, activity);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(bits: &str) -> Id {
        Id::from_bit_str(bits).unwrap()
    }

    fn node(bits: &str, link: &str) -> Node {
        Node::new(id(bits), link).unwrap()
    }

    fn local() -> Id {
        id("0000")
    }

    #[test]
    fn touch_admits_until_capacity() {
        let mut set = NodeMostRecentSet::new(local(), 2);
        let c1 = set.touch(Timestamp::new(1), node("1111", "a")).unwrap();
        assert_eq!(c1.added.len(), 1);
        let c2 = set.touch(Timestamp::new(2), node("1110", "b")).unwrap();
        assert_eq!(c2.added.len(), 1);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn touch_evicts_oldest_on_overflow() {
        let mut set = NodeMostRecentSet::new(local(), 2);
        set.touch(Timestamp::new(1), node("1111", "a")).unwrap();
        set.touch(Timestamp::new(2), node("1110", "b")).unwrap();
        let change = set.touch(Timestamp::new(3), node("1101", "c")).unwrap();
        assert_eq!(change.added[0].node.id(), &id("1101"));
        assert_eq!(change.removed[0].node.id(), &id("1111"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn touch_rejects_self_id() {
        let mut set = NodeMostRecentSet::new(local(), 2);
        let err = set.touch(Timestamp::new(1), node("0000", "a")).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidId { .. }));
    }

    #[test]
    fn touch_rejects_link_conflict() {
        let mut set = NodeMostRecentSet::new(local(), 2);
        set.touch(Timestamp::new(1), node("1111", "a")).unwrap();
        let err = set
            .touch(Timestamp::new(2), node("1111", "b"))
            .unwrap_err();
        assert!(matches!(err, RoutingError::LinkConflict { .. }));
    }

    #[test]
    fn touch_updates_existing_entry_without_eviction() {
        let mut set = NodeMostRecentSet::new(local(), 2);
        set.touch(Timestamp::new(1), node("1111", "a")).unwrap();
        set.touch(Timestamp::new(2), node("1110", "b")).unwrap();
        let change = set.touch(Timestamp::new(3), node("1111", "a")).unwrap();
        assert!(change.added.is_empty());
        assert!(change.removed.is_empty());
        assert_eq!(change.updated.len(), 1);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn equal_timestamps_keep_incumbents_before_newcomers() {
        let mut set = NodeMostRecentSet::new(local(), 3);
        set.touch(Timestamp::new(0), node("1111", "a")).unwrap();
        set.touch(Timestamp::new(0), node("1110", "b")).unwrap();
        set.touch(Timestamp::new(0), node("1101", "c")).unwrap();
        let dump = set.dump();
        assert_eq!(dump[0].node.id(), &id("1111"));
        assert_eq!(dump[1].node.id(), &id("1110"));
        assert_eq!(dump[2].node.id(), &id("1101"));
    }

    #[test]
    fn resize_down_evicts_oldest() {
        let mut set = NodeMostRecentSet::new(local(), 3);
        set.touch(Timestamp::new(1), node("1111", "a")).unwrap();
        set.touch(Timestamp::new(2), node("1110", "b")).unwrap();
        set.touch(Timestamp::new(3), node("1101", "c")).unwrap();
        let change = set.resize(1);
        assert_eq!(change.removed.len(), 2);
        assert_eq!(set.len(), 1);
        assert_eq!(set.dump()[0].node.id(), &id("1101"));
    }

    #[test]
    fn resize_up_is_no_change() {
        let mut set = NodeMostRecentSet::new(local(), 1);
        set.touch(Timestamp::new(1), node("1111", "a")).unwrap();
        let change = set.resize(5);
        assert!(change.is_empty());
    }

    #[test]
    fn remove_most_recent_tolerates_oversized_count() {
        let mut set = NodeMostRecentSet::new(local(), 3);
        set.touch(Timestamp::new(1), node("1111", "a")).unwrap();
        set.touch(Timestamp::new(2), node("1110", "b")).unwrap();
        let change = set.remove_most_recent(10);
        assert_eq!(change.removed.len(), 2);
        assert!(set.is_empty());
    }

    #[test]
    fn remove_returns_no_change_for_absent_id() {
        let mut set = NodeMostRecentSet::new(local(), 3);
        let change = set.remove(&node("1111", "a")).unwrap();
        assert!(change.is_empty());
    }
}
