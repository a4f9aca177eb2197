//! Bounded, time-ordered set favoring long-lived peers (classic k-bucket).
//!
//! Reference: SPEC_FULL.md / spec.md Section 4.2.

use tracing::trace;

use super::most_recent_set::insert_in_time_order;
use crate::domain::change_set::ActivityChangeSet;
use crate::domain::entities::{Activity, Node, Timestamp};
use crate::domain::errors::RoutingError;
use crate::domain::id::Id;

/// A bounded sequence of [`Activity`] ordered head (oldest) to tail
/// (newest), oriented to keep long-lived peers.
///
/// Once full, a brand-new id is rejected outright rather than displacing an
/// incumbent -- see `DESIGN.md` for the reasoning behind this reading of
/// spec.md Section 4.2. This is the inverse of
/// [`NodeMostRecentSet`](super::NodeMostRecentSet): both sets insert in
/// time order, but overflow in this set removes the tail (newest), not the
/// head.
#[derive(Debug, Clone)]
pub struct NodeLeastRecentSet {
    local_id: Id,
    capacity: usize,
    entries: Vec<Activity>,
}

impl NodeLeastRecentSet {
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

    /// Pure query; does not remove (spec.md Section 9, second bullet).
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
    ///
    /// Returns `NO_CHANGE` when the set is full and `node` is not already a
    /// member -- the discarded newcomer is simply not admitted.
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

        if old_entry.is_some() {
            insert_in_time_order(&mut self.entries, new_entry.clone());
            trace!(id = ?new_entry.node.id(), "least-recent-set: refreshed existing entry");
            return Ok(ActivityChangeSet {
                updated: vec![new_entry],
                ..ActivityChangeSet::default()
            });
        }

        if self.entries.len() >= self.capacity {
            trace!(id = ?new_entry.node.id(), "least-recent-set: full, newcomer discarded");
            return Ok(ActivityChangeSet::no_change());
        }

        insert_in_time_order(&mut self.entries, new_entry.clone());
        trace!(id = ?new_entry.node.id(), "least-recent-set: admitted entry");
        Ok(ActivityChangeSet::added(new_entry))
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

    /// Shrink or grow capacity. Shrinking evicts the newest
    /// `old_capacity - new_capacity` entries (the tail), the opposite end
    /// from [`NodeMostRecentSet::resize`](super::NodeMostRecentSet::resize).
    pub fn resize(&mut self, new_capacity: usize) -> ActivityChangeSet {
        let mut removed = Vec::new();
        while self.entries.len() > new_capacity {
            if let Some(activity) = self.entries.pop() {
                removed.push(activity);
            }
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
        let mut set = NodeLeastRecentSet::new(local(), 2);
        assert!(!set.touch(Timestamp::new(1), node("1111", "a")).unwrap().is_empty());
        assert!(!set.touch(Timestamp::new(2), node("1110", "b")).unwrap().is_empty());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn touch_rejects_new_id_once_full() {
        let mut set = NodeLeastRecentSet::new(local(), 2);
        set.touch(Timestamp::new(1), node("1111", "a")).unwrap();
        set.touch(Timestamp::new(2), node("1110", "b")).unwrap();
        let change = set.touch(Timestamp::new(3), node("1101", "c")).unwrap();
        assert!(change.is_empty());
        assert_eq!(set.len(), 2);
        assert!(!set.contains(&id("1101")));
    }

    #[test]
    fn touch_updates_existing_member_even_when_full() {
        let mut set = NodeLeastRecentSet::new(local(), 2);
        set.touch(Timestamp::new(1), node("1111", "a")).unwrap();
        set.touch(Timestamp::new(2), node("1110", "b")).unwrap();
        let change = set.touch(Timestamp::new(3), node("1111", "a")).unwrap();
        assert_eq!(change.updated.len(), 1);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn resize_down_evicts_newest() {
        let mut set = NodeLeastRecentSet::new(local(), 3);
        set.touch(Timestamp::new(1), node("1111", "a")).unwrap();
        set.touch(Timestamp::new(2), node("1110", "b")).unwrap();
        set.touch(Timestamp::new(3), node("1101", "c")).unwrap();
        let change = set.resize(1);
        assert_eq!(change.removed.len(), 2);
        assert_eq!(set.dump()[0].node.id(), &id("1111"));
    }

    #[test]
    fn contains_does_not_mutate() {
        let mut set = NodeLeastRecentSet::new(local(), 2);
        set.touch(Timestamp::new(1), node("1111", "a")).unwrap();
        assert!(set.contains(&id("1111")));
        assert!(set.contains(&id("1111")));
        assert_eq!(set.len(), 1);
    }
}
