//! A single k-bucket: a live set, a replacement cache, and lock/stale logic.
//!
//! Reference: SPEC_FULL.md / spec.md Section 4.3.

use std::collections::HashSet;

use tracing::debug;

use super::least_recent_set::NodeLeastRecentSet;
use super::most_recent_set::NodeMostRecentSet;
use crate::domain::change_set::{ActivityChangeSet, KBucketChangeSet};
use crate::domain::entities::{Activity, Node, Timestamp};
use crate::domain::errors::RoutingError;
use crate::domain::id::Id;

/// A k-bucket: a [`NodeLeastRecentSet`] of size `k` (the live set) plus a
/// [`NodeMostRecentSet`] of size `c` (the replacement cache), plus the
/// lock/stale bookkeeping that lets a stale live peer be replaced by its
/// best cache candidate.
#[derive(Debug, Clone)]
pub struct KBucket {
    local_id: Id,
    prefix_bits: u32,
    k: usize,
    c: usize,
    live: NodeLeastRecentSet,
    cache: NodeMostRecentSet,
    locked: HashSet<Id>,
    last_update_time: Option<Timestamp>,
    last_touch_time: Option<Timestamp>,
}

impl KBucket {
    pub fn new(local_id: Id, prefix_bits: u32, k: usize, c: usize) -> Self {
        Self {
            live: NodeLeastRecentSet::new(local_id.clone(), k),
            cache: NodeMostRecentSet::new(local_id.clone(), c),
            locked: HashSet::new(),
            local_id,
            prefix_bits,
            k,
            c,
            last_update_time: None,
            last_touch_time: None,
        }
    }

    pub fn prefix_bits(&self) -> u32 {
        self.prefix_bits
    }

    pub fn live_len(&self) -> usize {
        self.live.len()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_locked(&self, id: &Id) -> bool {
        self.locked.contains(id)
    }

    pub(super) fn is_live_full(&self) -> bool {
        self.live.is_full()
    }

    pub(super) fn live_contains(&self, id: &Id) -> bool {
        self.live.contains(id)
    }

    /// Merged live+cache snapshot, live entries first.
    pub fn dump(&self) -> Vec<Activity> {
        let mut all = self.live.dump().to_vec();
        all.extend(self.cache.dump().iter().cloned());
        all
    }

    pub fn live_dump(&self) -> &[Activity] {
        self.live.dump()
    }

    pub fn cache_dump(&self) -> &[Activity] {
        self.cache.dump()
    }

    fn validate_membership(&self, id: &Id) -> Result<(), RoutingError> {
        if id == &self.local_id {
            return Err(RoutingError::InvalidId {
                reason: "cannot admit the local id into a bucket".to_string(),
            });
        }
        let shared = self.local_id.shared_prefix_len(id)?;
        if shared < self.prefix_bits {
            return Err(RoutingError::InvalidId {
                reason: format!(
                    "id shares only {shared} bits with local id, bucket requires at least {}",
                    self.prefix_bits
                ),
            });
        }
        Ok(())
    }

    /// Admit or refresh `node` at `time`.
    ///
    /// Locked ids bypass `live` entirely and go straight to the cache.
    /// Otherwise `live` is tried first; if it cannot admit (full and
    /// `node` is new to it), the cache absorbs the touch instead. If
    /// `live` does admit a new entry, any stale cache entry for the same
    /// id is discarded (invariant 5: never simultaneously live and
    /// cached).
    pub fn touch(&mut self, time: Timestamp, node: Node) -> Result<KBucketChangeSet, RoutingError> {
        self.validate_membership(node.id())?;

        let result = if self.locked.contains(node.id()) {
            let cache_change = self.cache.touch(time, node)?;
            KBucketChangeSet {
                bucket: ActivityChangeSet::no_change(),
                cache: cache_change,
            }
        } else {
            let live_change = self.live.touch(time, node.clone())?;
            if live_change.is_empty() {
                let cache_change = self.cache.touch(time, node)?;
                KBucketChangeSet {
                    bucket: ActivityChangeSet::no_change(),
                    cache: cache_change,
                }
            } else {
                let cache_change = if !live_change.added.is_empty() {
                    self.cache.discard(node.id())
                } else {
                    ActivityChangeSet::no_change()
                };
                KBucketChangeSet {
                    bucket: live_change,
                    cache: cache_change,
                }
            }
        };

        self.last_touch_time = Some(time);
        if !result.is_empty() {
            self.last_update_time = Some(time);
        }
        debug!(
            prefix_bits = self.prefix_bits,
            bucket_changed = !result.bucket.is_empty(),
            cache_changed = !result.cache.is_empty(),
            "kbucket: touch processed"
        );
        Ok(result)
    }

    /// Shared machinery behind `stale` and `lock`: evict `node` from
    /// `live`, then either promote the freshest cache entry into the
    /// freed slot or, if the cache is empty, mark the id locked so future
    /// touches bypass `live`.
    fn evict_from_live_and_promote(&mut self, node: &Node) -> Result<KBucketChangeSet, RoutingError> {
        let live_entry = self
            .live
            .dump()
            .iter()
            .find(|a| a.node.id() == node.id())
            .cloned();
        let live_entry = match live_entry {
            Some(entry) if entry.node.link() != node.link() => {
                return Err(RoutingError::LinkConflict {
                    id: node.id().clone(),
                    existing: entry.node.link().to_string(),
                    incoming: node.link().to_string(),
                });
            }
            Some(entry) => entry,
            None => {
                return Err(RoutingError::BadOperation {
                    reason: "node is not currently in the live set".to_string(),
                })
            }
        };

        let live_removal = self.live.remove(&live_entry.node)?;
        debug_assert!(!live_removal.is_empty());

        if self.cache.is_empty() {
            self.locked.insert(node.id().clone());
            debug!(prefix_bits = self.prefix_bits, "kbucket: no cache candidate, id locked");
            return Ok(KBucketChangeSet {
                bucket: live_removal,
                cache: ActivityChangeSet::no_change(),
            });
        }

        let cache_removal = self.cache.remove_most_recent(1);
        let promoted = cache_removal
            .removed
            .first()
            .cloned()
            .expect("cache was non-empty");
        let promotion = self.live.touch(promoted.time, promoted.node.clone())?;
        debug!(prefix_bits = self.prefix_bits, promoted = ?promoted.node.id(), "kbucket: promoted cache entry into live");

        let mut bucket = live_removal;
        bucket.added.extend(promotion.added);
        Ok(KBucketChangeSet {
            bucket,
            cache: cache_removal,
        })
    }

    /// Mark `node` unresponsive: evict from `live`, promoting a cache
    /// entry in its place or locking the id if the cache is empty.
    pub fn stale(&mut self, node: &Node) -> Result<KBucketChangeSet, RoutingError> {
        self.evict_from_live_and_promote(node)
    }

    /// Explicit variant of [`Self::stale`] used by the router to reserve a
    /// live slot ahead of an externally-observed failure.
    pub fn lock(&mut self, node: &Node) -> Result<KBucketChangeSet, RoutingError> {
        self.evict_from_live_and_promote(node)
    }

    /// Release a previously locked id so future touches may re-admit it
    /// into `live` normally.
    pub fn unlock(&mut self, node: &Node) -> Result<KBucketChangeSet, RoutingError> {
        if !self.locked.remove(node.id()) {
            return Err(RoutingError::BadOperation {
                reason: "node is not currently locked".to_string(),
            });
        }
        debug!(prefix_bits = self.prefix_bits, id = ?node.id(), "kbucket: unlocked");
        Ok(KBucketChangeSet::no_change())
    }

    /// Split this bucket into two children along the bit at
    /// `prefix_bits()`. The child matching the local id's bit at that
    /// position continues along the local path (`prefix_bits + 1`); the
    /// other child is a terminal leaf (`prefix_bits` unchanged -- see
    /// `DESIGN.md` for why). Preserves every entry's relative time order.
    pub(super) fn split(self) -> (KBucket, KBucket) {
        let bit_index = self.prefix_bits;
        let local_bit = self.local_id.bit(bit_index);

        let mut local_live = Vec::new();
        let mut other_live = Vec::new();
        for activity in self.live.dump() {
            if activity.node.id().bit(bit_index) == local_bit {
                local_live.push(activity.clone());
            } else {
                other_live.push(activity.clone());
            }
        }

        let mut local_cache = Vec::new();
        let mut other_cache = Vec::new();
        for activity in self.cache.dump() {
            if activity.node.id().bit(bit_index) == local_bit {
                local_cache.push(activity.clone());
            } else {
                other_cache.push(activity.clone());
            }
        }

        let mut local_locked = HashSet::new();
        let mut other_locked = HashSet::new();
        for id in &self.locked {
            if id.bit(bit_index) == local_bit {
                local_locked.insert(id.clone());
            } else {
                other_locked.insert(id.clone());
            }
        }

        let local_child = KBucket {
            live: NodeLeastRecentSet::restore(self.local_id.clone(), self.k, local_live),
            cache: NodeMostRecentSet::restore(self.local_id.clone(), self.c, local_cache),
            locked: local_locked,
            local_id: self.local_id.clone(),
            prefix_bits: bit_index + 1,
            k: self.k,
            c: self.c,
            last_update_time: None,
            last_touch_time: None,
        };
        let other_child = KBucket {
            live: NodeLeastRecentSet::restore(self.local_id.clone(), self.k, other_live),
            cache: NodeMostRecentSet::restore(self.local_id.clone(), self.c, other_cache),
            locked: other_locked,
            local_id: self.local_id.clone(),
            prefix_bits: bit_index,
            k: self.k,
            c: self.c,
            last_update_time: None,
            last_touch_time: None,
        };

        debug!(
            bit_index,
            local_prefix = local_child.prefix_bits,
            other_prefix = other_child.prefix_bits,
            "kbucket: split"
        );
        (local_child, other_child)
    }
}
