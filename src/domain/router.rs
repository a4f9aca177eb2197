//! The router: ties the prefix tree to a global near set and exposes the
//! public touch/stale/lock/unlock/find operations.
//!
//! Reference: SPEC_FULL.md / spec.md Section 4.5.

use tracing::{info, instrument};

use crate::domain::change_set::{ActivityChangeSet, KBucketChangeSet, RouterChangeSet};
use crate::domain::entities::{Node, Timestamp};
use crate::domain::errors::RoutingError;
use crate::domain::id::Id;
use crate::domain::routing_table::{KBucketTree, NodeMostRecentSet};
use crate::domain::value_objects::RouterConfig;

/// The routing core's single entry point: a prefix tree of k-buckets plus
/// a near set of the globally closest peers seen so far.
#[derive(Debug, Clone)]
pub struct Router {
    local_id: Id,
    config: RouterConfig,
    tree: KBucketTree,
    near_set: NodeMostRecentSet,
}

impl Router {
    pub fn new(local_id: Id, config: RouterConfig) -> Result<Self, RoutingError> {
        if local_id.bit_length() != config.bit_length {
            return Err(RoutingError::InvalidId {
                reason: "local id bit length does not match router config".to_string(),
            });
        }
        let tree = KBucketTree::new(
            local_id.clone(),
            config.bit_length,
            config.bucket_size,
            config.cache_size,
        )?;
        let near_set = NodeMostRecentSet::new(local_id.clone(), config.near_set_size);
        Ok(Self {
            local_id,
            config,
            tree,
            near_set,
        })
    }

    pub fn local_id(&self) -> &Id {
        &self.local_id
    }

    pub fn config(&self) -> RouterConfig {
        self.config
    }

    /// Record an observation of `node` at `time`. A touch of the local id
    /// itself is silently a no-op: there is nothing to route to yourself.
    ///
    /// Applies to the tree and the near set on working copies first, and
    /// only commits both if neither errors -- a link conflict discovered
    /// in one must not leave the other mutated (spec.md Section 5,
    /// "all-or-nothing").
    #[instrument(skip(self, node), fields(id = ?node.id()))]
    pub fn touch(&mut self, time: Timestamp, node: Node) -> Result<RouterChangeSet, RoutingError> {
        if node.id() == &self.local_id {
            return Ok(RouterChangeSet::no_change());
        }

        let mut tree = self.tree.clone();
        let mut near_set = self.near_set.clone();

        let tree_change = tree.touch(time, node.clone())?;
        let near_change = touch_near_set(&self.local_id, &mut near_set, time, node)?;

        self.tree = tree;
        self.near_set = near_set;

        let merged = RouterChangeSet::from_parts(tree_change, near_change);
        if !merged.is_empty() {
            info!(
                bucket_changed = !merged.bucket.is_empty(),
                near_set_changed = !merged.near_set.is_empty(),
                "router: touch applied"
            );
        }
        Ok(merged)
    }

    /// Mark `node` unresponsive in the bucket tree. The near set is left
    /// untouched: membership there is purely observational, independent
    /// of liveness (spec.md Section 4.5).
    pub fn stale(&mut self, node: &Node) -> Result<KBucketChangeSet, RoutingError> {
        self.tree.stale(node)
    }

    pub fn lock(&mut self, node: &Node) -> Result<KBucketChangeSet, RoutingError> {
        self.tree.lock(node)
    }

    pub fn unlock(&mut self, node: &Node) -> Result<KBucketChangeSet, RoutingError> {
        self.tree.unlock(node)
    }

    /// The `max` nodes closest to `target`, drawn from both the bucket
    /// tree and the near set, deduplicated by id and sorted by XOR
    /// distance ascending (id byte order breaks ties).
    pub fn find(&self, target: &Id, max: usize, include_stale: bool) -> Result<Vec<Node>, RoutingError> {
        let mut candidates = self.tree.find(target, usize::MAX, include_stale)?;
        for activity in self.near_set.dump() {
            if !candidates.iter().any(|n| n.id() == activity.node.id()) {
                candidates.push(activity.node.clone());
            }
        }
        let mut distances = Vec::with_capacity(candidates.len());
        for node in &candidates {
            distances.push(target.xor_distance(node.id())?);
        }
        let mut indices: Vec<usize> = (0..candidates.len()).collect();
        indices.sort_by(|&i, &j| {
            distances[i]
                .as_bytes()
                .cmp(distances[j].as_bytes())
                .then_with(|| candidates[i].id().as_bytes().cmp(candidates[j].id().as_bytes()))
        });
        Ok(indices.into_iter().take(max).map(|i| candidates[i].clone()).collect())
    }

    /// Read-only snapshot of the near set, for diagnostics and tests.
    pub fn near_set_dump(&self) -> Vec<Node> {
        self.near_set.dump().iter().map(|a| a.node.clone()).collect()
    }

    pub fn bucket_count(&self) -> usize {
        self.tree.bucket_count()
    }

    pub fn depth(&self) -> u32 {
        self.tree.depth()
    }
}

/// Admit `node` into the near set, the bounded set of globally XOR-closest
/// peers ever observed.
///
/// Unlike a `KBucket`'s cache, which is genuinely a recency cache, the
/// near set's whole purpose is distance-based retention (spec.md Section
/// 4.5: "the globally closest peers observed"). A refresh of an existing
/// member or an admission into spare capacity goes straight through
/// [`NodeMostRecentSet::touch`] -- neither can evict anyone, so ordinary
/// time bookkeeping is all that's needed. Once full, though, a genuinely
/// new id is only admitted if it is closer to the local id than the
/// current farthest member, which is then displaced; a farther newcomer
/// is discarded regardless of how recently it was observed. See
/// `DESIGN.md` for why this wasn't modeled as a plain `touch` forward.
fn touch_near_set(
    local_id: &Id,
    near_set: &mut NodeMostRecentSet,
    time: Timestamp,
    node: Node,
) -> Result<ActivityChangeSet, RoutingError> {
    if near_set.contains(node.id()) || !near_set.is_full() {
        return near_set.touch(time, node);
    }

    let candidate_distance = local_id.xor_distance(node.id())?;
    let farthest = near_set
        .dump()
        .iter()
        .map(|a| Ok((a.node.clone(), local_id.xor_distance(a.node.id())?)))
        .collect::<Result<Vec<_>, RoutingError>>()?
        .into_iter()
        .max_by(|a, b| a.1.as_bytes().cmp(b.1.as_bytes()));

    match farthest {
        Some((farthest_node, farthest_distance)) if candidate_distance < farthest_distance => {
            let removal = near_set.remove(&farthest_node)?;
            let admission = near_set.touch(time, node)?;
            let mut merged = removal;
            merged.added.extend(admission.added);
            Ok(merged)
        }
        _ => Ok(ActivityChangeSet::no_change()),
    }
}
