//! The recursive prefix tree of k-buckets rooted at the local id.
//!
//! Reference: SPEC_FULL.md / spec.md Section 4.4-4.5.

use tracing::debug;

use super::bucket::KBucket;
use crate::domain::change_set::KBucketChangeSet;
use crate::domain::entities::Node;
use crate::domain::errors::RoutingError;
use crate::domain::id::Id;

/// A node of the prefix tree: either a leaf holding a [`KBucket`], or an
/// internal split on the bit at `bit_index`.
///
/// Unlike a design that tags each child as "the local branch" or "the
/// other branch", which bit-index value a leaf carries already encodes
/// that distinction (see `KBucket::split`); whether a leaf sits on the
/// local id's own path is recomputed during traversal instead of stored.
#[derive(Debug, Clone)]
enum RouteTreeNode {
    Leaf(KBucket),
    Internal {
        bit_index: u32,
        zero: Box<RouteTreeNode>,
        one: Box<RouteTreeNode>,
    },
}

impl RouteTreeNode {
    fn collect_into(&self, out: &mut Vec<Node>, include_stale: bool) {
        match self {
            RouteTreeNode::Leaf(bucket) => {
                out.extend(bucket.live_dump().iter().map(|a| a.node.clone()));
                if include_stale {
                    out.extend(bucket.cache_dump().iter().map(|a| a.node.clone()));
                }
            }
            RouteTreeNode::Internal { zero, one, .. } => {
                zero.collect_into(out, include_stale);
                one.collect_into(out, include_stale);
            }
        }
    }

    fn bucket_count(&self) -> usize {
        match self {
            RouteTreeNode::Leaf(_) => 1,
            RouteTreeNode::Internal { zero, one, .. } => zero.bucket_count() + one.bucket_count(),
        }
    }

    fn depth(&self) -> u32 {
        match self {
            RouteTreeNode::Leaf(_) => 0,
            RouteTreeNode::Internal { zero, one, .. } => 1 + zero.depth().max(one.depth()),
        }
    }
}

fn navigate_mut<'a>(node: &'a mut RouteTreeNode, id: &Id) -> &'a mut KBucket {
    match node {
        RouteTreeNode::Leaf(bucket) => bucket,
        RouteTreeNode::Internal { bit_index, zero, one } => {
            let child = if id.bit(*bit_index) { one.as_mut() } else { zero.as_mut() };
            navigate_mut(child, id)
        }
    }
}

/// Recursive touch: descends to the owning leaf, splitting it first if
/// it sits on the local id's own path, is full, and the incoming id is
/// genuinely new (see `DESIGN.md` for why the split check runs before,
/// not after, the leaf's own `touch`).
#[allow(clippy::too_many_arguments)]
fn touch_rec(
    tree_node: &mut RouteTreeNode,
    on_self_path: bool,
    local_id: &Id,
    bit_length: u32,
    k: usize,
    c: usize,
    time: crate::domain::entities::Timestamp,
    node: Node,
) -> Result<KBucketChangeSet, RoutingError> {
    match tree_node {
        RouteTreeNode::Internal { bit_index, zero, one } => {
            let bit_index = *bit_index;
            let branch = node.id().bit(bit_index);
            let child_on_self_path = on_self_path && local_id.bit(bit_index) == branch;
            let child = if branch { one.as_mut() } else { zero.as_mut() };
            touch_rec(child, child_on_self_path, local_id, bit_length, k, c, time, node)
        }
        RouteTreeNode::Leaf(bucket) => {
            let needs_split = on_self_path
                && bucket.prefix_bits() < bit_length
                && bucket.is_live_full()
                && !bucket.live_contains(node.id())
                && !bucket.is_locked(node.id());

            if !needs_split {
                return bucket.touch(time, node);
            }

            let bit_index = bucket.prefix_bits();
            // The placeholder leaf is immediately discarded; mem::replace
            // just needs a value to swap in while we take ownership of
            // the real bucket to split it.
            let placeholder = KBucket::new(local_id.clone(), bit_index, k, c);
            let owned = match std::mem::replace(tree_node, RouteTreeNode::Leaf(placeholder)) {
                RouteTreeNode::Leaf(owned) => owned,
                RouteTreeNode::Internal { .. } => unreachable!("leaf pattern guaranteed by outer match"),
            };
            let (local_child, other_child) = owned.split();
            let local_bit = local_id.bit(bit_index);
            let (zero_child, one_child) = if local_bit {
                (other_child, local_child)
            } else {
                (local_child, other_child)
            };
            debug!(bit_index, "kbucket-tree: split leaf on self path");
            *tree_node = RouteTreeNode::Internal {
                bit_index,
                zero: Box::new(RouteTreeNode::Leaf(zero_child)),
                one: Box::new(RouteTreeNode::Leaf(one_child)),
            };
            touch_rec(tree_node, on_self_path, local_id, bit_length, k, c, time, node)
        }
    }
}

/// The prefix tree of k-buckets, rooted at a single bucket covering the
/// whole id space and splitting lazily along the local id's own path.
#[derive(Debug, Clone)]
pub struct KBucketTree {
    local_id: Id,
    bit_length: u32,
    k: usize,
    c: usize,
    root: RouteTreeNode,
}

impl KBucketTree {
    pub fn new(local_id: Id, bit_length: u32, k: usize, c: usize) -> Result<Self, RoutingError> {
        if local_id.bit_length() != bit_length {
            return Err(RoutingError::InvalidId {
                reason: "local id bit length does not match the tree's configured bit length".to_string(),
            });
        }
        Ok(Self {
            root: RouteTreeNode::Leaf(KBucket::new(local_id.clone(), 0, k, c)),
            local_id,
            bit_length,
            k,
            c,
        })
    }

    fn require_same_length(&self, id: &Id) -> Result<(), RoutingError> {
        if id.bit_length() != self.bit_length {
            return Err(RoutingError::InvalidId {
                reason: "id bit length does not match this tree's bit length".to_string(),
            });
        }
        Ok(())
    }

    pub fn touch(
        &mut self,
        time: crate::domain::entities::Timestamp,
        node: Node,
    ) -> Result<KBucketChangeSet, RoutingError> {
        self.require_same_length(node.id())?;
        touch_rec(
            &mut self.root,
            true,
            &self.local_id,
            self.bit_length,
            self.k,
            self.c,
            time,
            node,
        )
    }

    pub fn stale(&mut self, node: &Node) -> Result<KBucketChangeSet, RoutingError> {
        self.require_same_length(node.id())?;
        navigate_mut(&mut self.root, node.id()).stale(node)
    }

    pub fn lock(&mut self, node: &Node) -> Result<KBucketChangeSet, RoutingError> {
        self.require_same_length(node.id())?;
        navigate_mut(&mut self.root, node.id()).lock(node)
    }

    pub fn unlock(&mut self, node: &Node) -> Result<KBucketChangeSet, RoutingError> {
        self.require_same_length(node.id())?;
        navigate_mut(&mut self.root, node.id()).unlock(node)
    }

    /// The `max` nodes closest to `target` by XOR distance, ties broken by
    /// id byte order. Implemented by collecting every leaf's entries and
    /// sorting rather than the literal distance-ordered descent spec.md
    /// describes, since the tree stays small -- see `DESIGN.md`.
    pub fn find(&self, target: &Id, max: usize, include_stale: bool) -> Result<Vec<Node>, RoutingError> {
        self.require_same_length(target)?;
        let mut collected = Vec::new();
        self.root.collect_into(&mut collected, include_stale);
        let mut distances = Vec::with_capacity(collected.len());
        for node in &collected {
            distances.push(target.xor_distance(node.id())?);
        }
        let mut indices: Vec<usize> = (0..collected.len()).collect();
        indices.sort_by(|&i, &j| {
            distances[i]
                .as_bytes()
                .cmp(distances[j].as_bytes())
                .then_with(|| collected[i].id().as_bytes().cmp(collected[j].id().as_bytes()))
        });
        let result = indices
            .into_iter()
            .take(max)
            .map(|i| collected[i].clone())
            .collect();
        Ok(result)
    }

    pub fn bucket_count(&self) -> usize {
        self.root.bucket_count()
    }

    pub fn depth(&self) -> u32 {
        self.root.depth()
    }
}
