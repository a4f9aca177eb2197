//! # Kademlia Routing Core
//!
//! A deterministic, synchronous Kademlia routing table: fixed-length ids
//! and XOR distance, bounded time-ordered peer sets, k-buckets with a
//! replacement cache, a prefix tree that splits lazily along the local
//! id's own path, and a router that ties it all together behind a single
//! touch/stale/lock/unlock/find surface.
//!
//! This crate has no internal clock and performs no I/O: every mutating
//! operation takes its timestamp from the caller and returns a change-set
//! describing exactly what happened, never a side effect.
//!
//! ## Example
//!
//! ```rust
//! use kademlia_routing_core::domain::{Id, Node, Router, RouterConfig, Timestamp};
//!
//! let local_id = Id::from_bit_str("0000").unwrap();
//! let mut router = Router::new(local_id, RouterConfig::for_testing()).unwrap();
//!
//! let peer = Node::new(Id::from_bit_str("1111").unwrap(), "127.0.0.1:9000").unwrap();
//! let change = router.touch(Timestamp::new(1), peer.clone()).unwrap();
//! assert!(!change.is_empty());
//!
//! let closest = router.find(&Id::from_bit_str("1110").unwrap(), 1, true).unwrap();
//! assert_eq!(closest[0].id(), peer.id());
//! ```

pub mod domain;

pub use domain::{
    Activity, ActivityChangeSet, Distance, Id, KBucket, KBucketChangeSet, KBucketTree, Node,
    NodeLeastRecentSet, NodeMostRecentSet, Router, RouterChangeSet, RouterConfig, RoutingError,
    Timestamp,
};
