//! Core domain entities: Node, Activity, Timestamp.
//!
//! Reference: SPEC_FULL.md Section 3 / spec.md Section 3.

use crate::domain::errors::RoutingError;
use crate::domain::id::Id;

/// A caller-supplied observation timestamp.
///
/// Nanosecond resolution is assumed sufficient (spec.md Section 3); equal
/// timestamps are allowed and handled explicitly by the node sets. Unlike
/// the teacher's `Timestamp`, this core never adds or subtracts time from
/// itself -- time flows in from the caller and is only ever compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn new(nanos: u64) -> Self {
        Self(nanos)
    }

    pub fn as_nanos(&self) -> u64 {
        self.0
    }
}

/// A peer: an id paired with an opaque transport address.
///
/// Two nodes with the same id but a different `link` are a **link
/// conflict** (spec.md Section 3) and must fail any operation that
/// touches that id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    pub id: Id,
    link: String,
}

impl Node {
    /// Construct a `Node`. `link` must be non-empty.
    pub fn new(id: Id, link: impl Into<String>) -> Result<Self, RoutingError> {
        let link = link.into();
        if link.is_empty() {
            return Err(RoutingError::InvalidId {
                reason: "node link must be non-empty".to_string(),
            });
        }
        Ok(Self { id, link })
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn link(&self) -> &str {
        &self.link
    }
}

/// A timestamped observation of a [`Node`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Activity {
    pub node: Node,
    pub time: Timestamp,
}

impl Activity {
    pub fn new(node: Node, time: Timestamp) -> Self {
        Self { node, time }
    }
}
