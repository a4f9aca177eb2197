//! Domain errors for the routing core.
//!
//! Reference: SPEC_FULL.md Section 7 / spec.md Section 7.

use thiserror::Error;

use crate::domain::id::Id;

/// Errors surfaced by routing-core operations.
///
/// `NoChange` is deliberately not a variant here: a legitimate "nothing
/// happened" outcome is represented structurally by an empty change set
/// (see `domain::change_set`), never by an `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// An operation referenced an id already present with a different link.
    #[error("link conflict for id {id:?}: existing link {existing:?}, incoming link {incoming:?}")]
    LinkConflict {
        id: Id,
        existing: String,
        incoming: String,
    },

    /// Id length mismatch or a structurally impossible id.
    #[error("invalid id: {reason}")]
    InvalidId { reason: String },

    /// `stale`/`lock`/`unlock` referenced a node not currently in `live`.
    #[error("bad operation: {reason}")]
    BadOperation { reason: String },
}
