//! Identifiers for cluster members and in-flight requests.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;

/// Cluster-unique identifier of a remote member.
///
/// Opaque to this crate: two peers are the same member iff their ids are
/// equal. The transport address is tracked separately by [`crate::Peer`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Create a node id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Correlation identifier linking a request to its reply.
///
/// # Invariants
///
/// - A reply carries the `RequestId` of the request it answers
/// - A `RequestId` maps to at most one pending request on a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Create a new RequestId.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic source of [`RequestId`]s, starting at 1.
///
/// Uses `Cell<u64>`: the owning peer is single-threaded.
#[derive(Debug)]
pub struct RequestIdFactory {
    next_id: Cell<u64>,
}

impl RequestIdFactory {
    /// Create a factory whose first id is 1.
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
        }
    }

    /// Hand out the next id.
    pub fn next(&self) -> RequestId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        RequestId(id)
    }
}

impl Default for RequestIdFactory {
    fn default() -> Self {
        Self::new()
    }
}
