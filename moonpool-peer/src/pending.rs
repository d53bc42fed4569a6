//! Outstanding requests awaiting a correlated reply.
//!
//! # Architecture
//!
//! ```text
//! Request Flow:
//!   1. register(kind, operation) -> (RequestId, oneshot::Receiver)
//!   2. send request over the channel
//!   3. wait on the receiver, bounded by the RPC receive timeout
//!
//! Reply Flow:
//!   4. reply arrives from the receive path
//!   5. complete(request_id, result) removes the entry
//!   6. oneshot::Sender fires, waiting caller resumes
//!
//! Timeout / Shutdown:
//!   5'. remove(request_id), fail_kind(..) or fail_all(..)
//! ```
//!
//! Every path removes the entry, so the table never keeps a resolved id.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{PeerError, PeerResult};
use crate::id::{RequestId, RequestIdFactory};

/// Which registry query a pending request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// `find_actor`
    Find,
    /// `list_actors`
    List,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Find => write!(f, "find_actor"),
            Self::List => write!(f, "list_actors"),
        }
    }
}

/// Receiving half handed to the caller of [`PendingRequestTable::register`].
pub type ReplyReceiver = oneshot::Receiver<PeerResult<Value>>;

struct PendingRequest {
    kind: RequestKind,
    /// Operation label, e.g. `find_actor(logger)`.
    operation: String,
    sender: oneshot::Sender<PeerResult<Value>>,
}

/// Table of requests sent to a peer and not yet answered.
///
/// Uses `RefCell`: the owning peer is single-threaded.
pub struct PendingRequestTable {
    ids: RequestIdFactory,
    entries: RefCell<HashMap<RequestId, PendingRequest>>,
}

impl PendingRequestTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            ids: RequestIdFactory::new(),
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Allocate a fresh id and a slot for its reply. `operation` labels the
    /// request in errors built by [`PendingRequestTable::fail_kind`].
    pub fn register(
        &self,
        kind: RequestKind,
        operation: impl Into<String>,
    ) -> (RequestId, ReplyReceiver) {
        let request_id = self.ids.next();
        let (sender, receiver) = oneshot::channel();
        self.entries.borrow_mut().insert(
            request_id,
            PendingRequest {
                kind,
                operation: operation.into(),
                sender,
            },
        );
        (request_id, receiver)
    }

    /// Resolve a pending request. Returns false if the id is unknown
    /// (already resolved, expired, or never registered).
    pub fn complete(&self, request_id: RequestId, result: PeerResult<Value>) -> bool {
        let entry = self.entries.borrow_mut().remove(&request_id);
        match entry {
            Some(pending) => {
                if pending.sender.send(result).is_err() {
                    tracing::debug!(%request_id, "pending: caller stopped waiting");
                }
                true
            }
            None => false,
        }
    }

    /// Drop a pending request without resolving it.
    pub fn remove(&self, request_id: RequestId) -> bool {
        self.entries.borrow_mut().remove(&request_id).is_some()
    }

    /// Fail every pending request of `kind`, each with the error
    /// `error_for` builds from its operation label. Returns how many.
    pub fn fail_kind<F>(&self, kind: RequestKind, mut error_for: F) -> usize
    where
        F: FnMut(&str) -> PeerError,
    {
        let matching: Vec<(RequestId, String)> = self
            .entries
            .borrow()
            .iter()
            .filter(|(_, pending)| pending.kind == kind)
            .map(|(id, pending)| (*id, pending.operation.clone()))
            .collect();
        matching
            .into_iter()
            .filter(|(id, operation)| self.complete(*id, Err(error_for(operation.as_str()))))
            .count()
    }

    /// Fail every pending request with `error`. Returns how many.
    pub fn fail_all(&self, error: PeerError) -> usize {
        let drained: Vec<_> = self.entries.borrow_mut().drain().collect();
        let count = drained.len();
        for (_, pending) in drained {
            let _ = pending.sender.send(Err(error.clone()));
        }
        count
    }

    /// Whether `request_id` is still awaiting a reply.
    pub fn contains(&self, request_id: RequestId) -> bool {
        self.entries.borrow().contains_key(&request_id)
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether no request is outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl Default for PendingRequestTable {
    fn default() -> Self {
        Self::new()
    }
}
