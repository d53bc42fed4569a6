//! Instance-owned registry of the peers a node talks to.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ PeerDirectory                        │
//! │                                      │
//! │  ┌────────────────────────────────┐  │
//! │  │ peers: NodeId → Peer           │  │
//! │  └────────────────────────────────┘  │
//! └──────────────────────────────────────┘
//!          ▲                    │
//!   receive path          dispatch(from, msg)
//!   (decoded message)           ▼
//!                        Peer::handle_message
//! ```
//!
//! There is no process-wide directory: each node owns one and passes it to
//! whatever needs to look peers up.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::codec::{JsonCodec, MessageCodec};
use crate::error::DirectoryError;
use crate::id::NodeId;
use crate::message::Message;
use crate::peer::Peer;
use crate::providers::Providers;

/// Map of known peers, keyed by node id.
pub struct PeerDirectory<P: Providers, C: MessageCodec = JsonCodec> {
    peers: RefCell<BTreeMap<NodeId, Peer<P, C>>>,
}

impl<P: Providers, C: MessageCodec> PeerDirectory<P, C> {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self {
            peers: RefCell::new(BTreeMap::new()),
        }
    }

    /// Register `peer` under its id, returning the peer it replaced.
    ///
    /// The replaced peer is not shut down; that is left to the caller.
    pub fn insert(&self, peer: Peer<P, C>) -> Option<Peer<P, C>> {
        let id = peer.id().clone();
        tracing::debug!(peer = %id, address = peer.address(), "directory: peer registered");
        self.peers.borrow_mut().insert(id, peer)
    }

    /// Look a peer up by id.
    pub fn find(&self, id: &NodeId) -> Option<Peer<P, C>> {
        self.peers.borrow().get(id).cloned()
    }

    /// Every registered peer, ordered by id.
    pub fn all(&self) -> Vec<Peer<P, C>> {
        self.peers.borrow().values().cloned().collect()
    }

    /// Peers currently `Connected`.
    pub fn usable(&self) -> Vec<Peer<P, C>> {
        self.peers
            .borrow()
            .values()
            .filter(|peer| peer.is_usable())
            .cloned()
            .collect()
    }

    /// Forget a peer. It keeps running until shut down.
    pub fn remove(&self, id: &NodeId) -> Option<Peer<P, C>> {
        self.peers.borrow_mut().remove(id)
    }

    /// Number of registered peers.
    pub fn len(&self) -> usize {
        self.peers.borrow().len()
    }

    /// Whether no peer is registered.
    pub fn is_empty(&self) -> bool {
        self.peers.borrow().is_empty()
    }

    /// Route a message received from `from` to that peer.
    pub fn dispatch(&self, from: &NodeId, message: Message) -> Result<(), DirectoryError> {
        // The peer may re-enter the directory from its callbacks, so the map
        // borrow ends before the message is handled.
        let peer = self
            .find(from)
            .ok_or_else(|| DirectoryError::UnknownPeer(from.clone()))?;
        peer.handle_message(message)?;
        Ok(())
    }

    /// Shut every registered peer down. Peers stay registered.
    pub fn shutdown_all(&self) {
        for peer in self.all() {
            peer.shutdown();
        }
        tracing::info!(peers = self.len(), "directory: all peers shut down");
    }
}

impl<P: Providers, C: MessageCodec> Default for PeerDirectory<P, C> {
    fn default() -> Self {
        Self::new()
    }
}
