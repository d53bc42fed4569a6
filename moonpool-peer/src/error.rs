//! Error types for peer operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::codec::CodecError;
use crate::id::NodeId;
use crate::state::PeerState;

/// Error payload carried by an `ErrorResponse` from the remote member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError(pub String);

impl RemoteError {
    /// Create a remote error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors that can occur during peer operations.
///
/// `Connect` and `Write` are reported to the caller only; they never move the
/// peer to `Partitioned`. Only missing heartbeats or an unanswered RPC do.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeerError {
    /// Opening the transport channel failed.
    #[error("failed to connect to {address}: {reason}")]
    Connect {
        /// Address the connect was attempted against.
        address: String,
        /// Underlying transport error.
        reason: String,
    },

    /// The message could not be serialized, nothing was sent.
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// Writing to the transport channel failed.
    #[error("failed to write to peer: {0}")]
    Write(String),

    /// No correlated reply arrived within the receive timeout.
    #[error("peer {peer} unreachable: no reply to {operation}")]
    Unreachable {
        /// Id of the peer that did not answer.
        peer: String,
        /// Operation that timed out.
        operation: String,
    },

    /// The remote member answered with an explicit error.
    #[error("remote error: {0}")]
    Remote(RemoteError),

    /// The peer is shut down, or was shut down while the request was pending.
    #[error("peer shut down")]
    Shutdown,

    /// A state transition was requested that the state machine forbids.
    #[error("invalid peer state transition from {from} to {to}")]
    InvalidTransition {
        /// State the peer was in.
        from: PeerState,
        /// State that was requested.
        to: PeerState,
    },

    /// A reply arrived but its payload has the wrong shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl From<CodecError> for PeerError {
    fn from(error: CodecError) -> Self {
        PeerError::Encode(error.to_string())
    }
}

impl From<RemoteError> for PeerError {
    fn from(error: RemoteError) -> Self {
        PeerError::Remote(error)
    }
}

/// Result type for peer operations.
pub type PeerResult<T> = Result<T, PeerError>;

/// Errors returned by [`crate::PeerDirectory`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// No peer is registered under this id.
    #[error("unknown peer: {0}")]
    UnknownPeer(NodeId),

    /// The peer rejected the message.
    #[error(transparent)]
    Peer(#[from] PeerError),
}
