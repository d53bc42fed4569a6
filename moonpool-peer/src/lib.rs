//! # Moonpool Peer
//!
//! Per-peer connection management for a distributed actor cluster.
//!
//! This crate provides:
//! - **Peer**: Heartbeat failure detector, connection state machine and
//!   registry RPC (`find_actor`, `list_actors`) for one remote member
//! - **Scheduler**: Delayed, repeating and cancellable callbacks
//! - **PendingRequestTable**: Request/reply correlation with bounded waits
//! - **Transport**: Push-style channels over TCP (CRC32C framed) or memory
//! - **PeerDirectory**: Instance-owned map of known peers
//!
//! ```text
//!                 receive path (decoded Message)
//!                            │
//!                            ▼
//!   PeerDirectory ──► Peer::handle_message ──► on_heartbeat_received
//!                            │                  deliver_response
//!                            │
//!   find_actor / list_actors ▼
//!   ────────────────────► Peer ──► PendingRequestTable
//!                          │  └──► Scheduler (heartbeat loop, partition timer)
//!                          ▼
//!                 MessageCodec ──► Channel::write
//! ```
//!
//! Everything runs on one thread inside a `tokio::task::LocalSet`.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

// =============================================================================
// Modules
// =============================================================================

/// Message serialization.
pub mod codec;

/// Peer timing configuration.
pub mod config;

/// Registry of known peers.
pub mod directory;

/// Error types for peer operations.
pub mod error;

/// Node and request identifiers.
pub mod id;

/// Wire-level messages exchanged between peers.
pub mod message;

/// Connection manager for one remote member.
pub mod peer;

/// Request/reply correlation.
pub mod pending;

/// Provider bundle.
pub mod providers;

/// Cancellable timers.
pub mod scheduler;

/// Peer connection state machine.
pub mod state;

/// Task spawning abstraction.
pub mod task;

/// Time abstraction.
pub mod time;

/// Outbound transport channels.
pub mod transport;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use codec::{CodecError, JsonCodec, MessageCodec};
pub use config::{ConfigError, PeerConfig};
pub use directory::PeerDirectory;
pub use error::{DirectoryError, PeerError, PeerResult, RemoteError};
pub use id::{NodeId, RequestId, RequestIdFactory};
pub use message::Message;
pub use peer::Peer;
pub use pending::{PendingRequestTable, ReplyReceiver, RequestKind};
pub use providers::{Providers, TokioProviders};
pub use scheduler::{Scheduler, TimerHandle};
pub use state::PeerState;
pub use task::{TaskProvider, TokioTaskProvider};
pub use time::{TimeError, TimeProvider, TokioTimeProvider};
pub use transport::{
    Channel, MemoryChannel, MemoryTransport, TcpChannel, TcpTransport, Transport,
    wire::{WireError, deserialize_frame, serialize_frame, try_deserialize_frame},
};
