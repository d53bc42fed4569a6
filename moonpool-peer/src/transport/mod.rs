//! Outbound transport abstraction.
//!
//! A peer only ever pushes bytes to the remote member; replies and
//! heartbeats come back through a separate receive path that calls into
//! [`crate::Peer`]. The transport is therefore modelled as a push socket:
//!
//! ```text
//! Transport::open() ──► Channel ──connect(addr)──► write(bytes)* ──► close()
//! ```
//!
//! `write` must not block the calling thread: implementations queue the
//! bytes and flush them from a background task.

use std::io;

pub mod memory;
pub mod tcp;
pub mod wire;

pub use memory::{MemoryChannel, MemoryTransport};
pub use tcp::{TcpChannel, TcpTransport};

/// Factory for outbound channels.
pub trait Transport: Clone + 'static {
    /// Channel type produced by this transport.
    type Channel: Channel;

    /// Create an unconnected channel.
    fn open(&self) -> Self::Channel;
}

/// A push-style outbound socket.
pub trait Channel: 'static {
    /// Connect to `address`.
    ///
    /// Implementations may defer the actual connect: `Ok` can mean only
    /// that the address was accepted and a connect is under way. A remote
    /// that later turns out to be unreachable is then reported by a
    /// subsequent `write` (typically as `BrokenPipe`), not here.
    /// [`TcpTransport`] works this way; [`MemoryTransport`] connects eagerly.
    ///
    /// On error the channel may hold partially acquired resources; the
    /// caller is expected to `close` it.
    fn connect(&mut self, address: &str) -> io::Result<()>;

    /// Queue `bytes` for delivery without blocking.
    ///
    /// Fails with `WouldBlock` when the implementation's queue is full and
    /// with `BrokenPipe` once a deferred connect or an earlier write failed.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Release the channel. Idempotent.
    fn close(&mut self);
}
