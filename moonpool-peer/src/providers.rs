//! Provider bundle handed to a [`crate::Peer`].
//!
//! Rather than threading three generic parameters through every type, a
//! peer takes a single `P: Providers` and reaches its time, task and
//! transport providers through it.

use crate::task::{TaskProvider, TokioTaskProvider};
use crate::time::{TimeProvider, TokioTimeProvider};
use crate::transport::{MemoryTransport, TcpTransport, Transport};

/// Bundle of the providers a peer depends on.
pub trait Providers: Clone + 'static {
    /// Time provider type for sleep, timeout, and time queries.
    type Time: TimeProvider;

    /// Task provider type for spawning local tasks.
    type Task: TaskProvider;

    /// Transport used to open outbound channels.
    type Transport: Transport;

    /// Get the time provider instance.
    fn time(&self) -> &Self::Time;

    /// Get the task provider instance.
    fn task(&self) -> &Self::Task;

    /// Get the transport instance.
    fn transport(&self) -> &Self::Transport;
}

/// Tokio providers over any transport.
///
/// ```rust,ignore
/// use moonpool_peer::TokioProviders;
///
/// let providers = TokioProviders::tcp();
/// let time = providers.time();
/// ```
#[derive(Clone, Debug)]
pub struct TokioProviders<T: Transport = TcpTransport> {
    time: TokioTimeProvider,
    task: TokioTaskProvider,
    transport: T,
}

impl<T: Transport> TokioProviders<T> {
    /// Bundle Tokio time and task providers with `transport`.
    pub fn new(transport: T) -> Self {
        Self {
            time: TokioTimeProvider::new(),
            task: TokioTaskProvider,
            transport,
        }
    }
}

impl TokioProviders<TcpTransport> {
    /// Production bundle: Tokio runtime and TCP transport.
    pub fn tcp() -> Self {
        Self::new(TcpTransport::new())
    }
}

impl TokioProviders<MemoryTransport> {
    /// Bundle with an in-memory transport, for tests and simulations.
    pub fn memory(transport: MemoryTransport) -> Self {
        Self::new(transport)
    }
}

impl<T: Transport> Providers for TokioProviders<T> {
    type Time = TokioTimeProvider;
    type Task = TokioTaskProvider;
    type Transport = T;

    fn time(&self) -> &Self::Time {
        &self.time
    }

    fn task(&self) -> &Self::Task {
        &self.task
    }

    fn transport(&self) -> &Self::Transport {
        &self.transport
    }
}
