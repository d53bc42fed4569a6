//! Connection manager for one remote cluster member.
//!
//! A [`Peer`] combines three concerns:
//!
//! - **Liveness**: an outbound heartbeat loop, and an inbound failure
//!   detector that partitions the peer after `heartbeat_timeout` of silence.
//! - **Registry RPC**: `find_actor` / `list_actors`, correlated by
//!   [`RequestId`] and bounded by `rpc_receive_timeout`.
//! - **Channel lifecycle**: a push channel opened lazily and reopened after a
//!   write failure.
//!
//! # Failure detection
//!
//! ```text
//! heartbeat ──► cancel partition timer ──► Connected ──► arm partition timer
//!                                                              │
//!                        heartbeat_timeout with no heartbeat   ▼
//!                                                         Partitioned
//! ```
//!
//! The partition timer is replaced, never stacked, so the peer is partitioned
//! exactly once per silent period whatever the number of earlier heartbeats.
//!
//! # Threading
//!
//! `Peer` is a cheap `Clone` handle over `Rc` state and must be driven from a
//! `tokio::task::LocalSet`. Timer callbacks run on the same thread and never
//! hold a borrow across an `.await`, so state changes are serialized.

use std::cell::RefCell;
use std::fmt;
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::codec::{JsonCodec, MessageCodec};
use crate::config::{ConfigError, PeerConfig};
use crate::error::{PeerError, PeerResult, RemoteError};
use crate::id::{NodeId, RequestId};
use crate::message::Message;
use crate::pending::{PendingRequestTable, RequestKind};
use crate::providers::Providers;
use crate::scheduler::{Scheduler, TimerHandle};
use crate::state::PeerState;
use crate::time::TimeProvider;
use crate::transport::{Channel, Transport};

type ChannelOf<P> = <<P as Providers>::Transport as Transport>::Channel;

/// Mutable part of a peer, only touched between `.await` points.
struct PeerCore<P: Providers> {
    state: PeerState,
    channel: Option<ChannelOf<P>>,
    heartbeat_timer: Option<TimerHandle>,
    partition_timer: Option<TimerHandle>,
}

struct PeerInner<P: Providers, C: MessageCodec> {
    id: NodeId,
    address: String,
    config: PeerConfig,
    providers: P,
    codec: C,
    scheduler: Scheduler<P>,
    pending: PendingRequestTable,
    core: RefCell<PeerCore<P>>,
}

impl<P: Providers, C: MessageCodec> Drop for PeerInner<P, C> {
    fn drop(&mut self) {
        if let Some(mut channel) = self.core.get_mut().channel.take() {
            channel.close();
        }
    }
}

/// Local proxy for one remote cluster member.
pub struct Peer<P: Providers, C: MessageCodec = JsonCodec> {
    inner: Rc<PeerInner<P, C>>,
}

impl<P: Providers, C: MessageCodec> Clone for Peer<P, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: Providers> Peer<P, JsonCodec> {
    /// Create a peer for member `id` reachable at `address`, using JSON on
    /// the wire. Starts `Disconnected`; nothing is sent until first use.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] reported by [`PeerConfig::validate`].
    pub fn new(
        id: impl Into<NodeId>,
        address: impl Into<String>,
        providers: P,
        config: PeerConfig,
    ) -> Result<Self, ConfigError> {
        Self::with_codec(id, address, providers, config, JsonCodec)
    }
}

impl<P: Providers, C: MessageCodec> Peer<P, C> {
    /// Create a peer with a custom message codec.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] reported by [`PeerConfig::validate`].
    pub fn with_codec(
        id: impl Into<NodeId>,
        address: impl Into<String>,
        providers: P,
        config: PeerConfig,
        codec: C,
    ) -> Result<Self, ConfigError> {
        let id = id.into();
        let address = address.into();
        if let Err(e) = config.validate() {
            tracing::warn!(peer = %id, error = %e, "rejected peer configuration");
            return Err(e);
        }
        tracing::debug!(peer = %id, %address, "peer created");

        Ok(Self {
            inner: Rc::new(PeerInner {
                scheduler: Scheduler::new(&providers),
                pending: PendingRequestTable::new(),
                core: RefCell::new(PeerCore {
                    state: PeerState::Disconnected,
                    channel: None,
                    heartbeat_timer: None,
                    partition_timer: None,
                }),
                id,
                address,
                config,
                providers,
                codec,
            }),
        })
    }

    fn from_weak(weak: &Weak<PeerInner<P, C>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Cluster id of the remote member.
    pub fn id(&self) -> &NodeId {
        &self.inner.id
    }

    /// Transport address of the remote member.
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// Timing configuration.
    pub fn config(&self) -> &PeerConfig {
        &self.inner.config
    }

    /// Current connection state.
    pub fn state(&self) -> PeerState {
        self.inner.core.borrow().state
    }

    /// Whether cluster logic should route work to this peer.
    pub fn is_usable(&self) -> bool {
        self.state().is_usable()
    }

    /// Number of registry requests awaiting a reply.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    /// Whether a channel is currently open.
    pub fn has_channel(&self) -> bool {
        self.inner.core.borrow().channel.is_some()
    }

    /// Whether the outbound heartbeat loop is running.
    pub fn is_sending_heartbeats(&self) -> bool {
        self.inner.core.borrow().heartbeat_timer.is_some()
    }

    /// Whether a partition timer is armed.
    pub fn is_partition_timer_armed(&self) -> bool {
        self.inner.core.borrow().partition_timer.is_some()
    }

    /// Move to `next` if the state machine allows it; otherwise leave the
    /// state untouched.
    fn transition(&self, next: PeerState) -> PeerResult<()> {
        let from = {
            let mut core = self.inner.core.borrow_mut();
            let from = core.state;
            if !from.can_transition_to(next) {
                return Err(PeerError::InvalidTransition { from, to: next });
            }
            core.state = next;
            from
        };

        if from != next {
            let peer = &self.inner.id;
            match next {
                PeerState::Connected => tracing::info!(%peer, %from, "connected to peer"),
                PeerState::Partitioned => {
                    tracing::warn!(%peer, "communication with peer interrupted")
                }
                PeerState::Shutdown => tracing::info!(%peer, %from, "peer shut down"),
                PeerState::Disconnected => {}
            }
        }
        Ok(())
    }

    // =========================================================================
    // Liveness
    // =========================================================================

    /// Record an inbound heartbeat from the remote member.
    ///
    /// Replaces the partition timer, moves to `Connected` and makes sure the
    /// outbound heartbeat loop is running.
    ///
    /// # Errors
    ///
    /// `PeerError::Shutdown` once the peer is shut down.
    pub fn on_heartbeat_received(&self) -> PeerResult<()> {
        if self.state().is_terminal() {
            return Err(PeerError::Shutdown);
        }
        tracing::trace!(peer = %self.inner.id, "heartbeat received");

        self.cancel_partition_timer();
        self.transition(PeerState::Connected)?;
        self.start_heartbeat_loop();
        self.arm_partition_timer();
        Ok(())
    }

    fn arm_partition_timer(&self) {
        let weak = Rc::downgrade(&self.inner);
        let handle = self
            .inner
            .scheduler
            .after(self.inner.config.heartbeat_timeout, move || {
                if let Some(peer) = Self::from_weak(&weak) {
                    peer.on_partition_timeout();
                }
            });
        self.inner.core.borrow_mut().partition_timer = Some(handle);
    }

    fn cancel_partition_timer(&self) {
        let timer = self.inner.core.borrow_mut().partition_timer.take();
        if let Some(timer) = timer {
            self.inner.scheduler.cancel(timer);
        }
    }

    fn on_partition_timeout(&self) {
        self.inner.core.borrow_mut().partition_timer = None;
        if self.state() == PeerState::Connected {
            let _ = self.transition(PeerState::Partitioned);
        }
    }

    /// Start the outbound heartbeat loop unless it is already running:
    /// one heartbeat now, then one every `heartbeat_rate` until shutdown.
    fn start_heartbeat_loop(&self) {
        {
            let core = self.inner.core.borrow();
            if core.heartbeat_timer.is_some() || core.state.is_terminal() {
                return;
            }
        }

        // Registered before the first send: that send may open the channel,
        // which would otherwise start a second loop.
        let weak = Rc::downgrade(&self.inner);
        let handle = self
            .inner
            .scheduler
            .every(self.inner.config.heartbeat_rate, move || {
                match Self::from_weak(&weak) {
                    Some(peer) if !peer.state().is_terminal() => {
                        peer.send_heartbeat();
                        ControlFlow::Continue(())
                    }
                    _ => ControlFlow::Break(()),
                }
            });
        self.inner.core.borrow_mut().heartbeat_timer = Some(handle);
        tracing::debug!(peer = %self.inner.id, "heartbeat loop started");

        self.send_heartbeat();
    }

    fn send_heartbeat(&self) {
        if let Err(e) = self.send_message(&Message::Heartbeat) {
            tracing::debug!(peer = %self.inner.id, error = %e, "heartbeat not sent");
        }
    }

    // =========================================================================
    // Channel
    // =========================================================================

    /// Open the channel if it is not open yet.
    ///
    /// A freshly opened channel immediately carries a heartbeat. Connect
    /// failures are returned as-is: no retry and no state change.
    pub fn ensure_channel(&self) -> PeerResult<()> {
        {
            let mut core = self.inner.core.borrow_mut();
            if core.state.is_terminal() {
                return Err(PeerError::Shutdown);
            }
            if core.channel.is_some() {
                return Ok(());
            }

            let mut channel = self.inner.providers.transport().open();
            if let Err(e) = channel.connect(&self.inner.address) {
                channel.close();
                tracing::warn!(
                    peer = %self.inner.id,
                    address = %self.inner.address,
                    error = %e,
                    "connect failed"
                );
                return Err(PeerError::Connect {
                    address: self.inner.address.clone(),
                    reason: e.to_string(),
                });
            }
            core.channel = Some(channel);
        }

        tracing::debug!(peer = %self.inner.id, address = %self.inner.address, "channel opened");
        self.start_heartbeat_loop();
        Ok(())
    }

    fn close_channel(&self) {
        let channel = self.inner.core.borrow_mut().channel.take();
        if let Some(mut channel) = channel {
            channel.close();
        }
    }

    /// Encode `message` and push it to the remote member.
    ///
    /// A write failure closes the channel (reopened on the next send) but
    /// does not change the peer state.
    pub fn send_message(&self, message: &Message) -> PeerResult<()> {
        if self.state().is_terminal() {
            return Err(PeerError::Shutdown);
        }
        let bytes = self.inner.codec.encode(message)?;
        self.ensure_channel()?;

        let result = {
            let mut core = self.inner.core.borrow_mut();
            match core.channel.as_mut() {
                Some(channel) => channel.write(&bytes),
                None => return Err(PeerError::Write("channel closed".to_string())),
            }
        };

        match result {
            Ok(()) => {
                tracing::trace!(
                    peer = %self.inner.id,
                    kind = message.kind(),
                    bytes = bytes.len(),
                    "message sent"
                );
                Ok(())
            }
            Err(e) => {
                tracing::debug!(peer = %self.inner.id, error = %e, "write failed, dropping channel");
                self.close_channel();
                Err(PeerError::Write(e.to_string()))
            }
        }
    }

    // =========================================================================
    // Registry RPC
    // =========================================================================

    /// Look up the actor registered as `name` on the remote member.
    pub async fn find_actor(&self, name: &str) -> PeerResult<Value> {
        self.request(RequestKind::Find, format!("find_actor({})", name), |request_id| {
            Message::FindRequest {
                request_id,
                name: name.to_string(),
            }
        })
        .await
    }

    /// List the actors registered on the remote member.
    pub async fn list_actors(&self) -> PeerResult<Vec<Value>> {
        let value = self
            .request(RequestKind::List, "list_actors".to_string(), |request_id| {
                Message::ListRequest { request_id }
            })
            .await?;
        match value {
            Value::Array(actors) => Ok(actors),
            other => Err(PeerError::MalformedResponse(format!(
                "expected an array of actors, got {}",
                other
            ))),
        }
    }

    async fn request<F>(&self, kind: RequestKind, operation: String, build: F) -> PeerResult<Value>
    where
        F: FnOnce(RequestId) -> Message,
    {
        if self.state().is_terminal() {
            return Err(PeerError::Shutdown);
        }

        let (request_id, reply) = self.inner.pending.register(kind, operation.clone());
        if let Err(e) = self.send_message(&build(request_id)) {
            self.inner.pending.remove(request_id);
            return Err(e);
        }
        tracing::debug!(peer = %self.inner.id, %request_id, %operation, "request sent");

        let time = self.inner.providers.time().clone();
        match time.timeout(self.inner.config.rpc_receive_timeout, reply).await {
            Ok(Ok(result)) => result,
            // Slot dropped without an answer: the table was torn down.
            Ok(Err(_)) => Err(PeerError::Shutdown),
            Err(_) => Err(self.on_request_timeout(kind, request_id, operation)),
        }
    }

    fn on_request_timeout(
        &self,
        kind: RequestKind,
        request_id: RequestId,
        operation: String,
    ) -> PeerError {
        self.inner.pending.remove(request_id);
        let peer = self.inner.id.to_string();
        let unreachable = |operation: &str| PeerError::Unreachable {
            peer: peer.clone(),
            operation: operation.to_string(),
        };

        // Other lookups of this kind fail under their own operation label.
        let cancelled = self.inner.pending.fail_kind(kind, unreachable);
        tracing::warn!(
            peer = %self.inner.id,
            %request_id,
            cancelled,
            "request timed out"
        );

        if self.state() == PeerState::Connected {
            self.cancel_partition_timer();
            let _ = self.transition(PeerState::Partitioned);
        }
        unreachable(&operation)
    }

    /// Resolve a pending request with the remote member's answer.
    ///
    /// Returns false for unknown ids (late or duplicate replies).
    pub fn deliver_response(&self, request_id: RequestId, value: Value) -> bool {
        let delivered = self.inner.pending.complete(request_id, Ok(value));
        if !delivered {
            tracing::debug!(peer = %self.inner.id, %request_id, "dropping reply for unknown request");
        }
        delivered
    }

    /// Fail a pending request with the remote member's error.
    ///
    /// Returns false for unknown ids (late or duplicate replies).
    pub fn deliver_error_response(&self, request_id: RequestId, error: RemoteError) -> bool {
        let delivered = self
            .inner
            .pending
            .complete(request_id, Err(PeerError::Remote(error)));
        if !delivered {
            tracing::debug!(peer = %self.inner.id, %request_id, "dropping error reply for unknown request");
        }
        delivered
    }

    /// Route an inbound message from this member to the matching entry point.
    ///
    /// Inbound `FindRequest` / `ListRequest` are served by the local actor
    /// registry, not by the peer, and are ignored here.
    pub fn handle_message(&self, message: Message) -> PeerResult<()> {
        match message {
            Message::Heartbeat => self.on_heartbeat_received(),
            Message::Response { request_id, value } => {
                self.deliver_response(request_id, value);
                Ok(())
            }
            Message::ErrorResponse { request_id, error } => {
                self.deliver_error_response(request_id, error);
                Ok(())
            }
            request @ (Message::FindRequest { .. } | Message::ListRequest { .. }) => {
                tracing::debug!(peer = %self.inner.id, kind = request.kind(), "ignoring inbound request");
                Ok(())
            }
        }
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Shut the peer down. Idempotent.
    ///
    /// Cancels both timers, closes the channel and fails every pending
    /// request with `PeerError::Shutdown` before returning.
    pub fn shutdown(&self) {
        if self.transition(PeerState::Shutdown).is_err() {
            return;
        }

        let timers = {
            let mut core = self.inner.core.borrow_mut();
            [core.heartbeat_timer.take(), core.partition_timer.take()]
        };
        for timer in timers.into_iter().flatten() {
            self.inner.scheduler.cancel(timer);
        }
        self.close_channel();

        let failed = self.inner.pending.fail_all(PeerError::Shutdown);
        if failed > 0 {
            tracing::debug!(peer = %self.inner.id, failed, "failed pending requests on shutdown");
        }
    }
}

impl<P: Providers, C: MessageCodec> fmt::Debug for Peer<P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Peer[{}] address={} state={}",
            self.inner.id,
            self.inner.address,
            self.state()
        )
    }
}
