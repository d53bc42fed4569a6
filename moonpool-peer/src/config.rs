//! Configuration structures for peer behavior.

use std::time::Duration;
use thiserror::Error;

/// Rejected [`PeerConfig`] values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A duration that must be positive was zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// The partition timeout would fire between two regular heartbeats.
    #[error("heartbeat_timeout ({timeout:?}) must exceed heartbeat_rate ({rate:?})")]
    TimeoutNotAboveRate {
        /// Configured heartbeat rate.
        rate: Duration,
        /// Configured heartbeat timeout.
        timeout: Duration,
    },
}

/// Timing configuration for heartbeats, failure detection and registry RPC.
///
/// ## Tuning Guidelines
///
/// - `heartbeat_timeout` should be at least 2× `heartbeat_rate` so that a
///   single lost heartbeat does not partition the peer.
/// - `rpc_receive_timeout` is independent of the heartbeat timings. An RPC
///   that times out partitions a connected peer immediately.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerConfig {
    /// How often a heartbeat is sent to the peer.
    pub heartbeat_rate: Duration,

    /// How long without an inbound heartbeat before the peer is partitioned.
    pub heartbeat_timeout: Duration,

    /// How long `find_actor` / `list_actors` wait for a correlated reply.
    pub rpc_receive_timeout: Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            heartbeat_rate: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(10),
            rpc_receive_timeout: Duration::from_secs(1),
        }
    }
}

impl PeerConfig {
    /// Create a new configuration with specified parameters.
    pub fn new(
        heartbeat_rate: Duration,
        heartbeat_timeout: Duration,
        rpc_receive_timeout: Duration,
    ) -> Self {
        Self {
            heartbeat_rate,
            heartbeat_timeout,
            rpc_receive_timeout,
        }
    }

    /// Override the heartbeat rate and partition timeout.
    pub fn with_heartbeat(mut self, rate: Duration, timeout: Duration) -> Self {
        self.heartbeat_rate = rate;
        self.heartbeat_timeout = timeout;
        self
    }

    /// Override the RPC receive timeout.
    pub fn with_rpc_receive_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_receive_timeout = timeout;
        self
    }

    /// Create a configuration for low-latency local networking.
    pub fn local_network() -> Self {
        Self {
            heartbeat_rate: Duration::from_millis(500),
            heartbeat_timeout: Duration::from_millis(1500),
            rpc_receive_timeout: Duration::from_millis(250),
        }
    }

    /// Create a configuration for high-latency WAN networking.
    pub fn wan_network() -> Self {
        Self {
            heartbeat_rate: Duration::from_secs(10),
            heartbeat_timeout: Duration::from_secs(30),
            rpc_receive_timeout: Duration::from_secs(5),
        }
    }

    /// Short timings for tests running on a paused or simulated clock.
    pub fn for_simulation() -> Self {
        Self {
            heartbeat_rate: Duration::from_millis(100),
            heartbeat_timeout: Duration::from_millis(300),
            rpc_receive_timeout: Duration::from_millis(50),
        }
    }

    /// Check the timings are usable by a failure detector.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_rate.is_zero() {
            return Err(ConfigError::ZeroDuration("heartbeat_rate"));
        }
        if self.heartbeat_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("heartbeat_timeout"));
        }
        if self.rpc_receive_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("rpc_receive_timeout"));
        }
        if self.heartbeat_timeout <= self.heartbeat_rate {
            return Err(ConfigError::TimeoutNotAboveRate {
                rate: self.heartbeat_rate,
                timeout: self.heartbeat_timeout,
            });
        }
        Ok(())
    }
}
