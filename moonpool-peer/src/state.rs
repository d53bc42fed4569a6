//! Peer connection state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state of a remote cluster member.
///
/// # State Transitions
///
/// ```text
///                heartbeat                  partition timer / RPC timeout
/// Disconnected ───────────► Connected ◄──┐ ─────────────────► Partitioned
///      │                      │  │       │ heartbeat               │
///      │                      │  └───────┘◄────────────────────────┤
///      │                      │                                    │
///      └──────────────────────┴────────────► Shutdown ◄────────────┘
/// ```
///
/// # Invariants
///
/// - `Shutdown` is terminal: nothing leaves it
/// - A rejected transition leaves the state untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PeerState {
    /// No heartbeat confirmed yet. Initial state.
    #[default]
    Disconnected,

    /// A heartbeat was seen within the last `heartbeat_timeout`.
    Connected,

    /// Communication presumed interrupted. Not permanent: a fresh heartbeat
    /// brings the peer back to `Connected`.
    Partitioned,

    /// Explicitly shut down. Terminal.
    Shutdown,
}

impl PeerState {
    /// Check if transition to next state is valid.
    ///
    /// # Valid Transitions
    ///
    /// - Disconnected → Connected | Shutdown
    /// - Connected → Connected (heartbeat re-arms the timer) | Partitioned | Shutdown
    /// - Partitioned → Connected (recovery) | Shutdown
    pub fn can_transition_to(&self, next: PeerState) -> bool {
        use PeerState::*;
        matches!(
            (self, next),
            (Disconnected, Connected)
                | (Disconnected, Shutdown)
                | (Connected, Connected)
                | (Connected, Partitioned)
                | (Connected, Shutdown)
                | (Partitioned, Connected)
                | (Partitioned, Shutdown)
        )
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PeerState::Shutdown)
    }

    /// Whether downstream cluster logic should route work to this peer.
    pub fn is_usable(&self) -> bool {
        matches!(self, PeerState::Connected)
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
            Self::Partitioned => write!(f, "partitioned"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_state_transitions() {
        use PeerState::*;

        // Valid transitions
        assert!(Disconnected.can_transition_to(Connected));
        assert!(Disconnected.can_transition_to(Shutdown));
        assert!(Connected.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Partitioned));
        assert!(Connected.can_transition_to(Shutdown));
        assert!(Partitioned.can_transition_to(Connected));
        assert!(Partitioned.can_transition_to(Shutdown));

        // Invalid transitions
        assert!(!Disconnected.can_transition_to(Partitioned)); // never seen alive
        assert!(!Disconnected.can_transition_to(Disconnected));
        assert!(!Partitioned.can_transition_to(Partitioned)); // declared once
        assert!(!Connected.can_transition_to(Disconnected));
        assert!(!Partitioned.can_transition_to(Disconnected));
    }

    #[test]
    fn test_shutdown_is_terminal() {
        use PeerState::*;

        assert!(Shutdown.is_terminal());
        for next in [Disconnected, Connected, Partitioned, Shutdown] {
            assert!(!Shutdown.can_transition_to(next));
        }

        assert!(!Disconnected.is_terminal());
        assert!(!Connected.is_terminal());
        assert!(!Partitioned.is_terminal());
    }

    #[test]
    fn test_only_connected_is_usable() {
        use PeerState::*;

        assert!(Connected.is_usable());
        assert!(!Disconnected.is_usable());
        assert!(!Partitioned.is_usable());
        assert!(!Shutdown.is_usable());
    }

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(PeerState::default(), PeerState::Disconnected);
    }
}
