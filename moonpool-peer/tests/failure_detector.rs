//! Tests for the heartbeat failure detector.
//!
//! Tests verify that:
//! - Heartbeats spaced under the timeout keep the peer connected
//! - A full timeout of silence partitions the peer once
//! - A heartbeat brings a partitioned peer back
//! - The outbound heartbeat cadence follows `heartbeat_rate`

use std::time::Duration;

use moonpool_peer::{
    JsonCodec, MemoryTransport, Message, Peer, PeerConfig, PeerState, TokioProviders,
};
use tokio::task::LocalSet;
use tokio::time::sleep;

type TestPeer = Peer<TokioProviders<MemoryTransport>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// 100ms rate, 300ms timeout, 50ms RPC timeout.
fn test_peer() -> (TestPeer, MemoryTransport) {
    let transport = MemoryTransport::new();
    let peer = Peer::new(
        "cell-b",
        "10.0.0.2:7000",
        TokioProviders::memory(transport.clone()),
        PeerConfig::for_simulation(),
    )
    .unwrap();
    (peer, transport)
}

fn heartbeats_sent(transport: &MemoryTransport) -> usize {
    transport
        .sent_messages(&JsonCodec)
        .iter()
        .filter(|message| **message == Message::Heartbeat)
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_first_heartbeat_connects() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let (peer, transport) = test_peer();
            assert_eq!(peer.state(), PeerState::Disconnected);
            assert!(!peer.is_usable());

            peer.on_heartbeat_received().unwrap();

            assert_eq!(peer.state(), PeerState::Connected);
            assert!(peer.is_usable());
            assert!(peer.has_channel());
            assert!(peer.is_sending_heartbeats());
            assert!(peer.is_partition_timer_armed());
            // Our own heartbeat goes out right away.
            assert_eq!(transport.connect_count(), 1);
            assert_eq!(heartbeats_sent(&transport), 1);

            peer.shutdown();
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_heartbeats_under_timeout_never_partition() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let (peer, _transport) = test_peer();

            for _ in 0..20 {
                peer.on_heartbeat_received().unwrap();
                sleep(Duration::from_millis(290)).await;
                assert_eq!(peer.state(), PeerState::Connected);
            }

            peer.shutdown();
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_silence_partitions_exactly_once() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let (peer, _transport) = test_peer();

            // Several heartbeats in a row must not leave stacked timers.
            peer.on_heartbeat_received().unwrap();
            sleep(Duration::from_millis(100)).await;
            peer.on_heartbeat_received().unwrap();
            sleep(Duration::from_millis(100)).await;
            peer.on_heartbeat_received().unwrap();

            // The first two timers would have fired at 300ms and 400ms.
            sleep(Duration::from_millis(290)).await;
            assert_eq!(peer.state(), PeerState::Connected);

            sleep(Duration::from_millis(20)).await;
            assert_eq!(peer.state(), PeerState::Partitioned);
            assert!(!peer.is_partition_timer_armed());
            assert!(!peer.is_usable());

            sleep(Duration::from_secs(5)).await;
            assert_eq!(peer.state(), PeerState::Partitioned);

            peer.shutdown();
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_recovers_partitioned_peer() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let (peer, transport) = test_peer();

            peer.on_heartbeat_received().unwrap();
            sleep(Duration::from_millis(310)).await;
            assert_eq!(peer.state(), PeerState::Partitioned);

            peer.on_heartbeat_received().unwrap();
            assert_eq!(peer.state(), PeerState::Connected);
            assert!(peer.is_partition_timer_armed());
            // The outbound loop was never restarted, only one channel exists.
            assert_eq!(transport.connect_count(), 1);

            sleep(Duration::from_millis(310)).await;
            assert_eq!(peer.state(), PeerState::Partitioned);

            peer.shutdown();
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_outbound_heartbeat_cadence() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let (peer, transport) = test_peer();

            peer.on_heartbeat_received().unwrap();
            // Sent at 0, 100, 200 and 300ms.
            sleep(Duration::from_millis(350)).await;
            assert_eq!(heartbeats_sent(&transport), 4);

            // Partitioned peers keep sending heartbeats.
            assert_eq!(peer.state(), PeerState::Partitioned);
            sleep(Duration::from_millis(200)).await;
            assert_eq!(heartbeats_sent(&transport), 6);

            peer.shutdown();
            sleep(Duration::from_secs(1)).await;
            assert_eq!(heartbeats_sent(&transport), 6);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_loop_survives_write_failures() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let (peer, transport) = test_peer();

            transport.set_write_failure(true);
            peer.on_heartbeat_received().unwrap();
            assert_eq!(peer.state(), PeerState::Connected);
            assert!(!peer.has_channel());

            sleep(Duration::from_millis(150)).await;
            assert_eq!(heartbeats_sent(&transport), 0);
            assert!(peer.is_sending_heartbeats());

            transport.set_write_failure(false);
            sleep(Duration::from_millis(100)).await;
            assert_eq!(heartbeats_sent(&transport), 1);
            assert!(peer.has_channel());

            peer.shutdown();
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_does_not_block_liveness() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let (peer, transport) = test_peer();

            transport.set_connect_failure(true);
            peer.on_heartbeat_received().unwrap();

            // Inbound liveness is independent of our outbound channel.
            assert_eq!(peer.state(), PeerState::Connected);
            assert!(!peer.has_channel());
            assert_eq!(transport.connect_count(), 0);

            transport.set_connect_failure(false);
            sleep(Duration::from_millis(150)).await;
            assert!(peer.has_channel());
            assert_eq!(heartbeats_sent(&transport), 1);

            peer.shutdown();
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_scenario_connect_partition_recover() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let transport = MemoryTransport::new();
            let peer: TestPeer = Peer::new(
                "cell-c",
                "10.0.0.3:7000",
                TokioProviders::memory(transport),
                PeerConfig::default(),
            )
            .unwrap();

            assert_eq!(peer.state(), PeerState::Disconnected);
            peer.on_heartbeat_received().unwrap();
            assert_eq!(peer.state(), PeerState::Connected);

            sleep(Duration::from_millis(10_001)).await;
            assert_eq!(peer.state(), PeerState::Partitioned);

            peer.on_heartbeat_received().unwrap();
            assert_eq!(peer.state(), PeerState::Connected);

            peer.shutdown();
        })
        .await;
}
