//! End-to-end scenarios for the link manager.
//!
//! Everything runs against [`MockTransport`]; events are injected in the
//! order a real adapter would deliver them and the resulting pool, scan and
//! alarm behavior is asserted from the outside.

use std::sync::Arc;

use lifeline_core::{
    AdvertisementKind, ConnHandle, ConnectOutcome, DisconnectReason, LinkEvent, LinkManager,
    ManagerConfig, MockTransport, PeerAddress, TransportEvent,
};
use lifeline_types::uuids::{ALARM_ACTIVATE, ALARM_CHARACTERISTIC};

const TAG_A: &str = "C0:00:00:00:00:0A";
const TAG_B: &str = "C0:00:00:00:00:0B";
const TAG_C: &str = "C0:00:00:00:00:0C";
const TAG_D: &str = "C0:00:00:00:00:0D";

fn discovered(address: &str, rssi: i16) -> TransportEvent {
    TransportEvent::Discovered {
        address: PeerAddress::new(address),
        rssi,
        kind: AdvertisementKind::ConnectableUndirected,
    }
}

fn connected(handle: u32) -> TransportEvent {
    TransportEvent::ConnectResult {
        handle: ConnHandle(handle),
        outcome: ConnectOutcome::Success,
    }
}

fn lost(handle: u32) -> TransportEvent {
    TransportEvent::Disconnected {
        handle: ConnHandle(handle),
        reason: DisconnectReason::SupervisionTimeout,
    }
}

async fn started_manager(transport: Arc<MockTransport>) -> LinkManager {
    let manager = LinkManager::new(transport, ManagerConfig::default()).unwrap();
    manager.start().await.unwrap();
    manager
}

/// Connect one tag end to end: discovery, connect request, result.
async fn establish(manager: &LinkManager, address: &str, handle: u32) {
    manager.dispatch(discovered(address, -40)).await.unwrap();
    manager.dispatch(connected(handle)).await.unwrap();
}

#[tokio::test]
async fn fills_pool_to_capacity_then_goes_idle() {
    let transport = Arc::new(MockTransport::new());
    let manager = started_manager(transport.clone()).await;

    establish(&manager, TAG_A, 1).await;
    establish(&manager, TAG_B, 2).await;
    assert!(manager.is_scanning().await, "free slot left, must scan");

    establish(&manager, TAG_C, 3).await;

    assert_eq!(manager.occupancy().await, 3);
    assert!(!manager.is_scanning().await, "full pool must not scan");
    assert_eq!(
        transport.connect_requests().await,
        vec![
            PeerAddress::new(TAG_A),
            PeerAddress::new(TAG_B),
            PeerAddress::new(TAG_C)
        ]
    );
}

#[tokio::test]
async fn spontaneous_loss_alarms_surviving_links_only() {
    let transport = Arc::new(MockTransport::new());
    let manager = started_manager(transport.clone()).await;
    establish(&manager, TAG_A, 1).await;
    establish(&manager, TAG_B, 2).await;
    establish(&manager, TAG_C, 3).await;

    manager.dispatch(lost(2)).await.unwrap();

    let writes = transport.writes().await;
    let targets: Vec<ConnHandle> = writes.iter().map(|w| w.handle).collect();
    assert_eq!(targets, vec![ConnHandle(1), ConnHandle(3)]);
    for write in &writes {
        assert_eq!(write.attribute, ALARM_CHARACTERISTIC);
        assert_eq!(write.value, vec![ALARM_ACTIVATE]);
    }

    assert_eq!(manager.occupancy().await, 2);
    assert!(manager.is_scanning().await, "freed slot must resume discovery");
}

#[tokio::test]
async fn alarm_round_survives_a_failing_write() {
    let transport = Arc::new(MockTransport::new());
    let manager = started_manager(transport.clone()).await;
    establish(&manager, TAG_A, 1).await;
    establish(&manager, TAG_B, 2).await;
    establish(&manager, TAG_C, 3).await;

    transport.fail_writes_to(ConnHandle(1)).await;
    let mut events = manager.subscribe();
    manager.dispatch(lost(2)).await.unwrap();

    // Both neighbors were attempted despite the first write failing.
    let writes = transport.writes().await;
    let targets: Vec<ConnHandle> = writes.iter().map(|w| w.handle).collect();
    assert_eq!(targets, vec![ConnHandle(1), ConnHandle(3)]);

    // The broadcast outcome is observable on the event stream.
    loop {
        match events.recv().await.unwrap() {
            LinkEvent::AlarmBroadcast { lost, notified, failed } => {
                assert_eq!(lost, ConnHandle(2));
                assert_eq!(notified, 1);
                assert_eq!(failed, 1);
                break;
            }
            _ => continue,
        }
    }
}

#[tokio::test]
async fn failed_connect_frees_attempt_and_resumes_discovery() {
    let transport = Arc::new(MockTransport::new());
    let manager = started_manager(transport.clone()).await;

    manager.dispatch(discovered(TAG_A, -40)).await.unwrap();
    assert!(!manager.is_scanning().await, "attempt in flight suspends scan");

    manager
        .dispatch(TransportEvent::ConnectResult {
            handle: ConnHandle(1),
            outcome: ConnectOutcome::Failed(0x3e),
        })
        .await
        .unwrap();

    assert_eq!(manager.occupancy().await, 0);
    assert!(manager.is_scanning().await);
    assert!(transport.writes().await.is_empty(), "failed attempt must not alarm");

    // The same tag can be admitted again on its next advertisement.
    manager.dispatch(discovered(TAG_A, -40)).await.unwrap();
    assert_eq!(transport.connect_requests().await.len(), 2);
}

#[tokio::test]
async fn weak_signal_never_starts_an_attempt() {
    let transport = Arc::new(MockTransport::new());
    let manager = started_manager(transport.clone()).await;

    // Default threshold is -50 dBm; -51 is out of range, -50 is not.
    manager.dispatch(discovered(TAG_A, -51)).await.unwrap();
    assert!(transport.connect_requests().await.is_empty());
    assert!(manager.is_scanning().await);

    manager.dispatch(discovered(TAG_A, -50)).await.unwrap();
    assert_eq!(transport.connect_requests().await.len(), 1);
}

#[tokio::test]
async fn discoveries_during_inflight_attempt_are_dropped() {
    let transport = Arc::new(MockTransport::new());
    let manager = started_manager(transport.clone()).await;

    manager.dispatch(discovered(TAG_A, -40)).await.unwrap();
    // The attempt toward TAG_A is pending; stronger candidates are ignored.
    manager.dispatch(discovered(TAG_B, -20)).await.unwrap();
    manager.dispatch(discovered(TAG_C, -20)).await.unwrap();

    assert_eq!(
        transport.connect_requests().await,
        vec![PeerAddress::new(TAG_A)]
    );

    manager.dispatch(connected(1)).await.unwrap();
    assert_eq!(manager.occupancy().await, 1);
    assert!(manager.is_scanning().await);
}

#[tokio::test]
async fn discoveries_at_full_pool_are_dropped() {
    let transport = Arc::new(MockTransport::new());
    let manager = started_manager(transport.clone()).await;
    establish(&manager, TAG_A, 1).await;
    establish(&manager, TAG_B, 2).await;
    establish(&manager, TAG_C, 3).await;

    // A late report that trailed the scan stop.
    manager.dispatch(discovered(TAG_D, -20)).await.unwrap();

    assert_eq!(manager.occupancy().await, 3);
    assert_eq!(transport.connect_requests().await.len(), 3);
}

#[tokio::test]
async fn freed_slot_is_reused_by_next_tag() {
    let transport = Arc::new(MockTransport::new());
    let manager = started_manager(transport.clone()).await;
    establish(&manager, TAG_A, 1).await;
    establish(&manager, TAG_B, 2).await;
    establish(&manager, TAG_C, 3).await;

    manager.dispatch(lost(1)).await.unwrap();
    assert_eq!(manager.occupancy().await, 2);

    establish(&manager, TAG_D, 4).await;
    assert_eq!(manager.occupancy().await, 3);
    assert!(!manager.is_scanning().await);
}

#[tokio::test]
async fn requested_disconnects_do_not_alarm() {
    let transport = Arc::new(MockTransport::new());
    let manager = started_manager(transport.clone()).await;
    establish(&manager, TAG_A, 1).await;
    establish(&manager, TAG_B, 2).await;

    manager.shutdown().await.unwrap();
    assert_eq!(
        transport.disconnect_requests().await,
        vec![ConnHandle(1), ConnHandle(2)]
    );
    assert!(!manager.is_scanning().await);

    // Completions release slots silently.
    manager
        .dispatch(TransportEvent::Disconnected {
            handle: ConnHandle(1),
            reason: DisconnectReason::LocalTerminated,
        })
        .await
        .unwrap();
    manager
        .dispatch(TransportEvent::Disconnected {
            handle: ConnHandle(2),
            reason: DisconnectReason::LocalTerminated,
        })
        .await
        .unwrap();

    assert_eq!(manager.occupancy().await, 0);
    assert!(transport.writes().await.is_empty());
}

#[tokio::test]
async fn scan_start_failure_recovers_on_next_event() {
    let transport = Arc::new(MockTransport::new());
    let manager = started_manager(transport.clone()).await;
    establish(&manager, TAG_A, 1).await;
    establish(&manager, TAG_B, 2).await;
    establish(&manager, TAG_C, 3).await;
    assert!(!manager.is_scanning().await);

    // The restart after a loss is refused once.
    transport.fail_start_discovery(true);
    manager.dispatch(lost(1)).await.unwrap();
    assert!(!manager.is_scanning().await);
    assert_eq!(manager.occupancy().await, 2, "loss handling still completed");

    // The next occupancy change retries the start and succeeds.
    transport.fail_start_discovery(false);
    manager.dispatch(lost(2)).await.unwrap();
    assert!(manager.is_scanning().await);
}

#[tokio::test]
async fn event_stream_reports_link_lifecycle() {
    let transport = Arc::new(MockTransport::new());
    let manager = started_manager(transport).await;
    let mut events = manager.subscribe();

    establish(&manager, TAG_A, 1).await;
    manager.dispatch(lost(1)).await.unwrap();

    let mut saw_connected = false;
    let mut saw_lost = false;
    while let Ok(event) = events.try_recv() {
        match event {
            LinkEvent::Connected { handle, occupancy, .. } => {
                assert_eq!(handle, ConnHandle(1));
                assert_eq!(occupancy, 1);
                saw_connected = true;
            }
            LinkEvent::LinkLost { handle, reason, occupancy, .. } => {
                assert_eq!(handle, ConnHandle(1));
                assert_eq!(reason, DisconnectReason::SupervisionTimeout);
                assert_eq!(occupancy, 0);
                saw_lost = true;
            }
            _ => {}
        }
    }
    assert!(saw_connected);
    assert!(saw_lost);
}
