//! Manager event system for link and alarm notifications.
//!
//! This module provides an event-based system for observing the link
//! manager: discoveries, connections, losses, alarm broadcasts, and scan
//! state changes. All events are serializable for logging and IPC.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use lifeline_types::{ConnHandle, DisconnectReason, PeerAddress};

/// Events emitted by [`crate::LinkManager`].
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum LinkEvent {
    /// An admissible peer was discovered.
    Discovered {
        /// Advertiser address.
        address: PeerAddress,
        /// Signal strength in dBm.
        rssi: i16,
    },
    /// A connect attempt toward a candidate was started.
    ConnectStarted {
        /// The candidate.
        address: PeerAddress,
    },
    /// A link was established and counted against capacity.
    Connected {
        /// Assigned handle.
        handle: ConnHandle,
        /// Remote address.
        address: PeerAddress,
        /// Pool occupancy after the promotion.
        occupancy: usize,
    },
    /// The in-flight connect attempt failed.
    ConnectFailed {
        /// The candidate that could not be reached.
        address: PeerAddress,
        /// Raw transport reason code.
        reason: u8,
    },
    /// A link was lost spontaneously, the safety-relevant case.
    LinkLost {
        /// The lost link.
        handle: ConnHandle,
        /// Its remote address.
        address: PeerAddress,
        /// Reported disconnect reason.
        reason: DisconnectReason,
        /// Pool occupancy after the release.
        occupancy: usize,
    },
    /// A manager-initiated disconnect completed; no alarm was raised.
    LinkClosed {
        /// The closed link.
        handle: ConnHandle,
        /// Its remote address.
        address: PeerAddress,
    },
    /// An alarm broadcast round finished.
    AlarmBroadcast {
        /// The link whose loss triggered the broadcast.
        lost: ConnHandle,
        /// Number of links whose alarm write was issued.
        notified: usize,
        /// Number of links whose alarm write failed.
        failed: usize,
    },
    /// Discovery was started or stopped.
    ScanChanged {
        /// Whether discovery is now active.
        active: bool,
    },
}

/// Sender for link events.
pub type EventSender = broadcast::Sender<LinkEvent>;

/// Receiver for link events.
pub type EventReceiver = broadcast::Receiver<LinkEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: LinkEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}
