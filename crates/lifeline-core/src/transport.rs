//! Transport adapter seam.
//!
//! Everything radio-related lives behind the [`Transport`] trait: scanning,
//! connection establishment, attribute writes. The manager core only ever
//! issues requests through it and consumes [`TransportEvent`]s it produces.
//!
//! The adapter contract the core depends on:
//!
//! - events for one link arrive in order (discovered, connect result,
//!   disconnected) and are never duplicated for the same logical attempt;
//! - no two events are delivered concurrently; the adapter serializes its
//!   own callbacks;
//! - `request_connect` and `write_attribute` are asynchronous requests:
//!   success of the call means the request was issued, not that it
//!   completed remotely.

use async_trait::async_trait;
use uuid::Uuid;

use lifeline_types::{AdvertisementKind, ConnHandle, ConnectOutcome, DisconnectReason, PeerAddress};

use crate::error::Result;

/// Abstraction over the wireless transport.
///
/// Implemented by [`crate::BtleTransport`] for real hardware and by
/// [`crate::MockTransport`] for tests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start passive discovery of advertising peers.
    async fn start_discovery(&self) -> Result<()>;

    /// Stop discovery.
    async fn stop_discovery(&self) -> Result<()>;

    /// Issue a connect request toward `address`.
    ///
    /// The outcome arrives later as [`TransportEvent::ConnectResult`].
    async fn request_connect(&self, address: &PeerAddress) -> Result<()>;

    /// Request termination of an established link.
    ///
    /// Completion arrives later as [`TransportEvent::Disconnected`].
    async fn request_disconnect(&self, handle: ConnHandle) -> Result<()>;

    /// Write `value` to a remote GATT attribute, without response.
    ///
    /// Fire and forget: the core never awaits remote acknowledgment.
    async fn write_attribute(&self, handle: ConnHandle, attribute: Uuid, value: &[u8])
        -> Result<()>;
}

/// Events delivered by the transport, dispatched into
/// [`crate::LinkManager::dispatch`] one at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// An advertising peer was seen.
    Discovered {
        /// Advertiser address.
        address: PeerAddress,
        /// Received signal strength in dBm.
        rssi: i16,
        /// Kind of advertisement.
        kind: AdvertisementKind,
    },
    /// The in-flight connect attempt resolved.
    ConnectResult {
        /// Handle assigned to the link (meaningful only on success).
        handle: ConnHandle,
        /// Success or the transport's failure reason.
        outcome: ConnectOutcome,
    },
    /// An established link terminated.
    Disconnected {
        /// The link that went down.
        handle: ConnHandle,
        /// Why, as far as the transport knows.
        reason: DisconnectReason,
    },
}
