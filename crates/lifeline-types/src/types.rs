//! Core types for the Lifeline link manager.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Remote peer address, used for logging and for correlating a discovery
/// report with the connect request it produced.
///
/// Once a link is established, its identity of record is the transport's
/// [`ConnHandle`], not the address: some platforms report randomized or
/// zeroed addresses, so the address is diagnostic only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeerAddress(String);

impl PeerAddress {
    /// Create an address from any string-like identifier.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Opaque transport-assigned connection handle.
///
/// Stable for the lifetime of one link; the transport guarantees it is
/// never reused while the link is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConnHandle(pub u32);

impl fmt::Display for ConnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Kind of advertisement that produced a discovery report.
///
/// Raw values follow the GAP advertising report event types.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new kinds
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub enum AdvertisementKind {
    /// ADV_IND: connectable, undirected.
    ConnectableUndirected,
    /// ADV_DIRECT_IND: connectable, directed at this central.
    ConnectableDirected,
    /// ADV_SCAN_IND: scannable but not connectable.
    ScannableUndirected,
    /// ADV_NONCONN_IND: neither scannable nor connectable.
    NonConnectable,
    /// SCAN_RSP: a scan response, not an advertisement proper.
    ScanResponse,
    /// Extended advertising, connectable.
    ExtendedConnectable,
}

impl AdvertisementKind {
    /// Decode a raw GAP advertising event type byte.
    ///
    /// # Examples
    ///
    /// ```
    /// use lifeline_types::AdvertisementKind;
    ///
    /// assert_eq!(
    ///     AdvertisementKind::from_raw(0x00).unwrap(),
    ///     AdvertisementKind::ConnectableUndirected
    /// );
    /// assert!(AdvertisementKind::from_raw(0x7F).is_err());
    /// ```
    pub fn from_raw(raw: u8) -> Result<Self, ParseError> {
        match raw {
            0x00 => Ok(Self::ConnectableUndirected),
            0x01 => Ok(Self::ConnectableDirected),
            0x02 => Ok(Self::ScannableUndirected),
            0x03 => Ok(Self::NonConnectable),
            0x04 => Ok(Self::ScanResponse),
            0x05 => Ok(Self::ExtendedConnectable),
            other => Err(ParseError::UnknownAdvertisementKind(other)),
        }
    }

    /// Whether a connection can be initiated toward this advertiser.
    #[must_use]
    pub fn is_connectable(self) -> bool {
        matches!(
            self,
            Self::ConnectableUndirected | Self::ConnectableDirected | Self::ExtendedConnectable
        )
    }
}

/// Outcome of a connection attempt, delivered by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConnectOutcome {
    /// The link is established.
    Success,
    /// The attempt failed; the payload is the transport's raw reason code.
    Failed(u8),
}

impl ConnectOutcome {
    /// Decode a raw status byte (zero means success).
    #[must_use]
    pub fn from_raw(raw: u8) -> Self {
        if raw == 0 {
            Self::Success
        } else {
            Self::Failed(raw)
        }
    }

    /// Whether the attempt succeeded.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Reason a link terminated, as reported by the transport.
///
/// The common HCI reason codes are decoded; everything else is kept raw.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub enum DisconnectReason {
    /// The peer terminated the connection (HCI 0x13).
    RemoteTerminated,
    /// The link supervision timeout expired, e.g. the peer went out of
    /// range or into the water (HCI 0x08).
    SupervisionTimeout,
    /// This host terminated the connection (HCI 0x16).
    LocalTerminated,
    /// The transport did not report a reason.
    Unknown,
    /// Any other raw HCI reason code.
    Other(u8),
}

impl DisconnectReason {
    /// Decode a raw HCI reason byte.
    #[must_use]
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x08 => Self::SupervisionTimeout,
            0x13 => Self::RemoteTerminated,
            0x16 => Self::LocalTerminated,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteTerminated => write!(f, "remote terminated"),
            Self::SupervisionTimeout => write!(f, "supervision timeout"),
            Self::LocalTerminated => write!(f, "local terminated"),
            Self::Unknown => write!(f, "unknown"),
            Self::Other(code) => write!(f, "reason 0x{code:02X}"),
        }
    }
}

/// Lifecycle state of one link.
///
/// ```text
/// Discovered -> Connecting -> Connected -> Disconnecting -> Released
///                   |                \___________________/^
///                   \__________________________________/
/// ```
///
/// `Connecting -> Released` is the failed-attempt edge; `Connected ->
/// Released` is a spontaneous remote disconnect. `Disconnecting` is only
/// entered when this side initiates the termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LinkState {
    /// Seen in a discovery report; not yet admitted.
    Discovered,
    /// A connect request is in flight.
    Connecting,
    /// The link is established and counted against pool capacity.
    Connected,
    /// This side requested termination; awaiting the disconnect event.
    Disconnecting,
    /// Terminal: the slot has been given back.
    Released,
}

impl LinkState {
    /// Whether the state machine permits a transition to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: LinkState) -> bool {
        matches!(
            (self, next),
            (Self::Discovered, Self::Connecting)
                | (Self::Connecting, Self::Connected)
                | (Self::Connecting, Self::Released)
                | (Self::Connected, Self::Disconnecting)
                | (Self::Connected, Self::Released)
                | (Self::Disconnecting, Self::Released)
        )
    }

    /// Whether this is the terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Released)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Discovered => "discovered",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Released => "released",
        };
        f.write_str(s)
    }
}
