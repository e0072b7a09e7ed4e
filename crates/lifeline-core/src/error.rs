//! Error types for lifeline-core.
//!
//! # Recovery semantics
//!
//! No error in this crate is fatal to the process. Every error path lands
//! the manager back in a well-defined state: occupancy within capacity,
//! at most one attempt in flight, discovery either running or due to be
//! re-armed by the next occupancy change.
//!
//! | Error | Effect | Recovery |
//! |-------|--------|----------|
//! | [`Error::AlreadyConnecting`] | Candidate dropped | Rediscovered on a later scan report |
//! | [`Error::InvalidTransition`] | Offending event discarded | None needed; state is unchanged |
//! | [`Error::ScanControlFailed`] | Desired scan state not reached | Next occupancy change retries it |
//! | [`Error::Adapter`] / [`Error::Bluetooth`] | Operation failed at the transport | Caller-dependent; connect failures resume discovery |
//! | [`Error::UnknownLink`] | Event for a link not in the pool | Discarded |

use lifeline_types::{ConnHandle, LinkState, PeerAddress};
use thiserror::Error;

/// Errors that can occur while managing links.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error from the btleplug backend.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Generic transport adapter failure.
    #[error("adapter error: {message}")]
    Adapter {
        /// Description of the failure.
        message: String,
    },

    /// A connection attempt was requested while another is in flight.
    ///
    /// The new candidate is simply dropped; it may be rediscovered once
    /// the in-flight attempt resolves.
    #[error("connection attempt already in flight, dropping candidate {candidate}")]
    AlreadyConnecting {
        /// The candidate that was dropped.
        candidate: PeerAddress,
    },

    /// A pool operation was invoked against a link not in the required state.
    ///
    /// This is a programming-contract violation: the offending event is
    /// logged and discarded without further state mutation.
    #[error("invalid transition for {handle}: {from} -> {to}")]
    InvalidTransition {
        /// The link the operation targeted.
        handle: ConnHandle,
        /// The state the link was actually in.
        from: LinkState,
        /// The state the operation required or produced.
        to: LinkState,
    },

    /// The transport refused to start or stop discovery.
    ///
    /// Non-fatal: the controller abandons the transition and the next
    /// occupancy-changing event retries the desired scan state.
    #[error("scan control failed ({action} discovery): {reason}")]
    ScanControlFailed {
        /// What the controller was trying to do ("start" or "stop").
        action: &'static str,
        /// The underlying transport failure.
        reason: String,
    },

    /// An event referenced a connection handle the pool does not track.
    #[error("no link for {0}")]
    UnknownLink(ConnHandle),

    /// Invalid configuration provided.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a generic adapter error.
    pub fn adapter(message: impl Into<String>) -> Self {
        Self::Adapter {
            message: message.into(),
        }
    }

    /// Create an invalid-transition error.
    pub fn invalid_transition(handle: ConnHandle, from: LinkState, to: LinkState) -> Self {
        Self::InvalidTransition { handle, from, to }
    }

    /// Create a scan-control error from an underlying transport failure.
    pub fn scan_control(action: &'static str, source: &Error) -> Self {
        Self::ScanControlFailed {
            action,
            reason: source.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias using lifeline-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
