//! Platform-agnostic types for the Lifeline man-overboard link manager.
//!
//! This crate provides the shared vocabulary between the central-side
//! connection manager (lifeline-core) and anything else that observes or
//! drives it: link identifiers, advertisement and disconnect codes, the
//! per-link state machine, and the well-known alarm attribute UUIDs.
//!
//! # Example
//!
//! ```
//! use lifeline_types::{AdvertisementKind, LinkState};
//!
//! let kind = AdvertisementKind::from_raw(0x00).unwrap();
//! assert!(kind.is_connectable());
//! assert!(LinkState::Connecting.can_transition_to(LinkState::Connected));
//! ```

pub mod error;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use types::{
    AdvertisementKind, ConnHandle, ConnectOutcome, DisconnectReason, LinkState, PeerAddress,
};
pub use uuid as uuids;
