//! Core link management for Lifeline man-overboard tags.
//!
//! This crate implements the central node of a Lifeline installation: it
//! discovers wearable tags over Bluetooth Low Energy, keeps a bounded pool
//! of simultaneous links to the nearest ones, and broadcasts an alarm to
//! every remaining tag the moment any link drops unexpectedly.
//!
//! # Architecture
//!
//! - [`LinkManager`] owns all state and consumes [`TransportEvent`]s one at
//!   a time.
//! - [`Transport`] is the radio seam: [`BtleTransport`] drives a real
//!   adapter via btleplug, [`MockTransport`] replaces it in tests.
//! - [`ProximityFilter`] admits only connectable advertisers at or above a
//!   signal-strength threshold.
//! - [`ConnectionPool`] enforces the capacity bound and the
//!   one-attempt-at-a-time rule.
//! - [`ScanController`] keeps discovery running exactly while a slot is
//!   free and no attempt is in flight.
//! - [`AlarmBroadcaster`] performs the best-effort alarm write round.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use lifeline_core::{BtleTransport, LinkManager, ManagerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(BtleTransport::new().await?);
//!     let manager = LinkManager::new(transport.clone(), ManagerConfig::default())?;
//!
//!     let mut events = manager.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{event:?}");
//!         }
//!     });
//!
//!     manager.start().await?;
//!     transport
//!         .run_event_pump(&manager, CancellationToken::new())
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod alarm;
pub mod btle;
pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod manager;
pub mod mock;
pub mod pool;
pub mod scan;
pub mod transport;

pub use alarm::{AlarmBroadcaster, BroadcastReport};
pub use btle::BtleTransport;
pub use config::ManagerConfig;
pub use error::{Error, Result};
pub use events::{EventDispatcher, EventReceiver, LinkEvent};
pub use filter::ProximityFilter;
pub use manager::LinkManager;
pub use mock::MockTransport;
pub use pool::{ConnectionPool, Link};
pub use scan::{ScanController, ScanState};
pub use transport::{Transport, TransportEvent};

// Re-export the shared vocabulary so downstream crates need only one import.
pub use lifeline_types::{
    AdvertisementKind, ConnHandle, ConnectOutcome, DisconnectReason, LinkState, PeerAddress,
};
