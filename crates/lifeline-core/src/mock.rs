//! Mock transport implementation for testing.
//!
//! This module provides a scripted transport that can be used for unit
//! testing without radio hardware. Every control call is recorded, and
//! individual operations can be made to fail.
//!
//! The mock produces no events by itself: tests deliver
//! [`crate::TransportEvent`]s to the manager directly, which also keeps
//! the "one event at a time" adapter contract trivially true.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use lifeline_types::{ConnHandle, PeerAddress};

use crate::error::{Error, Result};
use crate::transport::Transport;

/// One recorded `write_attribute` request.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeWrite {
    /// Target link.
    pub handle: ConnHandle,
    /// Target attribute.
    pub attribute: Uuid,
    /// Written value.
    pub value: Vec<u8>,
}

/// A scripted [`Transport`] for tests.
///
/// # Example
///
/// ```
/// use lifeline_core::{MockTransport, Transport};
/// use lifeline_types::PeerAddress;
///
/// #[tokio::main]
/// async fn main() {
///     let transport = MockTransport::new();
///     transport.start_discovery().await.unwrap();
///     assert!(transport.is_scanning());
///
///     transport.request_connect(&PeerAddress::new("P1")).await.unwrap();
///     assert_eq!(transport.connect_requests().await.len(), 1);
/// }
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    scanning: AtomicBool,
    start_calls: AtomicU32,
    stop_calls: AtomicU32,
    connect_requests: RwLock<Vec<PeerAddress>>,
    disconnect_requests: RwLock<Vec<ConnHandle>>,
    writes: RwLock<Vec<AttributeWrite>>,
    fail_start: AtomicBool,
    fail_stop: AtomicBool,
    fail_connect: AtomicBool,
    fail_disconnect: AtomicBool,
    fail_writes_to: RwLock<HashSet<ConnHandle>>,
}

impl MockTransport {
    /// Create a mock with everything succeeding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether discovery is currently running.
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Relaxed)
    }

    /// Number of `start_discovery` invocations (including failed ones).
    pub fn start_discovery_calls(&self) -> u32 {
        self.start_calls.load(Ordering::Relaxed)
    }

    /// Number of `stop_discovery` invocations (including failed ones).
    pub fn stop_discovery_calls(&self) -> u32 {
        self.stop_calls.load(Ordering::Relaxed)
    }

    /// Addresses passed to `request_connect`, in order.
    pub async fn connect_requests(&self) -> Vec<PeerAddress> {
        self.connect_requests.read().await.clone()
    }

    /// Handles passed to `request_disconnect`, in order.
    pub async fn disconnect_requests(&self) -> Vec<ConnHandle> {
        self.disconnect_requests.read().await.clone()
    }

    /// Every attribute write attempted, in order, including failed ones.
    pub async fn writes(&self) -> Vec<AttributeWrite> {
        self.writes.read().await.clone()
    }

    /// Make `start_discovery` fail (or succeed again).
    pub fn fail_start_discovery(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::Relaxed);
    }

    /// Make `stop_discovery` fail (or succeed again).
    pub fn fail_stop_discovery(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::Relaxed);
    }

    /// Make `request_connect` fail synchronously (or succeed again).
    pub fn fail_request_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::Relaxed);
    }

    /// Make `request_disconnect` fail (or succeed again).
    pub fn fail_request_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::Relaxed);
    }

    /// Make attribute writes to one specific link fail.
    pub async fn fail_writes_to(&self, handle: ConnHandle) {
        self.fail_writes_to.write().await.insert(handle);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn start_discovery(&self) -> Result<()> {
        self.start_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_start.load(Ordering::Relaxed) {
            return Err(Error::adapter("injected start_discovery failure"));
        }
        self.scanning.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn stop_discovery(&self) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_stop.load(Ordering::Relaxed) {
            return Err(Error::adapter("injected stop_discovery failure"));
        }
        self.scanning.store(false, Ordering::Relaxed);
        Ok(())
    }

    async fn request_connect(&self, address: &PeerAddress) -> Result<()> {
        self.connect_requests.write().await.push(address.clone());
        if self.fail_connect.load(Ordering::Relaxed) {
            return Err(Error::adapter("injected request_connect failure"));
        }
        Ok(())
    }

    async fn request_disconnect(&self, handle: ConnHandle) -> Result<()> {
        self.disconnect_requests.write().await.push(handle);
        if self.fail_disconnect.load(Ordering::Relaxed) {
            return Err(Error::adapter("injected request_disconnect failure"));
        }
        Ok(())
    }

    async fn write_attribute(
        &self,
        handle: ConnHandle,
        attribute: Uuid,
        value: &[u8],
    ) -> Result<()> {
        self.writes.write().await.push(AttributeWrite {
            handle,
            attribute,
            value: value.to_vec(),
        });
        if self.fail_writes_to.read().await.contains(&handle) {
            return Err(Error::adapter("injected write_attribute failure"));
        }
        Ok(())
    }
}
