//! Bluetooth LE transport backed by btleplug.
//!
//! Implements [`Transport`] on top of a platform adapter and feeds the
//! resulting [`TransportEvent`]s through [`run_event_pump`]. Connect
//! outcomes are synthesized: btleplug resolves `connect()` as a future
//! rather than an event, so the request spawns a task whose result is
//! injected into the same event stream the adapter produces. That keeps
//! the manager's one-event-at-a-time contract intact.
//!
//! [`run_event_pump`]: BtleTransport::run_event_pump

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use lifeline_types::{
    AdvertisementKind, ConnHandle, ConnectOutcome, DisconnectReason, PeerAddress,
};

use crate::error::{Error, Result};
use crate::manager::LinkManager;
use crate::transport::{Transport, TransportEvent};

/// Reason reported when a connect attempt fails locally. Matches the HCI
/// "connection failed to be established" code so logs read uniformly.
const CONNECT_FAILED_TO_ESTABLISH: u8 = 0x3e;

/// Delivery phase of one tracked link.
///
/// A handle is `Pending` from `request_connect` until its `ConnectResult`
/// has gone through the pump; only an `Established` handle may surface a
/// `Disconnected` event. This is what upholds the per-link ordering the
/// manager relies on: the adapter's `DeviceDisconnected` can race the
/// synthesized connect result, and reporting it first would leak the slot
/// the later promotion claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkPhase {
    /// Connect requested; the result has not been delivered yet.
    Pending,
    /// The peripheral dropped while pending; the disconnect is replayed
    /// right after the success result, or absorbed by a failure result.
    PendingDropped,
    /// The success result was delivered; disconnects are reportable.
    Established,
}

#[derive(Debug)]
struct LinkEntry<Id> {
    id: Id,
    phase: LinkPhase,
}

/// Handle-to-peripheral map with per-link delivery phase.
///
/// Generic over the peripheral id so the ordering rules can be exercised
/// without a live adapter; the transport instantiates it with
/// [`PeripheralId`].
#[derive(Debug)]
struct HandleTable<Id = PeripheralId> {
    next: u32,
    by_handle: HashMap<ConnHandle, LinkEntry<Id>>,
    by_peripheral: HashMap<Id, ConnHandle>,
}

impl<Id> Default for HandleTable<Id> {
    fn default() -> Self {
        Self {
            next: 0,
            by_handle: HashMap::new(),
            by_peripheral: HashMap::new(),
        }
    }
}

impl<Id: Clone + Eq + std::hash::Hash> HandleTable<Id> {
    fn allocate(&mut self, id: Id) -> ConnHandle {
        self.next += 1;
        let handle = ConnHandle(self.next);
        self.by_handle.insert(
            handle,
            LinkEntry {
                id: id.clone(),
                phase: LinkPhase::Pending,
            },
        );
        self.by_peripheral.insert(id, handle);
        handle
    }

    fn remove(&mut self, handle: ConnHandle) -> Option<Id> {
        let entry = self.by_handle.remove(&handle)?;
        self.by_peripheral.remove(&entry.id);
        Some(entry.id)
    }

    fn peripheral_id(&self, handle: ConnHandle) -> Option<&Id> {
        self.by_handle.get(&handle).map(|entry| &entry.id)
    }

    fn handle_for(&self, id: &Id) -> Option<ConnHandle> {
        self.by_peripheral.get(id).copied()
    }

    /// Mark a pending handle established. Returns whether the peripheral
    /// already dropped, in which case the caller owes the manager a
    /// `Disconnected` event.
    fn mark_established(&mut self, handle: ConnHandle) -> bool {
        let Some(entry) = self.by_handle.get_mut(&handle) else {
            return false;
        };
        let dropped_early = entry.phase == LinkPhase::PendingDropped;
        entry.phase = LinkPhase::Established;
        dropped_early
    }

    /// Record a `DeviceDisconnected` for `id`.
    ///
    /// Established handles are removed and returned for reporting. For a
    /// pending handle the drop is remembered and `None` is returned: its
    /// connect result is still owed, and it must come first.
    fn device_disconnected(&mut self, id: &Id) -> Option<ConnHandle> {
        let handle = self.handle_for(id)?;
        let entry = self.by_handle.get_mut(&handle)?;
        match entry.phase {
            LinkPhase::Established => {
                self.remove(handle);
                Some(handle)
            }
            LinkPhase::Pending | LinkPhase::PendingDropped => {
                entry.phase = LinkPhase::PendingDropped;
                None
            }
        }
    }
}

/// [`Transport`] implementation over a real Bluetooth adapter.
pub struct BtleTransport {
    adapter: Adapter,
    links: Arc<Mutex<HandleTable>>,
    tx: mpsc::UnboundedSender<TransportEvent>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
}

impl BtleTransport {
    /// Create a transport over the first available Bluetooth adapter.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::adapter("no Bluetooth adapter found"))?;
        Ok(Self::with_adapter(adapter))
    }

    /// Create a transport over a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            adapter,
            links: Arc::new(Mutex::new(HandleTable::default())),
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Drive adapter events into the manager until `cancel` fires.
    ///
    /// Must be called at most once per transport; the synthesized-event
    /// receiver is consumed by the first call.
    pub async fn run_event_pump(
        &self,
        manager: &LinkManager,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut synthesized = self
            .rx
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::adapter("event pump already running"))?;
        let mut central_events = self.adapter.events().await?;

        info!("event pump running");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("event pump cancelled");
                    break;
                }
                Some(event) = synthesized.recv() => {
                    // A success result establishes the handle; if the
                    // peripheral dropped while the result was in flight,
                    // the disconnect is delivered right after it, never
                    // before.
                    let replay = match &event {
                        TransportEvent::ConnectResult {
                            handle,
                            outcome: ConnectOutcome::Success,
                        } => {
                            let handle = *handle;
                            self.links
                                .lock()
                                .await
                                .mark_established(handle)
                                .then_some(handle)
                        }
                        _ => None,
                    };
                    if let Err(e) = manager.dispatch(event).await {
                        warn!(error = %e, "dropped synthesized transport event");
                    }
                    if let Some(handle) = replay {
                        self.links.lock().await.remove(handle);
                        let event = TransportEvent::Disconnected {
                            handle,
                            reason: DisconnectReason::Unknown,
                        };
                        if let Err(e) = manager.dispatch(event).await {
                            warn!(error = %e, "dropped replayed disconnect");
                        }
                    }
                }
                central = central_events.next() => {
                    let Some(central) = central else {
                        warn!("adapter event stream ended");
                        break;
                    };
                    if let Some(event) = self.translate(central).await {
                        if let Err(e) = manager.dispatch(event).await {
                            warn!(error = %e, "dropped adapter transport event");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Map one adapter event onto the transport vocabulary.
    async fn translate(&self, event: CentralEvent) -> Option<TransportEvent> {
        match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                // Ignore reports for peripherals we already hold a link to.
                if self.links.lock().await.handle_for(&id).is_some() {
                    return None;
                }
                let peripheral = self.adapter.peripheral(&id).await.ok()?;
                let props = peripheral.properties().await.ok()??;
                // A report without signal strength cannot pass the
                // proximity filter; skip it rather than invent a value.
                let rssi = props.rssi?;
                Some(TransportEvent::Discovered {
                    address: PeerAddress::new(props.address.to_string()),
                    rssi,
                    // btleplug does not surface the PDU type; treat every
                    // report as connectable and let connect attempts fail
                    // for peripherals that are not.
                    kind: AdvertisementKind::ConnectableUndirected,
                })
            }
            CentralEvent::DeviceDisconnected(id) => {
                let handle = self.links.lock().await.device_disconnected(&id)?;
                Some(TransportEvent::Disconnected {
                    handle,
                    // The platform APIs do not expose the HCI reason.
                    reason: DisconnectReason::Unknown,
                })
            }
            _ => None,
        }
    }

    async fn find_peripheral(&self, address: &PeerAddress) -> Result<Peripheral> {
        for peripheral in self.adapter.peripherals().await? {
            if peripheral.address().to_string() == address.as_str() {
                return Ok(peripheral);
            }
        }
        Err(Error::adapter(format!(
            "peripheral {address} not in adapter cache"
        )))
    }

    async fn peripheral_for(&self, handle: ConnHandle) -> Result<Peripheral> {
        let id = self
            .links
            .lock()
            .await
            .peripheral_id(handle)
            .cloned()
            .ok_or(Error::UnknownLink(handle))?;
        Ok(self.adapter.peripheral(&id).await?)
    }
}

#[async_trait]
impl Transport for BtleTransport {
    async fn start_discovery(&self) -> Result<()> {
        self.adapter.start_scan(ScanFilter::default()).await?;
        Ok(())
    }

    async fn stop_discovery(&self) -> Result<()> {
        self.adapter.stop_scan().await?;
        Ok(())
    }

    async fn request_connect(&self, address: &PeerAddress) -> Result<()> {
        let peripheral = self.find_peripheral(address).await?;
        let handle = self.links.lock().await.allocate(peripheral.id());
        debug!(%address, link = %handle, "connect requested");

        let tx = self.tx.clone();
        let links = Arc::clone(&self.links);
        let address = address.clone();
        tokio::spawn(async move {
            let result = async {
                peripheral.connect().await?;
                // Attribute writes need the GATT table up front.
                peripheral.discover_services().await?;
                Ok::<(), btleplug::Error>(())
            }
            .await;

            let outcome = match result {
                Ok(()) => ConnectOutcome::Success,
                Err(e) => {
                    warn!(%address, link = %handle, error = %e, "connect attempt failed");
                    links.lock().await.remove(handle);
                    ConnectOutcome::Failed(CONNECT_FAILED_TO_ESTABLISH)
                }
            };
            let _ = tx.send(TransportEvent::ConnectResult { handle, outcome });
        });
        Ok(())
    }

    async fn request_disconnect(&self, handle: ConnHandle) -> Result<()> {
        let peripheral = self.peripheral_for(handle).await?;
        peripheral.disconnect().await?;
        Ok(())
    }

    async fn write_attribute(
        &self,
        handle: ConnHandle,
        attribute: Uuid,
        value: &[u8],
    ) -> Result<()> {
        let peripheral = self.peripheral_for(handle).await?;
        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == attribute)
            .ok_or_else(|| {
                Error::adapter(format!("attribute {attribute} not found on {handle}"))
            })?;
        peripheral
            .write(&characteristic, value, WriteType::WithoutResponse)
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for BtleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleTransport").finish_non_exhaustive()
    }
}
