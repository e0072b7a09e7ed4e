//! Link manager.
//!
//! Single owner of the connection pool and the scan controller. Transport
//! events come in through [`LinkManager::dispatch`] one at a time; every
//! handler takes the state lock for its whole duration, so admission checks
//! and pool mutations are atomic with respect to each other.
//!
//! The handlers follow one shape: decide under the lock, issue transport
//! requests, re-evaluate the scan state, emit events. Scan control failures
//! never abort a handler; the recorded scan state stays truthful and the
//! next occupancy change repeats the control call.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, trace, warn};

use lifeline_types::{
    AdvertisementKind, ConnHandle, ConnectOutcome, DisconnectReason, PeerAddress,
};

use crate::alarm::AlarmBroadcaster;
use crate::config::ManagerConfig;
use crate::error::{Error, Result};
use crate::events::{EventDispatcher, EventReceiver, LinkEvent};
use crate::filter::ProximityFilter;
use crate::pool::ConnectionPool;
use crate::scan::ScanController;
use crate::transport::{Transport, TransportEvent};

struct ManagerState {
    pool: ConnectionPool,
    scan: ScanController,
}

/// Maintains up to `capacity` simultaneous links to nearby tags.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use lifeline_core::{LinkManager, ManagerConfig, MockTransport};
///
/// # async fn run() -> lifeline_core::Result<()> {
/// let transport = Arc::new(MockTransport::new());
/// let manager = LinkManager::new(transport, ManagerConfig::default())?;
/// manager.start().await?;
/// # Ok(())
/// # }
/// ```
pub struct LinkManager {
    transport: Arc<dyn Transport>,
    state: Mutex<ManagerState>,
    events: EventDispatcher,
    filter: ProximityFilter,
    broadcaster: AlarmBroadcaster,
    config: ManagerConfig,
}

impl LinkManager {
    /// Create a manager over `transport` with the given configuration.
    pub fn new(transport: Arc<dyn Transport>, config: ManagerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            state: Mutex::new(ManagerState {
                pool: ConnectionPool::new(config.capacity),
                scan: ScanController::new(),
            }),
            events: EventDispatcher::new(config.event_capacity),
            filter: ProximityFilter::new(config.proximity_threshold_dbm),
            broadcaster: AlarmBroadcaster::new(config.alarm_attribute, config.alarm_command),
            config,
        })
    }

    /// The configuration the manager was built with.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Subscribe to [`LinkEvent`]s.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Current number of held slots.
    pub async fn occupancy(&self) -> usize {
        self.state.lock().await.pool.occupancy()
    }

    /// Whether discovery is currently active.
    pub async fn is_scanning(&self) -> bool {
        self.state.lock().await.scan.is_active()
    }

    /// Bring up discovery for the first time.
    ///
    /// The pool starts empty, so this starts scanning unless the adapter
    /// refuses; a refusal is returned so the caller can decide whether to
    /// keep running on the self-healing retry path.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let ManagerState { pool, scan } = &mut *state;
        scan.reevaluate(
            self.transport.as_ref(),
            pool.occupancy(),
            pool.capacity(),
            pool.has_attempt(),
        )
        .await?;
        self.events.send(LinkEvent::ScanChanged {
            active: scan.is_active(),
        });
        info!(capacity = pool.capacity(), "link manager started");
        Ok(())
    }

    /// Feed one transport event through the manager.
    ///
    /// Returns an error only for events that contradict the recorded state
    /// (an unknown handle, an impossible transition); those are safe to log
    /// and drop, the pool is left untouched.
    #[instrument(skip(self), level = "debug")]
    pub async fn dispatch(&self, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::Discovered { address, rssi, kind } => {
                self.on_discovered(address, rssi, kind).await
            }
            TransportEvent::ConnectResult { handle, outcome } => {
                self.on_connect_result(handle, outcome).await
            }
            TransportEvent::Disconnected { handle, reason } => {
                self.on_disconnected(handle, reason).await
            }
        }
    }

    async fn on_discovered(
        &self,
        address: PeerAddress,
        rssi: i16,
        kind: AdvertisementKind,
    ) -> Result<()> {
        if !self.filter.admit(kind, rssi) {
            trace!(%address, rssi, ?kind, "advertiser rejected by proximity filter");
            return Ok(());
        }

        let mut state = self.state.lock().await;
        let ManagerState { pool, scan } = &mut *state;

        // Late reports can trail a stop request; admission is re-checked
        // here rather than trusting that discovery was already off.
        if pool.has_attempt() || pool.is_full() {
            trace!(%address, "admissible advertiser dropped, no free slot or attempt in flight");
            return Ok(());
        }

        self.events.send(LinkEvent::Discovered {
            address: address.clone(),
            rssi,
        });

        // The transport cannot scan and connect at once. If the stop is
        // refused the candidate is dropped; discovery keeps running and the
        // next report retries the whole sequence.
        if let Err(e) = scan.suspend(self.transport.as_ref()).await {
            warn!(%address, error = %e, "could not suspend discovery, dropping candidate");
            return Ok(());
        }

        pool.try_begin_connect(address.clone())?;
        self.events.send(LinkEvent::ConnectStarted {
            address: address.clone(),
        });

        if let Err(e) = self.transport.request_connect(&address).await {
            // Synchronous refusal: the attempt never left this node. Clear
            // the slot and put discovery back.
            warn!(%address, error = %e, "connect request refused");
            let candidate = pool.abort_attempt()?;
            self.events.send(LinkEvent::ConnectFailed {
                address: candidate,
                reason: 0,
            });
            self.resync_scan(pool, scan).await;
        }
        Ok(())
    }

    async fn on_connect_result(&self, handle: ConnHandle, outcome: ConnectOutcome) -> Result<()> {
        let mut state = self.state.lock().await;
        let ManagerState { pool, scan } = &mut *state;

        match outcome {
            ConnectOutcome::Success => {
                let address = match pool.promote_to_connected(handle) {
                    Ok(link) => link.address().clone(),
                    Err(e) => {
                        // Stale or duplicated result; the pool was not touched.
                        warn!(link = %handle, error = %e, "discarding connect result");
                        return Err(e);
                    }
                };
                let occupancy = pool.occupancy();
                info!(link = %handle, %address, occupancy, "link established");
                self.events.send(LinkEvent::Connected {
                    handle,
                    address,
                    occupancy,
                });
            }
            ConnectOutcome::Failed(reason) => {
                let candidate = pool.abort_attempt()?;
                info!(%candidate, reason, "connect attempt failed");
                self.events.send(LinkEvent::ConnectFailed {
                    address: candidate,
                    reason,
                });
            }
        }

        self.resync_scan(pool, scan).await;
        Ok(())
    }

    async fn on_disconnected(&self, handle: ConnHandle, reason: DisconnectReason) -> Result<()> {
        let mut state = self.state.lock().await;
        let ManagerState { pool, scan } = &mut *state;

        let link = pool.get(handle).ok_or_else(|| {
            warn!(link = %handle, %reason, "disconnect for unknown link");
            Error::UnknownLink(handle)
        })?;
        let spontaneous = link.is_connected();

        if spontaneous {
            // Broadcast while the lost link still holds its slot, so the
            // recipient set is exactly its surviving neighbors.
            warn!(link = %handle, address = %link.address(), %reason, "link lost");
            let report = self
                .broadcaster
                .broadcast(self.transport.as_ref(), pool, handle)
                .await;
            self.events.send(LinkEvent::AlarmBroadcast {
                lost: handle,
                notified: report.notified.len(),
                failed: report.failed.len(),
            });
        }

        let released = pool.release(handle)?;
        if spontaneous {
            self.events.send(LinkEvent::LinkLost {
                handle,
                address: released.address().clone(),
                reason,
                occupancy: pool.occupancy(),
            });
        } else {
            debug!(link = %handle, "requested disconnect completed");
            self.events.send(LinkEvent::LinkClosed {
                handle,
                address: released.address().clone(),
            });
        }

        self.resync_scan(pool, scan).await;
        Ok(())
    }

    /// Tear everything down: stop discovery and request disconnection of
    /// every held link. Completions arrive as ordinary `Disconnected`
    /// events and release slots with no alarm.
    pub async fn shutdown(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let ManagerState { pool, scan } = &mut *state;

        if let Err(e) = scan.suspend(self.transport.as_ref()).await {
            warn!(error = %e, "could not stop discovery during shutdown");
        }
        if let Some(candidate) = pool.attempt_address() {
            warn!(%candidate, "shutting down with a connect attempt in flight");
        }

        for handle in pool.connected_handles() {
            pool.begin_disconnect(handle)?;
            if let Err(e) = self.transport.request_disconnect(handle).await {
                warn!(link = %handle, error = %e, "disconnect request failed");
            }
        }
        info!(occupancy = pool.occupancy(), "shutdown initiated");
        Ok(())
    }

    /// Re-derive the desired scan state after an occupancy or attempt
    /// change. Control failures are logged and swallowed; see module docs.
    async fn resync_scan(&self, pool: &ConnectionPool, scan: &mut ScanController) {
        let before = scan.is_active();
        match scan
            .reevaluate(
                self.transport.as_ref(),
                pool.occupancy(),
                pool.capacity(),
                pool.has_attempt(),
            )
            .await
        {
            Ok(state) => {
                let active = state == crate::scan::ScanState::Scanning;
                if active != before {
                    self.events.send(LinkEvent::ScanChanged { active });
                }
            }
            Err(e) => {
                warn!(error = %e, "scan control failed, will retry on next state change");
            }
        }
    }
}

impl std::fmt::Debug for LinkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
