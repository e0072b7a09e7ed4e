//! Scan controller.
//!
//! Decides when discovery runs. The rule: discovery is active exactly when
//! the pool has a free slot and no connect attempt is in flight. The
//! transport cannot scan and connect at the same time, so the controller is
//! also asked to suspend scanning right before a connect request is issued.
//!
//! Failure semantics: a refused start/stop leaves the recorded state at
//! what the transport actually has and surfaces
//! [`Error::ScanControlFailed`]. There is no retry loop; the next
//! occupancy-changing event re-evaluates and issues the control call again,
//! so a single missed call is self-healing.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::transport::Transport;

/// Whether discovery is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Discovery stopped.
    Idle,
    /// Discovery running.
    Scanning,
}

/// State machine over the discovery session.
#[derive(Debug)]
pub struct ScanController {
    state: ScanState,
}

impl ScanController {
    /// Create a controller; discovery starts out stopped.
    pub fn new() -> Self {
        Self {
            state: ScanState::Idle,
        }
    }

    /// Whether discovery is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == ScanState::Scanning
    }

    /// Drive the transport toward the desired scan state.
    ///
    /// Desired state is `Scanning` iff `occupancy < capacity` and no
    /// attempt is in flight. Returns the (possibly unchanged) state.
    pub async fn reevaluate(
        &mut self,
        transport: &dyn Transport,
        occupancy: usize,
        capacity: usize,
        attempt_in_flight: bool,
    ) -> Result<ScanState> {
        let want_scanning = occupancy < capacity && !attempt_in_flight;

        match (self.state, want_scanning) {
            (ScanState::Idle, true) => {
                transport
                    .start_discovery()
                    .await
                    .map_err(|e| Error::scan_control("start", &e))?;
                info!(occupancy, capacity, "discovery started");
                self.state = ScanState::Scanning;
            }
            (ScanState::Scanning, false) => {
                transport
                    .stop_discovery()
                    .await
                    .map_err(|e| Error::scan_control("stop", &e))?;
                info!(occupancy, capacity, "discovery stopped");
                self.state = ScanState::Idle;
            }
            _ => {
                debug!(occupancy, attempt_in_flight, active = self.is_active(), "scan state unchanged");
            }
        }
        Ok(self.state)
    }

    /// Stop discovery ahead of a connect request (or for shutdown).
    ///
    /// No-op when already idle. On failure the controller still considers
    /// itself scanning, because the transport is.
    pub async fn suspend(&mut self, transport: &dyn Transport) -> Result<()> {
        if self.state == ScanState::Idle {
            return Ok(());
        }
        transport
            .stop_discovery()
            .await
            .map_err(|e| Error::scan_control("stop", &e))?;
        debug!("discovery suspended");
        self.state = ScanState::Idle;
        Ok(())
    }
}

impl Default for ScanController {
    fn default() -> Self {
        Self::new()
    }
}
