//! Alarm broadcaster.
//!
//! On any spontaneous link loss, every remaining connected tag gets the
//! alarm command written to its well-known attribute. The writes are
//! best-effort and independent: one failed write must not stop the rest,
//! and nothing is awaited beyond issuing the request. Each tag also raises
//! a local disconnect-triggered alarm on its own, so a lost broadcast is
//! degraded coverage, not silence.

use tracing::{debug, warn};
use uuid::Uuid;

use lifeline_types::ConnHandle;

use crate::pool::ConnectionPool;
use crate::transport::Transport;

/// Result of one broadcast round.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    /// Links whose write request was issued successfully.
    pub notified: Vec<ConnHandle>,
    /// Links whose write request failed, with the failure message.
    pub failed: Vec<(ConnHandle, String)>,
}

impl BroadcastReport {
    /// Total number of write attempts made.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.notified.len() + self.failed.len()
    }

    /// Whether every attempted write was issued.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Writes the alarm command to every remaining link on loss of one.
#[derive(Debug, Clone)]
pub struct AlarmBroadcaster {
    attribute: Uuid,
    command: [u8; 1],
}

impl AlarmBroadcaster {
    /// Create a broadcaster targeting `attribute` with the given command byte.
    pub fn new(attribute: Uuid, command: u8) -> Self {
        Self {
            attribute,
            command: [command],
        }
    }

    /// Notify every link still `Connected`, except the lost one.
    ///
    /// Must be called while `lost` is still recorded in the pool, before
    /// its slot is released: the enumeration below is what guarantees the
    /// neighbors are still visible, and the explicit exclusion is what
    /// keeps the dead link out of the write loop.
    pub async fn broadcast(
        &self,
        transport: &dyn Transport,
        pool: &ConnectionPool,
        lost: ConnHandle,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for handle in pool.connected_handles() {
            if handle == lost {
                continue;
            }
            match transport
                .write_attribute(handle, self.attribute, &self.command)
                .await
            {
                Ok(()) => {
                    debug!(link = %handle, "alarm write issued");
                    report.notified.push(handle);
                }
                Err(e) => {
                    // Keep going: the remaining tags still need the signal.
                    warn!(link = %handle, error = %e, "alarm write failed");
                    report.failed.push((handle, e.to_string()));
                }
            }
        }

        warn!(
            lost = %lost,
            notified = report.notified.len(),
            failed = report.failed.len(),
            "alarm broadcast complete"
        );
        report
    }
}
