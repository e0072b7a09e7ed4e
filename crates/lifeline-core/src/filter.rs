//! Proximity admission filter.
//!
//! Pure decision rule applied to every discovery report before the pool is
//! consulted: only connectable advertisements from peers in close physical
//! proximity are admitted. Enrollment happens at arm's length on deck, so a
//! weak signal means a bystander device, not a crew tag.

use lifeline_types::AdvertisementKind;

/// Signal-strength and advertisement-kind admission rule.
#[derive(Debug, Clone, Copy)]
pub struct ProximityFilter {
    threshold_dbm: i16,
}

impl ProximityFilter {
    /// Create a filter with the given signal-strength lower bound in dBm.
    pub fn new(threshold_dbm: i16) -> Self {
        Self { threshold_dbm }
    }

    /// The configured lower bound in dBm.
    #[must_use]
    pub fn threshold_dbm(&self) -> i16 {
        self.threshold_dbm
    }

    /// Decide whether a discovered peer is admissible.
    ///
    /// Side-effect free and infallible.
    #[must_use]
    pub fn admit(&self, kind: AdvertisementKind, rssi_dbm: i16) -> bool {
        kind.is_connectable() && rssi_dbm >= self.threshold_dbm
    }
}
