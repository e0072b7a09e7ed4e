//! Runtime configuration for the link manager.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lifeline_types::uuids::{ALARM_ACTIVATE, ALARM_CHARACTERISTIC};

use crate::error::{Error, Result};

/// Default pool capacity (matches the observed tag deployment).
const DEFAULT_CAPACITY: usize = 3;

/// Default proximity threshold in dBm. Tags pair only at arm's length;
/// anything weaker is a bystander device, not a crew tag being enrolled.
const DEFAULT_PROXIMITY_THRESHOLD_DBM: i16 = -50;

/// Default event channel capacity.
const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Configuration for [`crate::LinkManager`].
///
/// Fixed at startup; the manager never mutates it at runtime.
///
/// # Example
///
/// ```
/// use lifeline_core::ManagerConfig;
///
/// let config = ManagerConfig::default()
///     .capacity(5)
///     .proximity_threshold_dbm(-60);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Maximum number of simultaneous links.
    pub capacity: usize,
    /// Discovery reports weaker than this signal strength are rejected.
    pub proximity_threshold_dbm: i16,
    /// Remote attribute the alarm command is written to.
    pub alarm_attribute: Uuid,
    /// One-byte alarm activation value.
    pub alarm_command: u8,
    /// Event broadcast channel capacity.
    pub event_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            proximity_threshold_dbm: DEFAULT_PROXIMITY_THRESHOLD_DBM,
            alarm_attribute: ALARM_CHARACTERISTIC,
            alarm_command: ALARM_ACTIVATE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ManagerConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool capacity.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the proximity threshold in dBm.
    #[must_use]
    pub fn proximity_threshold_dbm(mut self, threshold: i16) -> Self {
        self.proximity_threshold_dbm = threshold;
        self
    }

    /// Set the alarm target attribute.
    #[must_use]
    pub fn alarm_attribute(mut self, attribute: Uuid) -> Self {
        self.alarm_attribute = attribute;
        self
    }

    /// Set the alarm command byte.
    #[must_use]
    pub fn alarm_command(mut self, command: u8) -> Self {
        self.alarm_command = command;
        self
    }

    /// Check the configuration for values the manager cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::invalid_config("capacity must be at least 1"));
        }
        if self.event_capacity == 0 {
            return Err(Error::invalid_config("event_capacity must be at least 1"));
        }
        Ok(())
    }
}
