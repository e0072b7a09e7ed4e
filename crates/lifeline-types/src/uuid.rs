//! Bluetooth UUIDs for the Lifeline alarm service.
//!
//! The crew tags expose a single custom GATT service with one write-only
//! characteristic; writing [`ALARM_ACTIVATE`] to it turns the tag's local
//! actuators (light, motor, buzzer) on.

use uuid::{Uuid, uuid};

// --- Alarm Service UUIDs ---

/// Alarm service UUID advertised by every crew tag.
pub const ALARM_SERVICE: Uuid = uuid!("00001523-1212-efde-1523-785feabcd124");

/// Alarm activation characteristic UUID (write without response).
pub const ALARM_CHARACTERISTIC: Uuid = uuid!("00001525-1212-efde-1523-785feabcd124");

// --- Alarm Command Values ---

/// One-byte value that activates the tag's alarm actuators.
pub const ALARM_ACTIVATE: u8 = 0x01;

/// One-byte value that deactivates the tag's alarm actuators.
pub const ALARM_CLEAR: u8 = 0x00;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alarm_service_uuid() {
        let expected = "00001523-1212-efde-1523-785feabcd124";
        assert_eq!(ALARM_SERVICE.to_string(), expected);
    }

    #[test]
    fn test_alarm_characteristic_uuid() {
        let expected = "00001525-1212-efde-1523-785feabcd124";
        assert_eq!(ALARM_CHARACTERISTIC.to_string(), expected);
    }

    #[test]
    fn test_alarm_uuids_are_distinct() {
        assert_ne!(ALARM_SERVICE, ALARM_CHARACTERISTIC);
    }

    #[test]
    fn test_alarm_uuids_share_base() {
        // Both live under the same 128-bit vendor base.
        let service = ALARM_SERVICE.to_string();
        let characteristic = ALARM_CHARACTERISTIC.to_string();
        assert_eq!(&service[9..], &characteristic[9..]);
    }

    #[test]
    fn test_alarm_command_values() {
        assert_eq!(ALARM_ACTIVATE, 1);
        assert_eq!(ALARM_CLEAR, 0);
        assert_ne!(ALARM_ACTIVATE, ALARM_CLEAR);
    }
}
