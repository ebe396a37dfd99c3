//! System configuration parameters
//!
//! All tunable parameters for the MidiMiti relay controller.
//! Values can be overridden via NVS (non-volatile storage).

use serde::{Deserialize, Serialize};

use crate::relay::RELAY_COUNT;

/// Default BLE advertising / USB product name.
pub const DEFAULT_DEVICE_NAME: &str = "MidiMiti";

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Mapping tables (index 0 = relay 1) ---
    /// Note number that drives each relay (C4, C#4, D4, D#4)
    pub relay_notes: [u8; RELAY_COUNT],
    /// Controller number that drives each relay
    pub relay_controllers: [u8; RELAY_COUNT],
    /// Program number that exclusively selects each relay
    pub relay_programs: [u8; RELAY_COUNT],

    // --- Policy ---
    /// CC value at or above which a relay turns on
    pub cc_on_threshold: u8,
    /// Only map events on this channel (0-15); `None` accepts all 16
    pub channel_filter: Option<u8>,
    /// Skip the GPIO write when a command does not change relay state
    pub suppress_redundant_writes: bool,

    // --- Timing ---
    /// Main loop yield between polls (milliseconds)
    pub poll_interval_ms: u32,

    // --- Identity ---
    /// BLE advertised name
    pub ble_device_name: heapless::String<24>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let mut ble_device_name = heapless::String::new();
        let _ = ble_device_name.push_str(DEFAULT_DEVICE_NAME);
        Self {
            relay_notes: [60, 61, 62, 63],
            relay_controllers: [1, 2, 3, 4],
            relay_programs: [0, 1, 2, 3],

            cc_on_threshold: 64,
            channel_filter: None,
            suppress_redundant_writes: false,

            poll_interval_ms: 1,

            ble_device_name,
        }
    }
}
