//! Hardware adapter — bridges the four relay drivers to [`RelayPort`].
//!
//! This is the only module in the system that touches relay GPIO.  It is
//! generic over the pin type so host tests can plug in mock pins.

use embedded_hal::digital::OutputPin;

use crate::app::ports::RelayPort;
use crate::drivers::relay::RelayDriver;
use crate::error::ActuatorError;
use crate::relay::{RELAY_COUNT, RelayId, RelayStates};

pub struct HardwareAdapter<P> {
    relays: [RelayDriver<P>; RELAY_COUNT],
}

impl<P: OutputPin> HardwareAdapter<P> {
    pub fn new(relays: [RelayDriver<P>; RELAY_COUNT]) -> Self {
        Self { relays }
    }

    /// Build from raw pins paired with their GPIO numbers (for logs).
    pub fn from_pins(pins: [P; RELAY_COUNT], gpios: [i32; RELAY_COUNT]) -> Self {
        let mut gpios = gpios.into_iter();
        Self::new(pins.map(|pin| RelayDriver::new(pin, gpios.next().unwrap_or(-1))))
    }

    /// Levels as last successfully driven (may lag the store after a
    /// failed write).
    pub fn driven_levels(&self) -> RelayStates {
        let mut levels = [false; RELAY_COUNT];
        for (level, driver) in levels.iter_mut().zip(&self.relays) {
            *level = driver.is_energised();
        }
        RelayStates::from_array(levels)
    }

    pub fn driver(&self, relay: RelayId) -> &RelayDriver<P> {
        &self.relays[relay.index()]
    }
}

// ── RelayPort implementation ──────────────────────────────────

impl<P: OutputPin> RelayPort for HardwareAdapter<P> {
    fn write(&mut self, relay: RelayId, on: bool) -> Result<(), ActuatorError> {
        self.relays[relay.index()].set(on)
    }
}
