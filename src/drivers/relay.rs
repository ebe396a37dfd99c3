//! Single relay output driver.
//!
//! Wraps one `embedded-hal` output pin.  HIGH energises the relay coil.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: `P` is an `esp_idf_hal::gpio::PinDriver` in output mode.
//! On host/test: any `OutputPin` mock.

use embedded_hal::digital::{Error as _, OutputPin, PinState};
use log::warn;

use crate::error::ActuatorError;

pub struct RelayDriver<P> {
    pin: P,
    gpio: i32,
    energised: bool,
}

impl<P: OutputPin> RelayDriver<P> {
    pub fn new(pin: P, gpio: i32) -> Self {
        Self {
            pin,
            gpio,
            energised: false,
        }
    }

    /// Drive the pin.  `energised` tracks the last successful write.
    pub fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
        self.pin.set_state(PinState::from(on)).map_err(|e| {
            warn!("GPIO{}: write failed ({:?})", self.gpio, e.kind());
            ActuatorError::GpioWriteFailed
        })?;
        self.energised = on;
        Ok(())
    }

    pub fn is_energised(&self) -> bool {
        self.energised
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }
}
