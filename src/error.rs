//! Error types for the MidiMiti firmware.
//!
//! Both enums are `Copy` so they can travel inside
//! [`Transition`](crate::relay::Transition) and
//! [`AppEvent`](crate::app::events::AppEvent) without allocation.
//!
//! The message pipeline itself has no error path: every MIDI input is
//! valid input.  These types cover transport bring-up plus advisory GPIO
//! write failures.  Configuration errors live with their port
//! ([`ConfigError`](crate::app::ports::ConfigError)).

use core::fmt;

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO set failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl core::error::Error for ActuatorError {}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// TinyUSB driver install failed (ESP-IDF return code).
    UsbInitFailed(i32),
    /// Bluetooth controller / Bluedroid bring-up failed (ESP-IDF return code).
    BleInitFailed(i32),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UsbInitFailed(rc) => write!(f, "USB MIDI init failed (rc={})", rc),
            Self::BleInitFailed(rc) => write!(f, "BLE MIDI init failed (rc={})", rc),
        }
    }
}

impl core::error::Error for TransportError {}
