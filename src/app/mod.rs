//! Application core — pure domain logic, zero I/O.
//!
//! Wires the MIDI decoder, the relay mapping policy, and the relay state
//! store into one per-message pipeline.  All interaction with hardware
//! and transports happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
