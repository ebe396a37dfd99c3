//! MidiMiti relay controller library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod mapping;
pub mod midi;
pub mod pins;
pub mod relay;

// Adapters and drivers carry their own cfg-gated target code.
pub mod adapters;
pub mod drivers;
