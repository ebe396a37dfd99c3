//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements  | Connects to                  |
//! |------------|-------------|------------------------------|
//! | `ble_midi` | MidiSource  | Bluedroid BLE-MIDI GATT      |
//! | `hardware` | RelayPort   | Relay GPIO (embedded-hal)    |
//! | `log_sink` | EventSink   | Serial log output            |
//! | `nvs`      | ConfigPort  | NVS / in-memory store        |
//! | `usb_midi` | MidiSource  | TinyUSB MIDI class           |

pub mod ble_midi;
pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod usb_midi;
