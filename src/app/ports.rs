//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   MidiSource ──▶ AppService (domain) ──▶ RelayPort
//!                        │
//!                        └──────────────▶ EventSink
//! ```
//!
//! Driving adapters (USB-MIDI, BLE-MIDI) implement [`MidiSource`]; driven
//! adapters (relay GPIO, log output, NVS) implement the rest.  The
//! [`AppService`](super::service::AppService) consumes them via generics,
//! so the domain core never touches hardware directly.

use crate::config::SystemConfig;
use crate::error::ActuatorError;
use crate::midi::RawMidiMessage;
use crate::relay::RelayId;

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: one call per relay command, no batching.
pub trait RelayPort {
    /// Drive the output line of `relay` high (`on`) or low.
    fn write(&mut self, relay: RelayId, on: bool) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// MIDI source port (driving adapter: transport → domain)
// ───────────────────────────────────────────────────────────────

/// A transport that may have a buffered MIDI message.
pub trait MidiSource {
    /// USB mounted / BLE central connected.  Not-ready sources are not polled.
    fn is_ready(&self) -> bool;

    /// Take the next buffered message without blocking.
    fn poll(&mut self) -> Option<RawMidiMessage>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid values are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
