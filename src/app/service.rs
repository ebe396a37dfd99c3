//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the relay map and the relay state store.  Each
//! message runs to completion through the same chain regardless of which
//! transport produced it:
//!
//! ```text
//!  MidiSource ──▶ ┌──────────────────────────────────┐ ──▶ RelayPort
//!                 │            AppService            │
//!                 │  decode · map_event · RelayBank  │ ──▶ EventSink
//!                 └──────────────────────────────────┘
//! ```
//!
//! One [`tick`](AppService::tick) handles at most one USB message and then
//! at most one BLE message, in that order.

use log::info;

use crate::config::SystemConfig;
use crate::mapping::{Advisory, Decision, RelayMap, map_event};
use crate::midi::{ClassifiedEvent, Origin, RawMidiMessage};
use crate::relay::{RelayBank, RelayCommand, RelayId, RelayStates, Transition};

use super::events::AppEvent;
use super::ports::{EventSink, MidiSource, RelayPort};

// ───────────────────────────────────────────────────────────────
// Counters
// ───────────────────────────────────────────────────────────────

/// Running totals since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub usb_messages: u32,
    pub ble_messages: u32,
    pub commands_applied: u32,
    pub gpio_writes: u32,
    pub write_failures: u32,
    pub unrecognized: u32,
    pub unmapped: u32,
    pub filtered: u32,
}

impl EngineStats {
    fn count_message(&mut self, origin: Origin) {
        match origin {
            Origin::Usb => self.usb_messages = self.usb_messages.wrapping_add(1),
            Origin::Ble => self.ble_messages = self.ble_messages.wrapping_add(1),
        }
    }

    fn count_advisory(&mut self, advisory: Advisory) {
        let slot = match advisory {
            Advisory::UnrecognizedType { .. } => &mut self.unrecognized,
            Advisory::UnmappedNote { .. }
            | Advisory::UnmappedRelease { .. }
            | Advisory::UnmappedController { .. } => &mut self.unmapped,
            Advisory::ChannelFiltered { .. } => &mut self.filtered,
        };
        *slot = slot.wrapping_add(1);
    }
}

/// Which sources delivered a message during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub usb: bool,
    pub ble: bool,
}

impl TickReport {
    pub fn any(&self) -> bool {
        self.usb || self.ble
    }
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

pub struct AppService {
    map: RelayMap,
    bank: RelayBank,
    stats: EngineStats,
}

impl AppService {
    /// Construct the service from configuration.
    ///
    /// Relays are not touched until [`start`](Self::start).
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            map: RelayMap::from_config(config),
            bank: RelayBank::new(config.suppress_redundant_writes),
            stats: EngineStats::default(),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Drive all relays off and announce the initial snapshot.
    pub fn start(&mut self, hw: &mut impl RelayPort, sink: &mut impl EventSink) {
        let errors = self.bank.init(hw);
        for (relay, err) in RelayId::ALL.iter().zip(errors) {
            if let Some(e) = err {
                log::warn!("Relay {} init write failed: {}", relay, e);
                self.stats.write_failures = self.stats.write_failures.wrapping_add(1);
            }
        }
        sink.emit(&AppEvent::Started(self.bank.states()));
        info!("AppService started, all relays off");
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// One pass of the outer loop: USB first, then BLE.
    pub fn tick(
        &mut self,
        usb: &mut impl MidiSource,
        ble: &mut impl MidiSource,
        hw: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) -> TickReport {
        TickReport {
            usb: self.poll_source(usb, hw, sink),
            ble: self.poll_source(ble, hw, sink),
        }
    }

    /// Take at most one message from `source` and process it.
    /// Returns `true` if a message was handled.
    pub fn poll_source(
        &mut self,
        source: &mut impl MidiSource,
        hw: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) -> bool {
        if !source.is_ready() {
            return false;
        }
        match source.poll() {
            Some(msg) => {
                self.handle_message(&msg, hw, sink);
                true
            }
            None => false,
        }
    }

    // ── Message pipeline ──────────────────────────────────────

    /// Decode → map → apply every resulting command, in order.
    ///
    /// Returns the decision that was applied.
    pub fn handle_message(
        &mut self,
        msg: &RawMidiMessage,
        hw: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) -> Decision {
        self.stats.count_message(msg.origin);

        let event = ClassifiedEvent::from(msg);
        sink.emit(&AppEvent::MessageReceived {
            origin: msg.origin,
            event,
        });

        let decision = map_event(&event, &self.map);
        if let Some(advisory) = decision.advisory {
            self.stats.count_advisory(advisory);
            sink.emit(&AppEvent::Advisory {
                origin: msg.origin,
                advisory,
            });
        }

        for &cmd in &decision.commands {
            self.apply(cmd, hw, sink);
        }
        decision
    }

    /// Apply a single command and report it.
    pub fn apply(
        &mut self,
        cmd: RelayCommand,
        hw: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) -> Transition {
        let transition = self.bank.apply(cmd, hw);

        self.stats.commands_applied = self.stats.commands_applied.wrapping_add(1);
        if transition.written {
            self.stats.gpio_writes = self.stats.gpio_writes.wrapping_add(1);
        }
        if transition.write_error.is_some() {
            self.stats.write_failures = self.stats.write_failures.wrapping_add(1);
        }

        sink.emit(&AppEvent::RelaySet(transition));
        sink.emit(&AppEvent::Snapshot(self.bank.states()));
        transition
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn relay_states(&self) -> RelayStates {
        self.bank.states()
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn relay_map(&self) -> &RelayMap {
        &self.map
    }
}
