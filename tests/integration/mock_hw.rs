//! Mock adapters for integration tests.
//!
//! Records every relay write and every emitted event so tests can assert
//! on the full history without touching real GPIO.

use std::cell::RefCell;
use std::collections::VecDeque;

use midimiti::adapters::nvs::validate_config;
use midimiti::app::events::AppEvent;
use midimiti::app::ports::{ConfigError, ConfigPort, EventSink, MidiSource, RelayPort};
use midimiti::config::SystemConfig;
use midimiti::error::ActuatorError;
use midimiti::midi::{Origin, RawMidiMessage};
use midimiti::relay::RelayId;

// ── MockRelays ────────────────────────────────────────────────

#[derive(Default)]
pub struct MockRelays {
    pub writes: Vec<(RelayId, bool)>,
    /// Relays whose writes report failure.
    pub failing: Vec<RelayId>,
}

#[allow(dead_code)]
impl MockRelays {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(relay: RelayId) -> Self {
        Self {
            writes: Vec::new(),
            failing: vec![relay],
        }
    }

    /// Level of `relay` according to the last write it received.
    pub fn level(&self, relay: RelayId) -> bool {
        self.writes
            .iter()
            .rev()
            .find(|(r, _)| *r == relay)
            .is_some_and(|(_, on)| *on)
    }

    pub fn clear(&mut self) {
        self.writes.clear();
    }
}

impl RelayPort for MockRelays {
    fn write(&mut self, relay: RelayId, on: bool) -> Result<(), ActuatorError> {
        self.writes.push((relay, on));
        if self.failing.contains(&relay) {
            return Err(ActuatorError::GpioWriteFailed);
        }
        Ok(())
    }
}

// ── MockSink ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&AppEvent> {
        self.events.last()
    }
}

impl EventSink for MockSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(*event);
    }
}

// ── MockSource ────────────────────────────────────────────────

pub struct MockSource {
    origin: Origin,
    pub ready: bool,
    pub pending: VecDeque<RawMidiMessage>,
    pub polls: usize,
}

#[allow(dead_code)]
impl MockSource {
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            ready: true,
            pending: VecDeque::new(),
            polls: 0,
        }
    }

    pub fn push(&mut self, status: u8, data1: u8, data2: u8) {
        self.pending
            .push_back(RawMidiMessage::new(status, data1, data2, self.origin));
    }
}

impl MidiSource for MockSource {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn poll(&mut self) -> Option<RawMidiMessage> {
        self.polls += 1;
        self.pending.pop_front()
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    stored: RefCell<Option<SystemConfig>>,
    pub saves: RefCell<usize>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        Ok(self.stored.borrow().clone().unwrap_or_default())
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        *self.stored.borrow_mut() = Some(config.clone());
        *self.saves.borrow_mut() += 1;
        Ok(())
    }
}
