//! Relay identifiers, commands, and the relay state store.
//!
//! [`RelayBank`] is the only owner of relay state.  Every [`RelayCommand`]
//! goes through [`RelayBank::apply`], which records the commanded state,
//! performs exactly one physical write through the [`RelayPort`], and
//! reports the [`Transition`].
//!
//! ## Redundant writes
//!
//! Setting a relay to the state it already holds still writes the pin
//! (and the caller still logs it).  `suppress_redundant_writes` turns
//! that off, which changes observable GPIO toggle counts.

use core::fmt;

use crate::app::ports::RelayPort;
use crate::error::ActuatorError;

/// Number of physical relays.
pub const RELAY_COUNT: usize = 4;

// ───────────────────────────────────────────────────────────────
// RelayId
// ───────────────────────────────────────────────────────────────

/// Relay number in the closed set 1–4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelayId(u8);

impl RelayId {
    pub const R1: Self = Self(1);
    pub const R2: Self = Self(2);
    pub const R3: Self = Self(3);
    pub const R4: Self = Self(4);

    /// All relays in ascending order.
    pub const ALL: [Self; RELAY_COUNT] = [Self::R1, Self::R2, Self::R3, Self::R4];

    /// `None` outside 1–4.
    pub const fn new(number: u8) -> Option<Self> {
        if number >= 1 && number <= RELAY_COUNT as u8 {
            Some(Self(number))
        } else {
            None
        }
    }

    /// Zero-based slot for array indexing.
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < RELAY_COUNT {
            Some(Self(index as u8 + 1))
        } else {
            None
        }
    }

    pub const fn number(self) -> u8 {
        self.0
    }

    pub const fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ───────────────────────────────────────────────────────────────
// RelayCommand
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayCommand {
    pub relay: RelayId,
    pub on: bool,
}

impl RelayCommand {
    pub const fn on(relay: RelayId) -> Self {
        Self { relay, on: true }
    }

    pub const fn off(relay: RelayId) -> Self {
        Self { relay, on: false }
    }

    pub const fn set(relay: RelayId, on: bool) -> Self {
        Self { relay, on }
    }
}

// ───────────────────────────────────────────────────────────────
// RelayStates
// ───────────────────────────────────────────────────────────────

/// Snapshot of all four relays.  Starts all-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayStates([bool; RELAY_COUNT]);

impl RelayStates {
    pub const ALL_OFF: Self = Self([false; RELAY_COUNT]);

    pub const fn from_array(states: [bool; RELAY_COUNT]) -> Self {
        Self(states)
    }

    pub const fn get(&self, relay: RelayId) -> bool {
        self.0[relay.index()]
    }

    pub fn set(&mut self, relay: RelayId, on: bool) {
        self.0[relay.index()] = on;
    }

    pub const fn as_array(&self) -> [bool; RELAY_COUNT] {
        self.0
    }

    /// Fold a command sequence over this state, in order.
    #[must_use]
    pub fn folded<'a>(mut self, commands: impl IntoIterator<Item = &'a RelayCommand>) -> Self {
        for cmd in commands {
            self.set(cmd.relay, cmd.on);
        }
        self
    }
}

/// `[1:ON ] [2:OFF] [3:OFF] [4:OFF]`
impl fmt::Display for RelayStates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, on) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "[{}:{}]", i + 1, if *on { "ON " } else { "OFF" })?;
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Transition
// ───────────────────────────────────────────────────────────────

/// Result of applying one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub relay: RelayId,
    pub previous: bool,
    pub new: bool,
    /// A physical write was issued (false only when suppressed).
    pub written: bool,
    /// The physical write was issued and failed.
    pub write_error: Option<ActuatorError>,
}

impl Transition {
    pub const fn changed(&self) -> bool {
        self.previous != self.new
    }
}

// ───────────────────────────────────────────────────────────────
// RelayBank
// ───────────────────────────────────────────────────────────────

/// Relay state store plus actuator.
pub struct RelayBank {
    states: RelayStates,
    suppress_redundant_writes: bool,
}

impl RelayBank {
    pub fn new(suppress_redundant_writes: bool) -> Self {
        Self {
            states: RelayStates::ALL_OFF,
            suppress_redundant_writes,
        }
    }

    /// Drive every output low to match the all-off initial state.
    pub fn init(&mut self, port: &mut impl RelayPort) -> [Option<ActuatorError>; RELAY_COUNT] {
        self.states = RelayStates::ALL_OFF;
        RelayId::ALL.map(|relay| port.write(relay, false).err())
    }

    /// Apply one command.  The stored state always becomes `cmd.on`, even
    /// when the physical write fails.
    pub fn apply(&mut self, cmd: RelayCommand, port: &mut impl RelayPort) -> Transition {
        let previous = self.states.get(cmd.relay);
        self.states.set(cmd.relay, cmd.on);

        let skip = self.suppress_redundant_writes && previous == cmd.on;
        let write_error = if skip {
            None
        } else {
            port.write(cmd.relay, cmd.on).err()
        };

        Transition {
            relay: cmd.relay,
            previous,
            new: cmd.on,
            written: !skip,
            write_error,
        }
    }

    pub fn states(&self) -> RelayStates {
        self.states
    }

    pub fn is_on(&self, relay: RelayId) -> bool {
        self.states.get(relay)
    }
}
