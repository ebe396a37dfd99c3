//! Relay mapping policy.
//!
//! [`map_event`] is a pure function from a [`ClassifiedEvent`] to the
//! relay commands it implies.  Lookup tables live in [`RelayMap`], built
//! once from [`SystemConfig`].
//!
//! | Event                        | Commands                                   |
//! |------------------------------|--------------------------------------------|
//! | NoteOn, velocity > 0         | mapped relay ON                            |
//! | NoteOn velocity 0 / NoteOff  | mapped relay OFF (release velocity ignored)|
//! | ControlChange                | mapped relay ON iff value ≥ threshold      |
//! | ProgramChange, mapped        | all four: selected ON, the rest OFF        |
//! | ProgramChange, unmapped      | all four OFF                               |
//! | Unrecognized                 | none                                       |
//!
//! Unmapped notes and controllers yield no commands and an advisory.

use heapless::Vec;

use crate::config::SystemConfig;
use crate::midi::ClassifiedEvent;
use crate::relay::{RELAY_COUNT, RelayCommand, RelayId};

/// At most one command per relay per event.
pub type CommandBatch = Vec<RelayCommand, RELAY_COUNT>;

// ───────────────────────────────────────────────────────────────
// RelayMap
// ───────────────────────────────────────────────────────────────

/// Static lookup tables: MIDI number → relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMap {
    notes: [u8; RELAY_COUNT],
    controllers: [u8; RELAY_COUNT],
    programs: [u8; RELAY_COUNT],
    cc_on_threshold: u8,
    channel_filter: Option<u8>,
}

impl RelayMap {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            notes: config.relay_notes,
            controllers: config.relay_controllers,
            programs: config.relay_programs,
            cc_on_threshold: config.cc_on_threshold,
            channel_filter: config.channel_filter,
        }
    }

    fn lookup(table: &[u8; RELAY_COUNT], number: u8) -> Option<RelayId> {
        table
            .iter()
            .position(|&n| n == number)
            .and_then(RelayId::from_index)
    }

    pub fn relay_for_note(&self, note: u8) -> Option<RelayId> {
        Self::lookup(&self.notes, note)
    }

    pub fn relay_for_controller(&self, controller: u8) -> Option<RelayId> {
        Self::lookup(&self.controllers, controller)
    }

    pub fn relay_for_program(&self, program: u8) -> Option<RelayId> {
        Self::lookup(&self.programs, program)
    }

    pub fn cc_on_threshold(&self) -> u8 {
        self.cc_on_threshold
    }

    pub fn channel_filter(&self) -> Option<u8> {
        self.channel_filter
    }

    pub fn notes(&self) -> &[u8; RELAY_COUNT] {
        &self.notes
    }

    pub fn controllers(&self) -> &[u8; RELAY_COUNT] {
        &self.controllers
    }

    pub fn programs(&self) -> &[u8; RELAY_COUNT] {
        &self.programs
    }
}

impl Default for RelayMap {
    fn default() -> Self {
        Self::from_config(&SystemConfig::default())
    }
}

// ───────────────────────────────────────────────────────────────
// Decision
// ───────────────────────────────────────────────────────────────

/// Advisory attached to an event that produced no commands.
/// Reported for observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisory {
    /// Status nibble is not a handled MIDI class.
    UnrecognizedType { status: u8 },
    UnmappedNote { note: u8 },
    /// Note Off (or velocity-0 Note On) for a note with no relay.
    UnmappedRelease { note: u8 },
    UnmappedController { controller: u8 },
    /// Event arrived on a channel outside the configured filter.
    ChannelFiltered { channel: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Decision {
    /// Commands in the order they must be applied.
    pub commands: CommandBatch,
    pub advisory: Option<Advisory>,
}

impl Decision {
    fn none(advisory: Advisory) -> Self {
        Self {
            commands: CommandBatch::new(),
            advisory: Some(advisory),
        }
    }

    fn single(cmd: RelayCommand) -> Self {
        let mut commands = CommandBatch::new();
        // Capacity is RELAY_COUNT; a single push cannot overflow.
        let _ = commands.push(cmd);
        Self {
            commands,
            advisory: None,
        }
    }

    /// All four relays, `selected` ON and the others OFF.
    fn exclusive(selected: Option<RelayId>) -> Self {
        let commands = RelayId::ALL
            .iter()
            .map(|&relay| RelayCommand::set(relay, Some(relay) == selected))
            .collect();
        Self {
            commands,
            advisory: None,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Policy
// ───────────────────────────────────────────────────────────────

fn note_release(map: &RelayMap, note: u8) -> Decision {
    match map.relay_for_note(note) {
        Some(relay) => Decision::single(RelayCommand::off(relay)),
        None => Decision::none(Advisory::UnmappedRelease { note }),
    }
}

/// Map one classified event to relay commands.
pub fn map_event(event: &ClassifiedEvent, map: &RelayMap) -> Decision {
    if let (Some(filter), Some(channel)) = (map.channel_filter, event.channel()) {
        if channel != filter {
            return Decision::none(Advisory::ChannelFiltered { channel });
        }
    }

    match *event {
        ClassifiedEvent::NoteOn { note, velocity, .. } if velocity > 0 => {
            match map.relay_for_note(note) {
                Some(relay) => Decision::single(RelayCommand::on(relay)),
                None => Decision::none(Advisory::UnmappedNote { note }),
            }
        }
        ClassifiedEvent::NoteOn { note, .. } | ClassifiedEvent::NoteOff { note, .. } => {
            note_release(map, note)
        }
        ClassifiedEvent::ControlChange {
            controller, value, ..
        } => match map.relay_for_controller(controller) {
            Some(relay) => Decision::single(RelayCommand::set(relay, value >= map.cc_on_threshold)),
            None => Decision::none(Advisory::UnmappedController { controller }),
        },
        ClassifiedEvent::ProgramChange { program, .. } => {
            Decision::exclusive(map.relay_for_program(program))
        }
        ClassifiedEvent::Unrecognized { status, .. } => {
            Decision::none(Advisory::UnrecognizedType { status })
        }
    }
}
