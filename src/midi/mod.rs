//! MIDI message model and decoder.
//!
//! Both transports hand the pipeline the same thing: a three-byte group
//! `(status, data1, data2)` tagged with where it came from.  The decoder
//! classifies that group by its status nibble.  It never fails — every
//! possible byte triple maps to exactly one [`ClassifiedEvent`] variant.
//!
//! ```text
//!  USB packet ──▶ usb::UsbMidiPacket ─┐
//!                                     ├──▶ RawMidiMessage ──▶ decode() ──▶ ClassifiedEvent
//!  BLE packet ──▶ ble::unpack ────────┘
//! ```

pub mod ble;
pub mod usb;

use core::fmt;

// ───────────────────────────────────────────────────────────────
// Status nibbles
// ───────────────────────────────────────────────────────────────

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;

const TYPE_MASK: u8 = 0xF0;
const CHANNEL_MASK: u8 = 0x0F;

// ───────────────────────────────────────────────────────────────
// Origin
// ───────────────────────────────────────────────────────────────

/// Which transport produced a message.  Used for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Usb,
    Ble,
}

impl Origin {
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Usb => "USB",
            Self::Ble => "BT",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ───────────────────────────────────────────────────────────────
// Raw message
// ───────────────────────────────────────────────────────────────

/// One received MIDI group, consumed immediately by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMidiMessage {
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
    pub origin: Origin,
}

impl RawMidiMessage {
    pub const fn new(status: u8, data1: u8, data2: u8, origin: Origin) -> Self {
        Self {
            status,
            data1,
            data2,
            origin,
        }
    }

    /// Build a message from a possibly short read.
    ///
    /// Missing data bytes are zero.  Returns `None` only for an empty
    /// slice (nothing was read at all); bytes past the third are ignored.
    pub fn from_partial(bytes: &[u8], origin: Origin) -> Option<Self> {
        let (&status, rest) = bytes.split_first()?;
        let data1 = rest.first().copied().unwrap_or(0);
        let data2 = rest.get(1).copied().unwrap_or(0);
        Some(Self::new(status, data1, data2, origin))
    }

    pub const fn bytes(&self) -> [u8; 3] {
        [self.status, self.data1, self.data2]
    }
}

// ───────────────────────────────────────────────────────────────
// Classified event
// ───────────────────────────────────────────────────────────────

/// A decoded MIDI event.  `channel` is the raw 0–15 nibble.
///
/// Data bytes are carried through unmodified; range checks belong to the
/// mapping policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifiedEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    /// Any other status nibble, including system and real-time bytes.
    Unrecognized { status: u8, data1: u8, data2: u8 },
}

impl ClassifiedEvent {
    /// Channel nibble for channel-voice events, `None` for unrecognized.
    pub const fn channel(&self) -> Option<u8> {
        match *self {
            Self::NoteOn { channel, .. }
            | Self::NoteOff { channel, .. }
            | Self::ControlChange { channel, .. }
            | Self::ProgramChange { channel, .. } => Some(channel),
            Self::Unrecognized { .. } => None,
        }
    }
}

/// Classify a raw group by `status & 0xF0`.  Total over all inputs.
pub const fn decode(status: u8, data1: u8, data2: u8) -> ClassifiedEvent {
    let channel = status & CHANNEL_MASK;
    match status & TYPE_MASK {
        NOTE_ON => ClassifiedEvent::NoteOn {
            channel,
            note: data1,
            velocity: data2,
        },
        NOTE_OFF => ClassifiedEvent::NoteOff {
            channel,
            note: data1,
            velocity: data2,
        },
        CONTROL_CHANGE => ClassifiedEvent::ControlChange {
            channel,
            controller: data1,
            value: data2,
        },
        PROGRAM_CHANGE => ClassifiedEvent::ProgramChange {
            channel,
            program: data1,
        },
        _ => ClassifiedEvent::Unrecognized {
            status,
            data1,
            data2,
        },
    }
}

impl From<&RawMidiMessage> for ClassifiedEvent {
    fn from(msg: &RawMidiMessage) -> Self {
        decode(msg.status, msg.data1, msg.data2)
    }
}

/// Renders the per-message diagnostic body, e.g. `Note On: Ch1 Note60 Vel100`.
/// Channels are shown 1-based.
impl fmt::Display for ClassifiedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NoteOn {
                channel,
                note,
                velocity: 0,
            } => write!(f, "Note Off: Ch{} Note{}", channel + 1, note),
            Self::NoteOn {
                channel,
                note,
                velocity,
            } => write!(f, "Note On: Ch{} Note{} Vel{}", channel + 1, note, velocity),
            Self::NoteOff {
                channel,
                note,
                velocity,
            } => write!(f, "Note Off: Ch{} Note{} Vel{}", channel + 1, note, velocity),
            Self::ControlChange {
                channel,
                controller,
                value,
            } => write!(f, "CC: Ch{} CC{} Val{}", channel + 1, controller, value),
            Self::ProgramChange { channel, program } => {
                write!(f, "Program: Ch{} Prog{}", channel + 1, program)
            }
            Self::Unrecognized {
                status,
                data1,
                data2,
            } => write!(
                f,
                "Unknown MIDI: 0x{:02X} 0x{:02X} 0x{:02X}",
                status, data1, data2
            ),
        }
    }
}
