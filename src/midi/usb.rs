//! USB-MIDI 1.0 event packets.
//!
//! Every USB-MIDI transfer is a sequence of 4-byte event packets:
//!
//! ```text
//! ┌─────────────┬────────┬───────┬───────┐
//! │ Cable | CIN │ MIDI_0 │ MIDI_1│ MIDI_2│
//! │  (4b) (4b)  │  (1B)  │  (1B) │  (1B) │
//! └─────────────┴────────┴───────┴───────┘
//! ```
//!
//! The three MIDI bytes go to the pipeline as-is; the header byte is kept
//! for logging only.

use super::{Origin, RawMidiMessage};

pub const PACKET_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbMidiPacket([u8; PACKET_LEN]);

impl UsbMidiPacket {
    pub const fn new(bytes: [u8; PACKET_LEN]) -> Self {
        Self(bytes)
    }

    /// Virtual cable number (upper nibble of the header).
    pub const fn cable(&self) -> u8 {
        self.0[0] >> 4
    }

    /// Code Index Number (lower nibble of the header).
    pub const fn code_index(&self) -> u8 {
        self.0[0] & 0x0F
    }

    pub const fn to_message(&self) -> RawMidiMessage {
        RawMidiMessage::new(self.0[1], self.0[2], self.0[3], Origin::Usb)
    }
}

impl From<[u8; PACKET_LEN]> for UsbMidiPacket {
    fn from(bytes: [u8; PACKET_LEN]) -> Self {
        Self::new(bytes)
    }
}
