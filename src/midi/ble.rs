//! BLE-MIDI packet unpacking.
//!
//! A BLE-MIDI characteristic write carries one or more MIDI messages,
//! each preceded by a 13-bit timestamp split across a header byte and
//! per-message timestamp bytes:
//!
//! ```text
//! ┌────────┬──────────┬────────┬──────┬──────┬──────────┬──────┬──────┐
//! │ Header │ TS-low   │ Status │ Data │ Data │ TS-low   │ Data │ Data │ …
//! │ 10hhhh │ 1lllllll │ 1sssss │ 0ddd │ 0ddd │ 1lllllll │ 0ddd │ 0ddd │
//! └────────┴──────────┴────────┴──────┴──────┴──────────┴──────┴──────┘
//!                                              └ running status ┘
//! ```
//!
//! Running status is honoured, real-time bytes may interleave without
//! cancelling it, and SysEx payloads are skipped (only the `0xF0` start
//! is surfaced, as an unrecognized one-byte message).  A message cut
//! short by the end of the packet or by the next timestamp is emitted
//! with its missing data bytes set to zero.  Timestamps are discarded.

use core::fmt;

use super::{Origin, RawMidiMessage};

const SYSEX_START: u8 = 0xF0;
const SYSEX_END: u8 = 0xF7;
const REALTIME_FIRST: u8 = 0xF8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpackError {
    /// Zero-length write.
    Empty,
    /// First byte is not a BLE-MIDI header (`0b10xx_xxxx`).
    BadHeader(u8),
}

impl fmt::Display for UnpackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty BLE-MIDI packet"),
            Self::BadHeader(b) => write!(f, "bad BLE-MIDI header 0x{:02X}", b),
        }
    }
}

/// Number of data bytes that follow `status`.
const fn data_len(status: u8) -> usize {
    match status & 0xF0 {
        0xC0 | 0xD0 => 1,
        0x80 | 0x90 | 0xA0 | 0xB0 | 0xE0 => 2,
        _ => match status {
            0xF1 | 0xF3 => 1,
            0xF2 => 2,
            _ => 0,
        },
    }
}

/// Collect `status` and up to `want` data bytes starting at `*pos`,
/// stopping early at any byte with the high bit set.  Returns the filled
/// prefix length.
fn take_message(body: &[u8], pos: &mut usize, status: u8, want: usize) -> ([u8; 3], usize) {
    let mut bytes = [status, 0, 0];
    let mut len = 1;
    while len <= want {
        match body.get(*pos) {
            Some(&b) if b & 0x80 == 0 => {
                bytes[len] = b;
                len += 1;
                *pos += 1;
            }
            _ => break,
        }
    }
    (bytes, len)
}

/// What one packet produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unpacked {
    /// Messages passed to `emit`.
    pub messages: usize,
    /// Data bytes with no status to attach to (no running status yet,
    /// or a sender that omitted the timestamp byte).
    pub orphan_bytes: usize,
}

/// Unpack one BLE-MIDI packet, calling `emit` for every message in order.
pub fn unpack(packet: &[u8], mut emit: impl FnMut(RawMidiMessage)) -> Result<Unpacked, UnpackError> {
    let (&header, body) = packet.split_first().ok_or(UnpackError::Empty)?;
    if header & 0xC0 != 0x80 {
        return Err(UnpackError::BadHeader(header));
    }

    let mut messages = 0usize;
    let mut orphan_bytes = 0usize;
    let mut running: Option<u8> = None;
    let mut in_sysex = false;
    let mut pos = 0usize;

    let mut push = |bytes: &[u8]| {
        if let Some(msg) = RawMidiMessage::from_partial(bytes, Origin::Ble) {
            emit(msg);
            messages += 1;
        }
    };

    while pos < body.len() {
        if body[pos] & 0x80 != 0 {
            // Timestamp-low byte.
            pos += 1;
            let Some(&next) = body.get(pos) else {
                break;
            };
            if next & 0x80 != 0 {
                pos += 1;
                match next {
                    SYSEX_END => {
                        in_sysex = false;
                        running = None;
                    }
                    SYSEX_START => {
                        in_sysex = true;
                        running = None;
                        push(&[next]);
                    }
                    REALTIME_FIRST..=0xFF => push(&[next]),
                    _ => {
                        in_sysex = false;
                        running = if next < SYSEX_START { Some(next) } else { None };
                        let (bytes, len) = take_message(body, &mut pos, next, data_len(next));
                        push(&bytes[..len]);
                    }
                }
                continue;
            }
            // Timestamp followed by a data byte: running status.
        }

        if in_sysex {
            pos += 1;
            continue;
        }
        match running {
            Some(status) => {
                let (bytes, len) = take_message(body, &mut pos, status, data_len(status));
                push(&bytes[..len]);
            }
            None => {
                orphan_bytes += 1;
                pos += 1;
            }
        }
    }

    Ok(Unpacked {
        messages,
        orphan_bytes,
    })
}
