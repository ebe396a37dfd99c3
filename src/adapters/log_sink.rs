//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by rendering application events as the
//! serial-console lines the board has always printed (UART / USB-CDC in
//! production, stderr on the host).

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::mapping::Advisory;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(states) => {
                info!("Relays initialised");
                info!("Relay States: {}", states);
            }
            AppEvent::MessageReceived { origin, event } => {
                info!("[{}] {}", origin, event);
            }
            AppEvent::Advisory { origin, advisory } => match advisory {
                Advisory::UnmappedNote { note } => {
                    info!("Note {} not mapped to relay", note);
                }
                Advisory::UnmappedRelease { note } => {
                    debug!("Note {} release not mapped to relay", note);
                }
                Advisory::UnmappedController { controller } => {
                    debug!("CC {} not mapped to relay", controller);
                }
                Advisory::UnrecognizedType { status } => {
                    debug!("[{}] status 0x{:02X} ignored", origin, status);
                }
                Advisory::ChannelFiltered { channel } => {
                    debug!("[{}] Ch{} filtered", origin, channel + 1);
                }
            },
            AppEvent::RelaySet(t) => {
                info!("Relay {}: {}", t.relay, if t.new { "ON" } else { "OFF" });
                if let Some(e) = t.write_error {
                    warn!("Relay {}: {} (state kept as commanded)", t.relay, e);
                }
            }
            AppEvent::Snapshot(states) => {
                info!("Relay States: {}", states);
            }
        }
    }
}
