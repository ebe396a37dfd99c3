//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  They drive diagnostics
//! only; nothing reads them back for control.

use crate::mapping::Advisory;
use crate::midi::{ClassifiedEvent, Origin};
use crate::relay::{RelayStates, Transition};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// Relays initialised; carries the (all-off) initial snapshot.
    Started(RelayStates),

    /// A message was received and classified.
    MessageReceived { origin: Origin, event: ClassifiedEvent },

    /// The message produced no commands, for the given reason.
    Advisory { origin: Origin, advisory: Advisory },

    /// One relay command was applied.
    RelaySet(Transition),

    /// Full relay state after a command.
    Snapshot(RelayStates),
}
