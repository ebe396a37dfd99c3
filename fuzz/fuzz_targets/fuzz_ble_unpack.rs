//! Fuzz target: `midi::ble::unpack` followed by decode and mapping.
//!
//! Drives arbitrary characteristic writes through the BLE-MIDI unpacker
//! and the relay policy, asserting that nothing panics and that every
//! decision stays within the four-command batch.
//!
//! cargo fuzz run fuzz_ble_unpack

#![no_main]

use libfuzzer_sys::fuzz_target;
use midimiti::mapping::{RelayMap, map_event};
use midimiti::midi::{ClassifiedEvent, ble};
use midimiti::relay::RelayStates;

fuzz_target!(|data: &[u8]| {
    let map = RelayMap::default();
    let mut states = RelayStates::ALL_OFF;

    let _ = ble::unpack(data, |msg| {
        let event = ClassifiedEvent::from(&msg);
        let decision = map_event(&event, &map);
        assert!(decision.commands.len() <= 4);
        assert!(decision.commands.is_empty() || decision.advisory.is_none());
        states = states.folded(&decision.commands);
    });
});
