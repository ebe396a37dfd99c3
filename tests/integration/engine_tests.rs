//! Integration tests for the transport → decode → map → relay pipeline.
//!
//! Drive [`AppService`] through its public API with mock sources, mock
//! relay hardware and a recording sink.

use crate::mock_hw::{MockRelays, MockSink, MockSource};

use midimiti::app::events::AppEvent;
use midimiti::app::service::AppService;
use midimiti::config::SystemConfig;
use midimiti::mapping::Advisory;
use midimiti::midi::{ClassifiedEvent, Origin, RawMidiMessage};
use midimiti::relay::{RelayId, RelayStates};

fn make_app(config: &SystemConfig) -> (AppService, MockRelays, MockSink) {
    let mut app = AppService::new(config);
    let mut hw = MockRelays::new();
    let mut sink = MockSink::new();
    app.start(&mut hw, &mut sink);
    hw.clear();
    sink.events.clear();
    (app, hw, sink)
}

fn send(app: &mut AppService, hw: &mut MockRelays, sink: &mut MockSink, bytes: [u8; 3]) {
    let msg = RawMidiMessage::new(bytes[0], bytes[1], bytes[2], Origin::Usb);
    app.handle_message(&msg, hw, sink);
}

fn states(on: [bool; 4]) -> RelayStates {
    RelayStates::from_array(on)
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn start_drives_every_relay_low_once() {
    let mut app = AppService::new(&SystemConfig::default());
    let mut hw = MockRelays::new();
    let mut sink = MockSink::new();
    app.start(&mut hw, &mut sink);

    assert_eq!(
        hw.writes,
        RelayId::ALL.map(|r| (r, false)).to_vec(),
        "each relay written low exactly once"
    );
    assert_eq!(sink.events, vec![AppEvent::Started(RelayStates::ALL_OFF)]);
}

// ── Note policy ───────────────────────────────────────────────

#[test]
fn note_on_turns_mapped_relay_on() {
    let (mut app, mut hw, mut sink) = make_app(&SystemConfig::default());
    send(&mut app, &mut hw, &mut sink, [0x90, 60, 100]);
    assert_eq!(app.relay_states(), states([true, false, false, false]));
    assert_eq!(hw.writes, vec![(RelayId::R1, true)]);
}

#[test]
fn zero_velocity_note_on_is_note_off() {
    let (mut app, mut hw, mut sink) = make_app(&SystemConfig::default());
    send(&mut app, &mut hw, &mut sink, [0x90, 60, 100]);
    send(&mut app, &mut hw, &mut sink, [0x90, 60, 0]);
    assert!(!app.relay_states().get(RelayId::R1));
    assert_eq!(hw.writes.last(), Some(&(RelayId::R1, false)));
}

#[test]
fn note_off_ignores_velocity() {
    let (mut app, mut hw, mut sink) = make_app(&SystemConfig::default());
    send(&mut app, &mut hw, &mut sink, [0x91, 61, 1]);
    assert!(app.relay_states().get(RelayId::R2));
    send(&mut app, &mut hw, &mut sink, [0x81, 61, 64]);
    assert!(!app.relay_states().get(RelayId::R2));
}

#[test]
fn unmapped_note_changes_nothing() {
    let (mut app, mut hw, mut sink) = make_app(&SystemConfig::default());
    send(&mut app, &mut hw, &mut sink, [0x90, 75, 100]);
    assert!(hw.writes.is_empty());
    assert_eq!(app.relay_states(), RelayStates::ALL_OFF);
    assert_eq!(
        sink.last(),
        Some(&AppEvent::Advisory {
            origin: Origin::Usb,
            advisory: Advisory::UnmappedNote { note: 75 },
        })
    );
}

#[test]
fn unmapped_note_release_is_reported_as_release() {
    let (mut app, mut hw, mut sink) = make_app(&SystemConfig::default());
    send(&mut app, &mut hw, &mut sink, [0x80, 75, 0]);
    assert!(hw.writes.is_empty());
    assert_eq!(
        sink.last(),
        Some(&AppEvent::Advisory {
            origin: Origin::Usb,
            advisory: Advisory::UnmappedRelease { note: 75 },
        })
    );
    assert_eq!(app.stats().unmapped, 1);
}

// ── Control change policy ─────────────────────────────────────

#[test]
fn control_change_threshold_boundary() {
    let (mut app, mut hw, mut sink) = make_app(&SystemConfig::default());
    send(&mut app, &mut hw, &mut sink, [0xB0, 3, 127]);
    assert!(app.relay_states().get(RelayId::R3));
    send(&mut app, &mut hw, &mut sink, [0xB0, 3, 10]);
    assert!(!app.relay_states().get(RelayId::R3));
    send(&mut app, &mut hw, &mut sink, [0xB0, 3, 64]);
    assert!(app.relay_states().get(RelayId::R3));
    send(&mut app, &mut hw, &mut sink, [0xB0, 3, 63]);
    assert!(!app.relay_states().get(RelayId::R3));
}

// ── Program change policy ─────────────────────────────────────

#[test]
fn program_change_selects_exactly_one_relay_from_any_state() {
    for prior in 0u8..16 {
        let (mut app, mut hw, mut sink) = make_app(&SystemConfig::default());
        for relay in RelayId::ALL {
            if prior & (1 << relay.index()) != 0 {
                send(&mut app, &mut hw, &mut sink, [0x90, 59 + relay.number(), 100]);
            }
        }
        send(&mut app, &mut hw, &mut sink, [0xC0, 2, 0]);
        assert_eq!(
            app.relay_states(),
            states([false, false, true, false]),
            "prior state {:04b}",
            prior
        );
    }
}

#[test]
fn program_change_batch_writes_every_relay_in_order() {
    let (mut app, mut hw, mut sink) = make_app(&SystemConfig::default());
    send(&mut app, &mut hw, &mut sink, [0xC5, 2, 0]);
    assert_eq!(
        hw.writes,
        vec![
            (RelayId::R1, false),
            (RelayId::R2, false),
            (RelayId::R3, true),
            (RelayId::R4, false),
        ]
    );
}

#[test]
fn program_out_of_range_clears_all() {
    let (mut app, mut hw, mut sink) = make_app(&SystemConfig::default());
    send(&mut app, &mut hw, &mut sink, [0x90, 60, 100]);
    send(&mut app, &mut hw, &mut sink, [0x90, 63, 100]);
    send(&mut app, &mut hw, &mut sink, [0xC0, 9, 0]);
    assert_eq!(app.relay_states(), RelayStates::ALL_OFF);
}

// ── Unrecognized input ────────────────────────────────────────

#[test]
fn system_messages_produce_no_commands() {
    let (mut app, mut hw, mut sink) = make_app(&SystemConfig::default());
    send(&mut app, &mut hw, &mut sink, [0x90, 62, 100]);
    hw.clear();
    for status in [0xF0u8, 0xF8, 0xFA, 0xFE, 0xFF, 0xA0, 0xD3, 0xE0] {
        send(&mut app, &mut hw, &mut sink, [status, 60, 100]);
    }
    assert!(hw.writes.is_empty());
    assert_eq!(app.relay_states(), states([false, false, true, false]));
    assert_eq!(app.stats().unrecognized, 8);
}

// ── Actuator semantics ────────────────────────────────────────

#[test]
fn redundant_commands_still_write_by_default() {
    let (mut app, mut hw, mut sink) = make_app(&SystemConfig::default());
    send(&mut app, &mut hw, &mut sink, [0x90, 60, 100]);
    send(&mut app, &mut hw, &mut sink, [0x90, 60, 100]);
    assert_eq!(hw.writes, vec![(RelayId::R1, true), (RelayId::R1, true)]);
    assert_eq!(app.stats().gpio_writes, 2);
}

#[test]
fn suppression_skips_unchanged_writes() {
    let config = SystemConfig {
        suppress_redundant_writes: true,
        ..Default::default()
    };
    let (mut app, mut hw, mut sink) = make_app(&config);
    send(&mut app, &mut hw, &mut sink, [0x90, 60, 100]);
    send(&mut app, &mut hw, &mut sink, [0x90, 60, 100]);
    assert_eq!(hw.writes, vec![(RelayId::R1, true)]);

    // Both commands are still reported.
    let reported = sink
        .events
        .iter()
        .filter(|e| matches!(e, AppEvent::RelaySet(_)))
        .count();
    assert_eq!(reported, 2);
}

#[test]
fn failed_write_keeps_commanded_state() {
    let mut app = AppService::new(&SystemConfig::default());
    let mut hw = MockRelays::failing_on(RelayId::R2);
    let mut sink = MockSink::new();
    app.start(&mut hw, &mut sink);
    assert_eq!(app.stats().write_failures, 1);

    send(&mut app, &mut hw, &mut sink, [0x90, 61, 100]);
    assert!(app.relay_states().get(RelayId::R2));
    assert_eq!(app.stats().write_failures, 2);

    let failed = sink.events.iter().find_map(|e| match e {
        AppEvent::RelaySet(t) if t.write_error.is_some() => Some(*t),
        _ => None,
    });
    assert_eq!(failed.map(|t| t.relay), Some(RelayId::R2));
}

#[test]
fn every_command_is_followed_by_a_snapshot() {
    let (mut app, mut hw, mut sink) = make_app(&SystemConfig::default());
    send(&mut app, &mut hw, &mut sink, [0xC0, 1, 0]);

    let kinds: Vec<&str> = sink
        .events
        .iter()
        .map(|e| match e {
            AppEvent::MessageReceived { .. } => "rx",
            AppEvent::RelaySet(_) => "set",
            AppEvent::Snapshot(_) => "snap",
            _ => "other",
        })
        .collect();
    assert_eq!(
        kinds,
        ["rx", "set", "snap", "set", "snap", "set", "snap", "set", "snap"]
    );
    assert_eq!(
        sink.last(),
        Some(&AppEvent::Snapshot(states([false, true, false, false])))
    );
}

#[test]
fn received_event_is_classified_once() {
    let (mut app, mut hw, mut sink) = make_app(&SystemConfig::default());
    send(&mut app, &mut hw, &mut sink, [0x9F, 60, 100]);
    assert_eq!(
        sink.events.first(),
        Some(&AppEvent::MessageReceived {
            origin: Origin::Usb,
            event: ClassifiedEvent::NoteOn {
                channel: 15,
                note: 60,
                velocity: 100
            },
        })
    );
}

// ── Channel filter ────────────────────────────────────────────

#[test]
fn channel_filter_restricts_mapping() {
    let config = SystemConfig {
        channel_filter: Some(2),
        ..Default::default()
    };
    let (mut app, mut hw, mut sink) = make_app(&config);
    send(&mut app, &mut hw, &mut sink, [0x90, 60, 100]);
    assert!(hw.writes.is_empty());
    assert_eq!(app.stats().filtered, 1);

    send(&mut app, &mut hw, &mut sink, [0x92, 60, 100]);
    assert_eq!(hw.writes, vec![(RelayId::R1, true)]);
}

// ── Tick harness ──────────────────────────────────────────────

#[test]
fn tick_handles_usb_before_ble() {
    let (mut app, mut hw, mut sink) = make_app(&SystemConfig::default());
    let mut usb = MockSource::new(Origin::Usb);
    let mut ble = MockSource::new(Origin::Ble);
    // USB turns relay 1 on, BLE turns it off again in the same tick.
    usb.push(0x90, 60, 100);
    ble.push(0x80, 60, 0);

    let report = app.tick(&mut usb, &mut ble, &mut hw, &mut sink);
    assert!(report.usb && report.ble);
    assert_eq!(hw.writes, vec![(RelayId::R1, true), (RelayId::R1, false)]);
    assert!(!app.relay_states().get(RelayId::R1));

    let origins: Vec<Origin> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::MessageReceived { origin, .. } => Some(*origin),
            _ => None,
        })
        .collect();
    assert_eq!(origins, vec![Origin::Usb, Origin::Ble]);
}

#[test]
fn tick_takes_at_most_one_message_per_source() {
    let (mut app, mut hw, mut sink) = make_app(&SystemConfig::default());
    let mut usb = MockSource::new(Origin::Usb);
    let mut ble = MockSource::new(Origin::Ble);
    usb.push(0x90, 60, 100);
    usb.push(0x90, 61, 100);
    usb.push(0x90, 62, 100);

    app.tick(&mut usb, &mut ble, &mut hw, &mut sink);
    assert_eq!(usb.pending.len(), 2);
    assert_eq!(app.relay_states(), states([true, false, false, false]));

    app.tick(&mut usb, &mut ble, &mut hw, &mut sink);
    app.tick(&mut usb, &mut ble, &mut hw, &mut sink);
    assert_eq!(app.relay_states(), states([true, true, true, false]));

    let idle = app.tick(&mut usb, &mut ble, &mut hw, &mut sink);
    assert!(!idle.any());
}

#[test]
fn not_ready_source_is_not_polled() {
    let (mut app, mut hw, mut sink) = make_app(&SystemConfig::default());
    let mut usb = MockSource::new(Origin::Usb);
    let mut ble = MockSource::new(Origin::Ble);
    usb.ready = false;
    usb.push(0x90, 60, 100);
    ble.push(0x90, 61, 100);

    let report = app.tick(&mut usb, &mut ble, &mut hw, &mut sink);
    assert!(!report.usb);
    assert!(report.ble);
    assert_eq!(usb.polls, 0);
    assert_eq!(usb.pending.len(), 1);
    assert_eq!(app.relay_states(), states([false, true, false, false]));
}

#[test]
fn origin_has_no_effect_on_policy() {
    let (mut a, mut hw_a, mut sink_a) = make_app(&SystemConfig::default());
    let (mut b, mut hw_b, mut sink_b) = make_app(&SystemConfig::default());
    let bytes = [[0x90, 60, 100], [0xB0, 4, 90], [0xC0, 1, 0], [0x80, 61, 0]];

    for [s, d1, d2] in bytes {
        a.handle_message(&RawMidiMessage::new(s, d1, d2, Origin::Usb), &mut hw_a, &mut sink_a);
        b.handle_message(&RawMidiMessage::new(s, d1, d2, Origin::Ble), &mut hw_b, &mut sink_b);
    }
    assert_eq!(a.relay_states(), b.relay_states());
    assert_eq!(hw_a.writes, hw_b.writes);
}

#[test]
fn stats_count_per_origin() {
    let (mut app, mut hw, mut sink) = make_app(&SystemConfig::default());
    let mut usb = MockSource::new(Origin::Usb);
    let mut ble = MockSource::new(Origin::Ble);
    usb.push(0x90, 60, 100);
    ble.push(0x90, 61, 100);
    ble.push(0xB0, 99, 127);
    for _ in 0..3 {
        app.tick(&mut usb, &mut ble, &mut hw, &mut sink);
    }
    let s = app.stats();
    assert_eq!(s.usb_messages, 1);
    assert_eq!(s.ble_messages, 2);
    assert_eq!(s.unmapped, 1);
    assert_eq!(s.commands_applied, 2);
}
