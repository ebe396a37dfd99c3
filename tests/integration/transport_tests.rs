//! Host-side transport adapters feeding the real pipeline and relay
//! hardware adapter.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};

use crate::mock_hw::MockSink;

use midimiti::adapters::ble_midi::{BleMidiAdapter, BleMidiLink};
use midimiti::adapters::hardware::HardwareAdapter;
use midimiti::adapters::usb_midi::UsbMidiAdapter;
use midimiti::app::events::AppEvent;
use midimiti::app::service::AppService;
use midimiti::config::SystemConfig;
use midimiti::pins;
use midimiti::relay::{RelayId, RelayStates};

// ── Mock pin ──────────────────────────────────────────────────

/// Always-succeeding pin; levels are tracked by the relay driver.
struct MockPin;

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

fn rig() -> (AppService, HardwareAdapter<MockPin>, MockSink) {
    let mut app = AppService::new(&SystemConfig::default());
    let outputs = core::array::from_fn(|_| MockPin);
    let mut hw = HardwareAdapter::from_pins(outputs, pins::RELAY_GPIOS);
    let mut sink = MockSink::new();
    app.start(&mut hw, &mut sink);
    (app, hw, sink)
}

fn ble_adapter() -> BleMidiAdapter {
    let link: &'static BleMidiLink = Box::leak(Box::new(BleMidiLink::new()));
    let name = heapless::String::try_from("MidiMiti").unwrap();
    BleMidiAdapter::with_link(name, link)
}

#[test]
fn usb_packet_drives_gpio() {
    let (mut app, mut hw, mut sink) = rig();
    let mut usb = UsbMidiAdapter::new().unwrap();
    let mut ble = ble_adapter();
    usb.set_mounted(true);
    usb.inject_packet([0x09, 0x90, 62, 100]);

    let report = app.tick(&mut usb, &mut ble, &mut hw, &mut sink);
    assert!(report.usb);
    assert!(!report.ble);
    assert!(hw.driver(RelayId::R3).is_energised());
    assert_eq!(hw.driven_levels(), app.relay_states());
}

#[test]
fn unmounted_usb_keeps_its_packets() {
    let (mut app, mut hw, mut sink) = rig();
    let mut usb = UsbMidiAdapter::new().unwrap();
    let mut ble = ble_adapter();
    usb.inject_packet([0x09, 0x90, 60, 100]);

    app.tick(&mut usb, &mut ble, &mut hw, &mut sink);
    assert_eq!(usb.pending(), 1);
    assert_eq!(app.relay_states(), RelayStates::ALL_OFF);

    usb.set_mounted(true);
    app.tick(&mut usb, &mut ble, &mut hw, &mut sink);
    assert_eq!(usb.pending(), 0);
    assert!(app.relay_states().get(RelayId::R1));
}

#[test]
fn ble_packet_with_running_status_spans_ticks() {
    let (mut app, mut hw, mut sink) = rig();
    let mut usb = UsbMidiAdapter::new().unwrap();
    let mut ble = ble_adapter();
    ble.link().on_central_connected();
    // Program 3, then CC1=127 and CC2=127 via running status.
    ble.link()
        .push_packet(&[0x80, 0x80, 0xC0, 3, 0x80, 0xB0, 1, 127, 0x81, 2, 127]);

    app.tick(&mut usb, &mut ble, &mut hw, &mut sink);
    assert_eq!(
        app.relay_states(),
        RelayStates::from_array([false, false, false, true])
    );
    app.tick(&mut usb, &mut ble, &mut hw, &mut sink);
    app.tick(&mut usb, &mut ble, &mut hw, &mut sink);
    assert_eq!(
        app.relay_states(),
        RelayStates::from_array([true, true, false, true])
    );
    assert_eq!(hw.driven_levels(), app.relay_states());
    assert_eq!(app.stats().ble_messages, 3);
}

#[test]
fn truncated_ble_message_is_zero_filled() {
    let (mut app, mut hw, mut sink) = rig();
    let mut usb = UsbMidiAdapter::new().unwrap();
    let mut ble = ble_adapter();
    ble.link().on_central_connected();
    app.handle_message(
        &midimiti::midi::RawMidiMessage::new(0x90, 60, 100, midimiti::midi::Origin::Usb),
        &mut hw,
        &mut sink,
    );

    // Note On 60 with its velocity byte cut off reads as velocity 0.
    ble.link().push_packet(&[0x80, 0x80, 0x90, 60]);
    app.tick(&mut usb, &mut ble, &mut hw, &mut sink);
    assert!(!app.relay_states().get(RelayId::R1));
}

#[test]
fn disconnected_ble_is_skipped() {
    let (mut app, mut hw, mut sink) = rig();
    let mut usb = UsbMidiAdapter::new().unwrap();
    let mut ble = ble_adapter();
    ble.link().push_packet(&[0x80, 0x80, 0x90, 60, 100]);

    let report = app.tick(&mut usb, &mut ble, &mut hw, &mut sink);
    assert!(!report.any());
    assert!(
        !sink
            .events
            .iter()
            .any(|e| matches!(e, AppEvent::MessageReceived { .. }))
    );
}
