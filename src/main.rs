//! MidiMiti Firmware — Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                   Adapters (outer ring)                    │
//! │                                                            │
//! │  UsbMidiAdapter   BleMidiAdapter   NvsAdapter              │
//! │  (MidiSource)     (MidiSource)     (ConfigPort)            │
//! │  HardwareAdapter  LogEventSink                             │
//! │  (RelayPort)      (EventSink)                              │
//! │                                                            │
//! │  ───────────────── Port Trait Boundary ─────────────────   │
//! │                                                            │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │              AppService (pure logic)                 │  │
//! │  │  decode · map_event · RelayBank                      │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```

#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{AnyOutputPin, OutputPin as _, PinDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use log::{info, warn};

use midimiti::adapters::ble_midi::BleMidiAdapter;
use midimiti::adapters::hardware::HardwareAdapter;
use midimiti::adapters::log_sink::LogEventSink;
use midimiti::adapters::nvs::NvsAdapter;
use midimiti::adapters::usb_midi::UsbMidiAdapter;
use midimiti::app::ports::ConfigPort;
use midimiti::app::service::AppService;
use midimiti::config::SystemConfig;
use midimiti::mapping::RelayMap;
use midimiti::pins;
use midimiti::relay::RelayId;

fn print_mapping(map: &RelayMap) {
    info!("Relay Mapping:");
    for relay in RelayId::ALL {
        let i = relay.index();
        info!(
            "  Relay {} (GPIO{}): Note {} / CC {} / Program {}",
            relay,
            pins::RELAY_GPIOS[i],
            map.notes()[i],
            map.controllers()[i],
            map.programs()[i],
        );
    }
    info!("  CC value >= {} turns a relay ON", map.cc_on_threshold());
    match map.channel_filter() {
        Some(ch) => info!("  Listening on channel {} only", ch + 1),
        None => info!("  Listening on all channels"),
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  MidiMiti v{:<26}║", env!("CARGO_PKG_VERSION"));
    info!("║  USB + BLE MIDI relay controller     ║");
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let config = match NvsAdapter::new() {
        Ok(nvs) => match nvs.load() {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("NVS config load failed ({}), using defaults", e);
                SystemConfig::default()
            }
        },
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults", e);
            SystemConfig::default()
        }
    };

    // ── 3. Relay outputs ──────────────────────────────────────
    let p = Peripherals::take()?;
    let relay_pins: [PinDriver<'static, AnyOutputPin, _>; 4] = [
        PinDriver::output(p.pins.gpio4.downgrade_output())?,
        PinDriver::output(p.pins.gpio5.downgrade_output())?,
        PinDriver::output(p.pins.gpio6.downgrade_output())?,
        PinDriver::output(p.pins.gpio7.downgrade_output())?,
    ];
    let mut hw = HardwareAdapter::from_pins(relay_pins, pins::RELAY_GPIOS);

    // ── 4. Transports ─────────────────────────────────────────
    let mut usb = UsbMidiAdapter::new()?;
    let mut ble = BleMidiAdapter::new(config.ble_device_name.clone());
    ble.start()?;

    // ── 5. Application core ───────────────────────────────────
    let mut sink = LogEventSink::new();
    let mut app = AppService::new(&config);
    print_mapping(app.relay_map());
    app.start(&mut hw, &mut sink);

    info!("Setup complete. Waiting for MIDI on USB and BLE...");

    // ── 6. Poll loop ──────────────────────────────────────────
    loop {
        app.tick(&mut usb, &mut ble, &mut hw, &mut sink);
        FreeRtos::delay_ms(config.poll_interval_ms);
    }
}
