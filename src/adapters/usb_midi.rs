//! USB-MIDI device adapter — implements [`MidiSource`] for the native
//! USB-OTG port.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: TinyUSB (esp_tinyusb component) MIDI
//!   class, one virtual cable.  Packets are read straight from the class
//!   driver FIFO; nothing is buffered here.
//! - **all other targets**: an injectable packet queue for host tests.

use log::info;

use crate::app::ports::MidiSource;
use crate::error::TransportError;
use crate::midi::usb::UsbMidiPacket;
use crate::midi::RawMidiMessage;

#[cfg(not(target_os = "espidf"))]
use log::warn;

pub const USB_VID: u16 = 0xCAFE;
pub const USB_PID: u16 = 0x4201;

pub const MANUFACTURER: &str = "MidiMiti";
pub const PRODUCT: &str = "MidiMiti";
pub const SERIAL: &str = "123456";

/// Host-side queue depth (mirrors the class driver's RX FIFO).
#[cfg(not(target_os = "espidf"))]
const SIM_QUEUE_DEPTH: usize = 16;

// ── ESP-IDF descriptors ───────────────────────────────────────

#[cfg(target_os = "espidf")]
mod descriptors {
    use core::ffi::c_char;
    use esp_idf_svc::sys::tusb_desc_device_t;

    const CONFIG_TOTAL_LEN: u8 = 9 + 88;

    pub static DEVICE: tusb_desc_device_t = tusb_desc_device_t {
        bLength: 18,
        bDescriptorType: 0x01,
        bcdUSB: 0x0200,
        bDeviceClass: 0x00,
        bDeviceSubClass: 0x00,
        bDeviceProtocol: 0x00,
        bMaxPacketSize0: 64,
        idVendor: super::USB_VID,
        idProduct: super::USB_PID,
        bcdDevice: 0x0100,
        iManufacturer: 1,
        iProduct: 2,
        iSerialNumber: 3,
        bNumConfigurations: 1,
    };

    /// Configuration + one MIDI function (AC interface 0, MS interface 1,
    /// bulk OUT 0x01, bulk IN 0x81, 64-byte packets).
    pub static CONFIGURATION: [u8; CONFIG_TOTAL_LEN as usize] = [
        // Configuration
        9, 0x02, CONFIG_TOTAL_LEN, 0, 2, 1, 0, 0x80, 50,
        // Audio control interface + class header
        9, 0x04, 0, 0, 0, 0x01, 0x01, 0x00, 0,
        9, 0x24, 0x01, 0x00, 0x01, 0x09, 0x00, 1, 1,
        // MIDI streaming interface + class header
        9, 0x04, 1, 0, 2, 0x01, 0x03, 0x00, 0,
        7, 0x24, 0x01, 0x00, 0x01, 37, 0,
        // Jacks: embedded IN 1, external IN 2, embedded OUT 3, external OUT 4
        6, 0x24, 0x02, 0x01, 1, 0,
        6, 0x24, 0x02, 0x02, 2, 0,
        9, 0x24, 0x03, 0x01, 3, 1, 2, 1, 0,
        9, 0x24, 0x03, 0x02, 4, 1, 1, 1, 0,
        // Bulk OUT, routed to embedded IN jack 1
        7, 0x05, 0x01, 0x02, 64, 0, 0,
        5, 0x25, 0x01, 1, 1,
        // Bulk IN, fed by embedded OUT jack 3
        7, 0x05, 0x81, 0x02, 64, 0, 0,
        5, 0x25, 0x01, 1, 3,
    ];

    pub struct StringTable(pub [*const c_char; 4]);

    // SAFETY: the table only points at 'static string literals.
    unsafe impl Sync for StringTable {}

    pub static STRINGS: StringTable = StringTable([
        // Language ID: English (US)
        c"\x09\x04".as_ptr(),
        c"MidiMiti".as_ptr(),
        c"MidiMiti".as_ptr(),
        c"123456".as_ptr(),
    ]);
}

// ── Adapter ───────────────────────────────────────────────────

pub struct UsbMidiAdapter {
    #[cfg(not(target_os = "espidf"))]
    sim_mounted: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_rx: heapless::Deque<UsbMidiPacket, SIM_QUEUE_DEPTH>,
}

impl UsbMidiAdapter {
    /// Install the USB device stack.  The host enumerates asynchronously;
    /// [`MidiSource::is_ready`] turns true once it has mounted us.
    pub fn new() -> Result<Self, TransportError> {
        #[cfg(target_os = "espidf")]
        {
            use esp_idf_svc::sys::*;

            let mut cfg: tinyusb_config_t = unsafe { core::mem::zeroed() };
            cfg.__bindgen_anon_1.device_descriptor = &descriptors::DEVICE;
            cfg.string_descriptor = descriptors::STRINGS.0.as_ptr() as *mut *const _;
            cfg.string_descriptor_count = descriptors::STRINGS.0.len() as i32;
            cfg.external_phy = false;
            cfg.__bindgen_anon_2.configuration_descriptor = descriptors::CONFIGURATION.as_ptr();

            // SAFETY: every descriptor referenced by `cfg` is 'static.
            esp!(unsafe { tinyusb_driver_install(&cfg) }).map_err(|e| {
                log::error!("USB: tinyusb_driver_install failed ({})", e);
                TransportError::UsbInitFailed(e.code())
            })?;
            info!(
                "USB(espidf): MIDI device up ({:04X}:{:04X} '{}')",
                USB_VID, USB_PID, PRODUCT
            );
        }

        #[cfg(not(target_os = "espidf"))]
        info!(
            "USB(sim): MIDI device {:04X}:{:04X} '{}' / '{}' / '{}'",
            USB_VID, USB_PID, MANUFACTURER, PRODUCT, SERIAL
        );

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            sim_mounted: false,
            #[cfg(not(target_os = "espidf"))]
            sim_rx: heapless::Deque::new(),
        })
    }

    /// Simulate host enumeration / cable pull.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_mounted(&mut self, mounted: bool) {
        if mounted != self.sim_mounted {
            info!("USB(sim): {}", if mounted { "mounted" } else { "unmounted" });
        }
        self.sim_mounted = mounted;
    }

    /// Queue a packet as if the host had sent it.  Returns `false` when
    /// the FIFO is full and the packet was dropped.
    #[cfg(not(target_os = "espidf"))]
    pub fn inject_packet(&mut self, packet: impl Into<UsbMidiPacket>) -> bool {
        if self.sim_rx.push_back(packet.into()).is_err() {
            warn!("USB(sim): RX FIFO full, packet dropped");
            return false;
        }
        true
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn pending(&self) -> usize {
        self.sim_rx.len()
    }

    #[cfg(target_os = "espidf")]
    fn read_packet(&mut self) -> Option<UsbMidiPacket> {
        let mut raw = [0u8; crate::midi::usb::PACKET_LEN];
        // SAFETY: `raw` is exactly one 4-byte event packet.
        let got = unsafe { esp_idf_svc::sys::tud_midi_n_packet_read(0, raw.as_mut_ptr()) };
        got.then(|| UsbMidiPacket::new(raw))
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_packet(&mut self) -> Option<UsbMidiPacket> {
        self.sim_rx.pop_front()
    }
}

// ── MidiSource implementation ─────────────────────────────────

impl MidiSource for UsbMidiAdapter {
    #[cfg(target_os = "espidf")]
    fn is_ready(&self) -> bool {
        // SAFETY: read-only query of the class driver state.
        unsafe { esp_idf_svc::sys::tud_midi_n_mounted(0) }
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_ready(&self) -> bool {
        self.sim_mounted
    }

    fn poll(&mut self) -> Option<RawMidiMessage> {
        self.read_packet().map(|p| p.to_message())
    }
}
