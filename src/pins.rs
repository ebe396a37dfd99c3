//! GPIO / peripheral pin assignments for the MidiMiti relay board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Relay outputs (active HIGH, driven through the relay module's optos)
// ---------------------------------------------------------------------------

pub const RELAY_1_GPIO: i32 = 4;
pub const RELAY_2_GPIO: i32 = 5;
pub const RELAY_3_GPIO: i32 = 6;
pub const RELAY_4_GPIO: i32 = 7;

/// Relay lines in relay order (index 0 = relay 1).
pub const RELAY_GPIOS: [i32; 4] = [RELAY_1_GPIO, RELAY_2_GPIO, RELAY_3_GPIO, RELAY_4_GPIO];

// ---------------------------------------------------------------------------
// Native USB (USB-OTG full speed, fixed by the ESP32-S3 pad mux)
// ---------------------------------------------------------------------------

/// USB D- — reserved, never use as GPIO.
pub const USB_DM_GPIO: i32 = 19;
/// USB D+ — reserved, never use as GPIO.
pub const USB_DP_GPIO: i32 = 20;

/// `true` if `gpio` is one of the native USB data lines.
pub const fn is_usb_pin(gpio: i32) -> bool {
    gpio == USB_DM_GPIO || gpio == USB_DP_GPIO
}

const _: () = {
    let mut i = 0;
    while i < RELAY_GPIOS.len() {
        assert!(!is_usb_pin(RELAY_GPIOS[i]), "relay output on a USB data line");
        i += 1;
    }
};
