//! BLE-MIDI peripheral adapter — implements [`MidiSource`] over the
//! standard BLE-MIDI GATT service.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid GATT server via raw
//!   `esp_idf_svc::sys` calls.
//! - **all other targets**: packets are pushed into the link by tests.
//!
//! ## Data flow
//!
//! ```text
//!  Bluedroid task                       main loop
//!  ──────────────                       ─────────
//!  GATTS WRITE ──▶ BleMidiLink ──────▶ BleMidiAdapter::poll
//!                  (embassy-sync        unpack ─▶ Deque<RawMidiMessage>
//!                   Channel, bounded)                │
//!                                                    └─▶ one message / tick
//! ```
//!
//! | Item           | UUID                                   | Props              |
//! |----------------|----------------------------------------|--------------------|
//! | MIDI service   | `03B80E5A-EDE8-4B33-A751-6CE34EC4C700` |                    |
//! | MIDI I/O char  | `7772E5DB-3868-4112-A1A9-F2669D106BF3` | Read, WriteNR, Notify |

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{info, warn};

use crate::app::ports::MidiSource;
use crate::error::TransportError;
use crate::midi::{RawMidiMessage, ble};

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x03B8_0E5A_EDE8_4B33_A751_6CE3_4EC4_C700;
pub const CHAR_MIDI_IO: u128 = 0x7772_E5DB_3868_4112_A1A9_F266_9D10_6BF3;

/// Largest characteristic write accepted (ATT MTU 131 minus header).
pub const MAX_PACKET_LEN: usize = 128;

/// GATT writes buffered between the Bluetooth task and the main loop.
pub const PACKET_QUEUE_DEPTH: usize = 8;

/// Parsed messages waiting for the pipeline.
pub const MESSAGE_QUEUE_DEPTH: usize = 32;

pub type BlePacket = heapless::Vec<u8, MAX_PACKET_LEN>;

// ───────────────────────────────────────────────────────────────
// Link: Bluetooth task → main loop
// ───────────────────────────────────────────────────────────────

/// Shared state written from the Bluetooth stack's callback context and
/// read by the adapter.  The adapter is the only consumer.
pub struct BleMidiLink {
    packets: Channel<CriticalSectionRawMutex, BlePacket, PACKET_QUEUE_DEPTH>,
    connected: AtomicBool,
    rejected: AtomicU32,
}

impl BleMidiLink {
    pub const fn new() -> Self {
        Self {
            packets: Channel::new(),
            connected: AtomicBool::new(false),
            rejected: AtomicU32::new(0),
        }
    }

    pub fn on_central_connected(&self) {
        info!("BLE: central connected");
        self.connected.store(true, Ordering::Release);
    }

    pub fn on_central_disconnected(&self) {
        info!("BLE: central disconnected");
        self.connected.store(false, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Hand one characteristic write to the main loop.  Oversized writes
    /// and writes arriving while the channel is full are dropped whole.
    pub fn push_packet(&self, data: &[u8]) -> bool {
        let Ok(packet) = BlePacket::from_slice(data) else {
            warn!("BLE: {}-byte write exceeds {} bytes, dropped", data.len(), MAX_PACKET_LEN);
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        if self.packets.try_send(packet).is_err() {
            warn!("BLE: packet channel full, write dropped");
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Writes dropped before reaching the adapter.
    pub fn rejected(&self) -> u32 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn take_packet(&self) -> Option<BlePacket> {
        self.packets.try_receive().ok()
    }
}

impl Default for BleMidiLink {
    fn default() -> Self {
        Self::new()
    }
}

/// The link the Bluedroid callbacks feed.
pub static BLE_MIDI_LINK: BleMidiLink = BleMidiLink::new();

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

pub struct BleMidiAdapter {
    link: &'static BleMidiLink,
    device_name: heapless::String<24>,
    queue: heapless::Deque<RawMidiMessage, MESSAGE_QUEUE_DEPTH>,
    malformed_packets: u32,
    overflow_packets: u32,
    orphan_bytes: u32,
}

impl BleMidiAdapter {
    /// Adapter bound to the global [`BLE_MIDI_LINK`].
    pub fn new(device_name: heapless::String<24>) -> Self {
        Self::with_link(device_name, &BLE_MIDI_LINK)
    }

    pub fn with_link(device_name: heapless::String<24>, link: &'static BleMidiLink) -> Self {
        Self {
            link,
            device_name,
            queue: heapless::Deque::new(),
            malformed_packets: 0,
            overflow_packets: 0,
            orphan_bytes: 0,
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn link(&self) -> &'static BleMidiLink {
        self.link
    }

    /// Packets rejected by the unpacker (bad header, empty).
    pub fn malformed_packets(&self) -> u32 {
        self.malformed_packets
    }

    /// Packets dropped because their messages did not fit the queue.
    pub fn overflow_packets(&self) -> u32 {
        self.overflow_packets
    }

    /// Data bytes discarded because no status preceded them.
    pub fn orphan_bytes(&self) -> u32 {
        self.orphan_bytes
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Move every pending GATT write from the link into the message queue.
    fn drain_link(&mut self) {
        while let Some(packet) = self.link.take_packet() {
            self.enqueue_packet(&packet);
        }
    }

    fn enqueue_packet(&mut self, packet: &[u8]) {
        let mut parsed: heapless::Vec<RawMidiMessage, MESSAGE_QUEUE_DEPTH> = heapless::Vec::new();
        let mut overflow = false;
        let result = ble::unpack(packet, |msg| {
            if parsed.push(msg).is_err() {
                overflow = true;
            }
        });

        let summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                warn!("BLE: {}", e);
                self.malformed_packets = self.malformed_packets.wrapping_add(1);
                return;
            }
        };
        if summary.orphan_bytes > 0 {
            warn!(
                "BLE: {} data byte(s) without status discarded (missing timestamp byte?)",
                summary.orphan_bytes
            );
            self.orphan_bytes = self.orphan_bytes.wrapping_add(summary.orphan_bytes as u32);
        }
        let free = self.queue.capacity() - self.queue.len();
        if overflow || parsed.len() > free {
            warn!(
                "BLE: message queue full ({} queued), packet of {} messages dropped",
                self.queue.len(),
                parsed.len()
            );
            self.overflow_packets = self.overflow_packets.wrapping_add(1);
            return;
        }
        for msg in parsed {
            // Capacity checked above.
            let _ = self.queue.push_back(msg);
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    /// Bring up the Bluetooth stack and start advertising.
    #[cfg(target_os = "espidf")]
    pub fn start(&mut self) -> Result<(), TransportError> {
        gatt::start(&self.device_name)?;
        info!("BLE(espidf): advertising as '{}'", self.device_name);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn start(&mut self) -> Result<(), TransportError> {
        info!(
            "BLE(sim): advertising '{}' (service {:032x})",
            self.device_name, SERVICE_UUID
        );
        Ok(())
    }
}

// ── MidiSource implementation ─────────────────────────────────

impl MidiSource for BleMidiAdapter {
    fn is_ready(&self) -> bool {
        self.link.is_connected()
    }

    fn poll(&mut self) -> Option<RawMidiMessage> {
        self.drain_link();
        self.queue.pop_front()
    }
}

// ───────────────────────────────────────────────────────────────
// Bluedroid GATT server
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod gatt {
    use core::sync::atomic::{AtomicU32, Ordering};

    use esp_idf_svc::sys::*;

    use super::{BLE_MIDI_LINK, CHAR_MIDI_IO, SERVICE_UUID};
    use crate::error::TransportError;

    // Bluedroid callbacks are C function pointers and cannot capture
    // state, so handles live in atomics.
    static GATTS_IF: AtomicU32 = AtomicU32::new(0);
    static SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
    static MIDI_CHAR_HANDLE: AtomicU32 = AtomicU32::new(0);

    fn uuid128(uuid: u128) -> esp_bt_uuid_t {
        let mut t: esp_bt_uuid_t = unsafe { core::mem::zeroed() };
        t.len = 16;
        t.uuid.uuid128 = uuid.to_le_bytes();
        t
    }

    fn uuid16(uuid: u16) -> esp_bt_uuid_t {
        let mut t: esp_bt_uuid_t = unsafe { core::mem::zeroed() };
        t.len = 2;
        t.uuid.uuid16 = uuid;
        t
    }

    fn check(what: &str, ret: esp_err_t) -> Result<(), TransportError> {
        if ret != ESP_OK as esp_err_t {
            log::error!("BLE: {} failed ({})", what, ret);
            return Err(TransportError::BleInitFailed(ret));
        }
        Ok(())
    }

    fn adv_params() -> esp_ble_adv_params_t {
        esp_ble_adv_params_t {
            adv_int_min: 0x20,
            adv_int_max: 0x40,
            adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
            own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
            channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
            adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
            ..unsafe { core::mem::zeroed() }
        }
    }

    pub(super) fn start(device_name: &str) -> Result<(), TransportError> {
        unsafe {
            // BLE only; hand classic BT memory back to the heap.
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            check("bt_controller_init", esp_bt_controller_init(&mut bt_cfg))?;
            check(
                "bt_controller_enable",
                esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE),
            )?;
            check("bluedroid_init", esp_bluedroid_init())?;
            check("bluedroid_enable", esp_bluedroid_enable())?;

            check(
                "gap_register_callback",
                esp_ble_gap_register_callback(Some(gap_event_handler)),
            )?;
            check(
                "gatts_register_callback",
                esp_ble_gatts_register_callback(Some(gatts_event_handler)),
            )?;
            check("gatts_app_register", esp_ble_gatts_app_register(0))?;

            // Just-works pairing with bonding.
            let auth_req = esp_ble_auth_req_t_ESP_LE_AUTH_REQ_SC_BOND;
            let iocap = esp_ble_io_cap_t_ESP_IO_CAP_NONE;
            let key_size: u8 = 16;
            let keys: u8 = (ESP_BLE_ENC_KEY_MASK | ESP_BLE_ID_KEY_MASK) as u8;
            esp_ble_gap_set_security_param(
                esp_ble_sm_param_t_ESP_BLE_SM_AUTHEN_REQ_MODE,
                &auth_req as *const _ as *mut _,
                core::mem::size_of_val(&auth_req) as u8,
            );
            esp_ble_gap_set_security_param(
                esp_ble_sm_param_t_ESP_BLE_SM_IOCAP_MODE,
                &iocap as *const _ as *mut _,
                core::mem::size_of_val(&iocap) as u8,
            );
            esp_ble_gap_set_security_param(
                esp_ble_sm_param_t_ESP_BLE_SM_MAX_KEY_SIZE,
                &key_size as *const _ as *mut _,
                1,
            );
            esp_ble_gap_set_security_param(
                esp_ble_sm_param_t_ESP_BLE_SM_SET_INIT_KEY,
                &keys as *const _ as *mut _,
                1,
            );
            esp_ble_gap_set_security_param(
                esp_ble_sm_param_t_ESP_BLE_SM_SET_RSP_KEY,
                &keys as *const _ as *mut _,
                1,
            );

            let mut name = [0u8; 25];
            let len = device_name.len().min(24);
            name[..len].copy_from_slice(&device_name.as_bytes()[..len]);
            check(
                "gap_set_device_name",
                esp_ble_gap_set_device_name(name.as_ptr() as *const _),
            )?;

            // Advertising starts from the ADV_DATA_SET_COMPLETE event.
            // The stack deep-copies the advertising payload.
            let mut svc_uuid = SERVICE_UUID.to_le_bytes();
            let mut adv_data: esp_ble_adv_data_t = core::mem::zeroed();
            adv_data.set_scan_rsp = false;
            adv_data.include_name = true;
            adv_data.flag = (ESP_BLE_ADV_FLAG_GEN_DISC | ESP_BLE_ADV_FLAG_BREDR_NOT_SPT) as u8;
            adv_data.service_uuid_len = 16;
            adv_data.p_service_uuid = svc_uuid.as_mut_ptr();
            check(
                "gap_config_adv_data",
                esp_ble_gap_config_adv_data(&mut adv_data),
            )?;
        }
        Ok(())
    }

    unsafe extern "C" fn gap_event_handler(
        event: esp_gap_ble_cb_event_t,
        param: *mut esp_ble_gap_cb_param_t,
    ) {
        match event {
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_DATA_SET_COMPLETE_EVT => unsafe {
                let mut params = adv_params();
                esp_ble_gap_start_advertising(&mut params);
            },
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
                log::info!("BLE GAP: advertising started");
            }
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_SEC_REQ_EVT => unsafe {
                esp_ble_gap_security_rsp((*param).ble_security.ble_req.bd_addr.as_mut_ptr(), true);
            },
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_AUTH_CMPL_EVT => {
                let p = unsafe { &(*param).ble_security.auth_cmpl };
                if p.success {
                    log::info!("BLE GAP: authentication complete (bonded)");
                } else {
                    log::warn!("BLE GAP: authentication failed (reason={})", p.fail_reason);
                }
            }
            _ => {}
        }
    }

    unsafe extern "C" fn gatts_event_handler(
        event: esp_gatts_cb_event_t,
        gatts_if: esp_gatt_if_t,
        param: *mut esp_ble_gatts_cb_param_t,
    ) {
        GATTS_IF.store(gatts_if as u32, Ordering::Relaxed);

        match event {
            esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
                log::info!("BLE GATTS: app registered (if={})", gatts_if);
                let mut svc_id = esp_gatt_srvc_id_t {
                    id: esp_gatt_id_t {
                        uuid: uuid128(SERVICE_UUID),
                        inst_id: 0,
                    },
                    is_primary: true,
                };
                // Service decl + char decl + value + CCCD.
                unsafe { esp_ble_gatts_create_service(gatts_if, &mut svc_id, 4) };
            }
            esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
                let svc_handle = unsafe { (*param).create.service_handle };
                SVC_HANDLE.store(svc_handle as u32, Ordering::Relaxed);
                let mut char_uuid = uuid128(CHAR_MIDI_IO);
                unsafe {
                    esp_ble_gatts_start_service(svc_handle);
                    esp_ble_gatts_add_char(
                        svc_handle,
                        &mut char_uuid,
                        (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
                        (ESP_GATT_CHAR_PROP_BIT_READ
                            | ESP_GATT_CHAR_PROP_BIT_WRITE_NR
                            | ESP_GATT_CHAR_PROP_BIT_NOTIFY) as esp_gatt_char_prop_t,
                        core::ptr::null_mut(),
                        core::ptr::null_mut(),
                    );
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
                let handle = unsafe { (*param).add_char.attr_handle };
                MIDI_CHAR_HANDLE.store(handle as u32, Ordering::Relaxed);
                log::info!("BLE GATTS: MIDI I/O char (handle={})", handle);
                let mut cccd = uuid16(ESP_GATT_UUID_CHAR_CLIENT_CONFIG as u16);
                unsafe {
                    esp_ble_gatts_add_char_descr(
                        SVC_HANDLE.load(Ordering::Relaxed) as u16,
                        &mut cccd,
                        (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
                        core::ptr::null_mut(),
                        core::ptr::null_mut(),
                    );
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
                let conn_id = unsafe { (*param).connect.conn_id };
                log::info!("BLE GATTS: client connected (conn_id={})", conn_id);
                BLE_MIDI_LINK.on_central_connected();
            }
            esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
                BLE_MIDI_LINK.on_central_disconnected();
                let mut params = adv_params();
                unsafe { esp_ble_gap_start_advertising(&mut params) };
            }
            esp_gatts_cb_event_t_ESP_GATTS_READ_EVT => {
                // Reads of the MIDI characteristic return an empty payload.
                let p = unsafe { &(*param).read };
                if p.need_rsp {
                    let mut rsp: esp_gatt_rsp_t = unsafe { core::mem::zeroed() };
                    rsp.attr_value.handle = p.handle;
                    unsafe {
                        esp_ble_gatts_send_response(
                            gatts_if,
                            p.conn_id,
                            p.trans_id,
                            esp_gatt_status_t_ESP_GATT_OK,
                            &mut rsp,
                        );
                    }
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
                let p = unsafe { &(*param).write };
                if p.handle as u32 == MIDI_CHAR_HANDLE.load(Ordering::Relaxed) && !p.value.is_null() {
                    let data = unsafe { core::slice::from_raw_parts(p.value, p.len as usize) };
                    BLE_MIDI_LINK.push_packet(data);
                }
                if p.need_rsp {
                    unsafe {
                        esp_ble_gatts_send_response(
                            gatts_if,
                            p.conn_id,
                            p.trans_id,
                            esp_gatt_status_t_ESP_GATT_OK,
                            core::ptr::null_mut(),
                        );
                    }
                }
            }
            _ => {}
        }
    }
}
