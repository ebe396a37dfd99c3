//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] for the relay mapping configuration.  The
//! whole [`SystemConfig`] is stored as one postcard blob.
//!
//! - Values are range-checked before persisting and again after loading.
//! - Relay state is never written here; every boot starts all-off.
//! - ESP-IDF NVS commits are atomic per `nvs_commit()`.

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;
use crate::relay::RELAY_COUNT;
use log::info;

#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg_attr(target_os = "espidf", allow(dead_code))]
const CONFIG_NAMESPACE: &str = "midimiti";
#[cfg_attr(target_os = "espidf", allow(dead_code))]
const CONFIG_KEY: &str = "relaycfg";

#[cfg(target_os = "espidf")]
const CONFIG_NAMESPACE_C: &[u8] = b"midimiti\0";
#[cfg(target_os = "espidf")]
const CONFIG_KEY_C: &[u8] = b"relaycfg\0";

#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 256;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS use.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t
                || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t
            {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK as esp_err_t {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK as esp_err_t {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK as esp_err_t {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key() -> String {
        format!("{}::{}", CONFIG_NAMESPACE, CONFIG_KEY)
    }

    /// Store raw bytes under the config key, bypassing validation.
    /// Simulation only; lets tests plant a stale or damaged blob.
    #[cfg(not(target_os = "espidf"))]
    pub fn write_raw_blob(&self, bytes: &[u8]) {
        self.store
            .borrow_mut()
            .insert(Self::composite_key(), bytes.to_vec());
    }

    /// Remove the stored config so the next load yields defaults.
    pub fn erase(&self) -> Result<(), ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store.borrow_mut().remove(&Self::composite_key());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            Self::with_nvs_handle(true, |handle| {
                let ret = unsafe { nvs_erase_key(handle, CONFIG_KEY_C.as_ptr() as *const _) };
                if ret != ESP_OK as esp_err_t && ret != ESP_ERR_NVS_NOT_FOUND as esp_err_t {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK as esp_err_t {
                    return Err(ret);
                }
                Ok(())
            })
            .map_err(|_| ConfigError::IoError)
        }
    }

    /// Open the config namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(CONFIG_NAMESPACE_C.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK as esp_err_t {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            Ok(self.store.borrow().get(&Self::composite_key()).cloned())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(false, |handle| {
                let mut size: usize = 0;
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        CONFIG_KEY_C.as_ptr() as *const _,
                        core::ptr::null_mut(),
                        &mut size,
                    )
                };
                if ret != ESP_OK as esp_err_t {
                    return Err(ret);
                }
                if size == 0 || size > MAX_BLOB_SIZE {
                    return Err(ESP_ERR_NVS_INVALID_LENGTH as esp_err_t);
                }

                let mut buf = vec![0u8; size];
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        CONFIG_KEY_C.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK as esp_err_t {
                    return Err(ret);
                }
                buf.truncate(size);
                Ok(buf)
            });

            match result {
                Ok(bytes) => Ok(Some(bytes)),
                // A namespace that was never written fails to open read-only.
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND as esp_err_t => Ok(None),
                Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH as esp_err_t => Err(ConfigError::Corrupted),
                Err(e) => {
                    warn!("NvsAdapter: NVS read error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }

    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.write_raw_blob(bytes);
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            Self::with_nvs_handle(true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        CONFIG_KEY_C.as_ptr() as *const _,
                        bytes.as_ptr() as *const _,
                        bytes.len(),
                    )
                };
                if ret != ESP_OK as esp_err_t {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK as esp_err_t {
                    return Err(ret);
                }
                Ok(())
            })
            .map_err(|e| {
                warn!("NvsAdapter: NVS write error {}", e);
                ConfigError::IoError
            })
        }
    }
}

fn has_duplicates(table: &[u8; RELAY_COUNT]) -> bool {
    table
        .iter()
        .enumerate()
        .any(|(i, v)| table[i + 1..].contains(v))
}

/// Range-check every field.  Used before persisting and after loading.
pub fn validate_config(cfg: &SystemConfig) -> Result<(), ConfigError> {
    if cfg.relay_notes.iter().any(|&n| n > 127) {
        return Err(ConfigError::ValidationFailed("relay_notes must be 0–127"));
    }
    if has_duplicates(&cfg.relay_notes) {
        return Err(ConfigError::ValidationFailed("relay_notes must be distinct"));
    }
    if cfg.relay_controllers.iter().any(|&c| c > 127) {
        return Err(ConfigError::ValidationFailed(
            "relay_controllers must be 0–127",
        ));
    }
    if has_duplicates(&cfg.relay_controllers) {
        return Err(ConfigError::ValidationFailed(
            "relay_controllers must be distinct",
        ));
    }
    if cfg.relay_programs.iter().any(|&p| p > 127) {
        return Err(ConfigError::ValidationFailed("relay_programs must be 0–127"));
    }
    if has_duplicates(&cfg.relay_programs) {
        return Err(ConfigError::ValidationFailed(
            "relay_programs must be distinct",
        ));
    }
    if !(1..=127).contains(&cfg.cc_on_threshold) {
        return Err(ConfigError::ValidationFailed(
            "cc_on_threshold must be 1–127",
        ));
    }
    if cfg.channel_filter.is_some_and(|ch| ch > 15) {
        return Err(ConfigError::ValidationFailed("channel_filter must be 0–15"));
    }
    if !(1..=100).contains(&cfg.poll_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "poll_interval_ms must be 1–100",
        ));
    }
    let name = cfg.ble_device_name.as_str();
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
        return Err(ConfigError::ValidationFailed(
            "ble_device_name must be non-empty printable ASCII",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    /// No stored blob yields defaults.  A blob that fails to decode or
    /// validate is reported so the caller can fall back explicitly.
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let Some(bytes) = self.read_blob()? else {
            info!("NvsAdapter: no stored config, using defaults");
            return Ok(SystemConfig::default());
        };
        let cfg: SystemConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        validate_config(&cfg)?;
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.write_blob(&bytes)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}
