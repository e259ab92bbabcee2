//! NVS (Non-Volatile Storage) adapter behind [`ConfigPort`].
//!
//! Every record lives in the `prefs` namespace, which the configuration
//! collaborator reads and writes by the same names:
//!
//! ```text
//! ┌───────────────────────────┬──────┬─────────────────────────────┐
//! │ key                       │ type │ contents                    │
//! ├───────────────────────────┼──────┼─────────────────────────────┤
//! │ trig_interval, loop_delay │ i32  │ scalars, checked on write   │
//! │ loop_en                   │ i32  │ 0 or 1                      │
//! │ pulses                    │ blob │ PulseWidths (24 × f32 LE)   │
//! │ trig0 … trig11            │ blob │ RuleSet of one actuator     │
//! └───────────────────────────┴──────┴─────────────────────────────┘
//! ```
//!
//! Tables are postcard-encoded.  The postcard form of [`PulseWidths`] is
//! byte-identical to a packed C array of `{ float loop; float triggered; }`.
//! Each record is written with one set + commit, so a reader never sees
//! half a table, and nothing is written before it validates.
//!
//! The host backend keeps typed entries like NVS does: an `i32` and a blob
//! under the same name are different items, and a blob larger than the
//! read buffer is an error rather than a truncated read.

use core::fmt::Write as _;

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError};
use crate::config::{KEY_MAX_LEN, KEY_PULSE_WIDTHS, KEY_TRIGGER_PREFIX, PulseWidths, validate_scalar};
use crate::pulse::ActuatorId;
use crate::trigger::RuleSet;

#[cfg(not(target_os = "espidf"))]
use core::cell::RefCell;
#[cfg(not(target_os = "espidf"))]
use embassy_sync::blocking_mutex::Mutex;
#[cfg(not(target_os = "espidf"))]
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Largest table blob read back; both tables fit with room to spare.
const MAX_TABLE_LEN: usize = 128;

/// Key text plus room for the NUL the C API wants.
type Key = heapless::String<{ KEY_MAX_LEN + 1 }>;

// ── Records ───────────────────────────────────────────────────

/// One persisted item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Record<'a> {
    Scalar(&'a str),
    PulseWidths,
    Triggers(ActuatorId),
}

impl Record<'_> {
    fn key(self) -> Result<Key, StorageError> {
        let mut key = Key::new();
        let built = write!(key, "{}", self).is_ok();
        if !built || key.is_empty() || key.len() > KEY_MAX_LEN {
            return Err(StorageError::BadKey);
        }
        Ok(key)
    }
}

impl core::fmt::Display for Record<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Scalar(name) => f.write_str(name),
            Self::PulseWidths => f.write_str(KEY_PULSE_WIDTHS),
            Self::Triggers(a) => write!(f, "{}{}", KEY_TRIGGER_PREFIX, a.index()),
        }
    }
}

// ── Device backend ────────────────────────────────────────────

/// Open handle on the `prefs` namespace, closed on drop.
#[cfg(target_os = "espidf")]
struct Prefs(nvs_handle_t);

#[cfg(target_os = "espidf")]
fn esp_ok(ret: esp_err_t) -> Result<(), esp_err_t> {
    if ret == ESP_OK { Ok(()) } else { Err(ret) }
}

#[cfg(target_os = "espidf")]
fn storage_error(ret: esp_err_t) -> StorageError {
    if ret == ESP_ERR_NVS_NOT_FOUND {
        StorageError::NotFound
    } else if ret == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
        StorageError::Full
    } else {
        warn!("nvs: esp_err {}", ret);
        StorageError::IoError
    }
}

#[cfg(target_os = "espidf")]
fn c_key(record: Record<'_>) -> Result<Key, StorageError> {
    let mut key = record.key()?;
    key.push('\0').map_err(|_| StorageError::BadKey)?;
    Ok(key)
}

#[cfg(target_os = "espidf")]
impl Prefs {
    fn open(write: bool) -> Result<Self, StorageError> {
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        // SAFETY: the namespace is a NUL-terminated literal and `handle`
        // outlives the call.
        esp_ok(unsafe { nvs_open(c"prefs".as_ptr(), mode, &mut handle) })
            .map_err(storage_error)?;
        Ok(Self(handle))
    }

    fn get_i32(&self, record: Record<'_>) -> Result<i32, StorageError> {
        let key = c_key(record)?;
        let mut value = 0i32;
        // SAFETY: `key` is NUL-terminated and `value` is a valid out pointer.
        esp_ok(unsafe { nvs_get_i32(self.0, key.as_ptr() as *const _, &mut value) })
            .map_err(storage_error)?;
        Ok(value)
    }

    fn get_blob(&self, record: Record<'_>, buf: &mut [u8]) -> Result<usize, StorageError> {
        let key = c_key(record)?;
        let mut len = buf.len();
        // SAFETY: `buf` is writable for `len` bytes; NVS writes at most that.
        let ret = unsafe {
            nvs_get_blob(self.0, key.as_ptr() as *const _, buf.as_mut_ptr() as *mut _, &mut len)
        };
        if ret == ESP_ERR_NVS_INVALID_LENGTH {
            return Err(StorageError::TooLarge(len));
        }
        esp_ok(ret).map_err(storage_error)?;
        Ok(len)
    }

    fn set_i32(&self, record: Record<'_>, value: i32) -> Result<(), StorageError> {
        let key = c_key(record)?;
        // SAFETY: `key` is NUL-terminated.
        esp_ok(unsafe { nvs_set_i32(self.0, key.as_ptr() as *const _, value) })
            .map_err(storage_error)?;
        self.commit()
    }

    fn set_blob(&self, record: Record<'_>, data: &[u8]) -> Result<(), StorageError> {
        let key = c_key(record)?;
        // SAFETY: `data` is readable for `data.len()` bytes.
        esp_ok(unsafe {
            nvs_set_blob(self.0, key.as_ptr() as *const _, data.as_ptr() as *const _, data.len())
        })
        .map_err(storage_error)?;
        self.commit()
    }

    fn commit(&self) -> Result<(), StorageError> {
        // SAFETY: the handle is open for writing.
        esp_ok(unsafe { nvs_commit(self.0) }).map_err(storage_error)
    }
}

#[cfg(target_os = "espidf")]
impl Drop for Prefs {
    fn drop(&mut self) {
        // SAFETY: opened in `Prefs::open`, closed exactly once.
        unsafe { nvs_close(self.0) }
    }
}

/// Bring up the NVS partition, erasing it once when its layout is stale.
#[cfg(target_os = "espidf")]
fn init_flash() -> Result<(), esp_err_t> {
    // SAFETY: runs on the boot task before any handle is opened.
    let ret = unsafe { nvs_flash_init() };
    if ret != ESP_ERR_NVS_NO_FREE_PAGES && ret != ESP_ERR_NVS_NEW_VERSION_FOUND {
        return esp_ok(ret);
    }
    warn!("nvs: partition layout stale ({}), erasing", ret);
    // SAFETY: as above.
    esp_ok(unsafe { nvs_flash_erase() })?;
    esp_ok(unsafe { nvs_flash_init() })
}

// ── Host backend ──────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    I32(i32),
    Blob(Vec<u8>),
}

// ── Adapter ───────────────────────────────────────────────────

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    entries: Mutex<CriticalSectionRawMutex, RefCell<HashMap<Key, Entry>>>,
}

impl Default for NvsAdapter {
    /// An adapter over whatever the partition holds, without initialising
    /// flash.  Reads of absent records yield defaults.
    fn default() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            entries: Mutex::new(RefCell::new(HashMap::new())),
        }
    }
}

impl NvsAdapter {
    /// Initialise the NVS partition and open the adapter.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        init_flash().map_err(|e| {
            warn!("nvs: flash init failed ({})", e);
            ConfigError::IoError
        })?;
        info!("nvs: namespace 'prefs' ready");
        Ok(Self::default())
    }

    fn load_i32(&self, record: Record<'_>) -> Result<i32, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            Prefs::open(false)?.get_i32(record)
        }
        #[cfg(not(target_os = "espidf"))]
        {
            let key = record.key()?;
            self.entries.lock(|e| match e.borrow().get(&key) {
                Some(Entry::I32(v)) => Ok(*v),
                _ => Err(StorageError::NotFound),
            })
        }
    }

    fn store_i32(&self, record: Record<'_>, value: i32) -> Result<(), StorageError> {
        #[cfg(target_os = "espidf")]
        {
            Prefs::open(true)?.set_i32(record, value)
        }
        #[cfg(not(target_os = "espidf"))]
        {
            let key = record.key()?;
            self.entries.lock(|e| e.borrow_mut().insert(key, Entry::I32(value)));
            Ok(())
        }
    }

    fn load_blob(&self, record: Record<'_>, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            Prefs::open(false)?.get_blob(record, buf)
        }
        #[cfg(not(target_os = "espidf"))]
        {
            let key = record.key()?;
            self.entries.lock(|e| match e.borrow().get(&key) {
                Some(Entry::Blob(data)) if data.len() > buf.len() => {
                    Err(StorageError::TooLarge(data.len()))
                }
                Some(Entry::Blob(data)) => {
                    buf[..data.len()].copy_from_slice(data);
                    Ok(data.len())
                }
                _ => Err(StorageError::NotFound),
            })
        }
    }

    fn store_blob(&self, record: Record<'_>, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(target_os = "espidf")]
        {
            Prefs::open(true)?.set_blob(record, data)
        }
        #[cfg(not(target_os = "espidf"))]
        {
            let key = record.key()?;
            self.entries
                .lock(|e| e.borrow_mut().insert(key, Entry::Blob(data.to_vec())));
            Ok(())
        }
    }

    /// Decoded table, `None` when absent or unreadable.
    fn load_table<T: serde::de::DeserializeOwned>(&self, record: Record<'_>) -> Option<T> {
        let mut buf = [0u8; MAX_TABLE_LEN];
        let len = match self.load_blob(record, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => return None,
            Err(e) => {
                warn!("nvs: reading '{}' failed: {}", record, e);
                return None;
            }
        };
        postcard::from_bytes(&buf[..len])
            .map_err(|_| warn!("nvs: '{}' is corrupted, using defaults", record))
            .ok()
    }

    fn store_table<T: serde::Serialize>(&self, record: Record<'_>, table: &T) -> Result<(), ConfigError> {
        let mut buf = [0u8; MAX_TABLE_LEN];
        let bytes = postcard::to_slice(table, &mut buf).map_err(|_| ConfigError::IoError)?;
        self.store_blob(record, bytes).map_err(|e| {
            warn!("nvs: writing '{}' failed: {}", record, e);
            ConfigError::from(e)
        })?;
        info!("nvs: '{}' saved ({} bytes)", record, bytes.len());
        Ok(())
    }
}

impl ConfigPort for NvsAdapter {
    fn get_i32(&self, key: &str) -> Option<i32> {
        match self.load_i32(Record::Scalar(key)) {
            Ok(v) => Some(v),
            Err(StorageError::NotFound) => None,
            Err(e) => {
                warn!("nvs: reading '{}' failed: {}", key, e);
                None
            }
        }
    }

    fn set_i32(&self, key: &str, value: i32) -> Result<(), ConfigError> {
        validate_scalar(key, value)?;
        self.store_i32(Record::Scalar(key), value).map_err(|e| {
            warn!("nvs: writing '{}' failed: {}", key, e);
            ConfigError::from(e)
        })
    }

    fn pulse_widths(&self) -> PulseWidths {
        match self.load_table::<PulseWidths>(Record::PulseWidths) {
            Some(w) if w.validate().is_ok() => w,
            Some(_) => {
                warn!("nvs: stored pulse widths out of range, using defaults");
                PulseWidths::default()
            }
            None => PulseWidths::default(),
        }
    }

    fn set_pulse_widths(&self, widths: &PulseWidths) -> Result<(), ConfigError> {
        widths.validate()?;
        self.store_table(Record::PulseWidths, widths)
    }

    fn trigger_rules(&self, actuator: ActuatorId) -> RuleSet {
        self.load_table(Record::Triggers(actuator)).unwrap_or_default()
    }

    fn set_trigger_rules(&self, actuator: ActuatorId, rules: &RuleSet) -> Result<(), ConfigError> {
        self.store_table(Record::Triggers(actuator), rules)
    }
}
