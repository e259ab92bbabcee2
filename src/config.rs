//! System configuration parameters
//!
//! Tunable parameters live in the configuration store (NVS on the device)
//! under short string keys, because the external configuration API reads
//! and writes them by name.  This module names those keys, documents the
//! default each one takes when absent, and holds the typed records the
//! control path reads at the start of every use.

use serde::{Deserialize, Serialize};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::pins::SOLENOID_COUNT;

// ---------------------------------------------------------------------------
// Store keys
// ---------------------------------------------------------------------------

/// Minimum milliseconds between two trigger fires of the same actuator.
pub const KEY_TRIGGER_INTERVAL: &str = "trig_interval";
/// Milliseconds the loop driver waits between two actuators.
pub const KEY_LOOP_DELAY: &str = "loop_delay";
/// Non-zero enables the loop driver.
pub const KEY_LOOP_ENABLED: &str = "loop_en";
/// Blob key for the [`PulseWidths`] table.
pub const KEY_PULSE_WIDTHS: &str = "pulses";
/// Blob key prefix for per-actuator trigger rules (`trig0` … `trig11`).
pub const KEY_TRIGGER_PREFIX: &str = "trig";
/// Longest key the store accepts (NVS limit).
pub const KEY_MAX_LEN: usize = 15;

pub const DEFAULT_TRIGGER_INTERVAL_MS: i32 = 1000;
pub const DEFAULT_LOOP_DELAY_MS: i32 = 500;
pub const DEFAULT_LOOP_ENABLED: i32 = 0;

// ---------------------------------------------------------------------------
// Fixed timing
// ---------------------------------------------------------------------------

/// Poll cycle period.
pub const POLL_INTERVAL_MS: u64 = 50;
/// Bounded wait for one device response.
pub const REQUEST_TIMEOUT_MS: u64 = 100;
/// Loop driver recheck period while disabled.
pub const LOOP_DISABLED_RECHECK_MS: u32 = 1000;

/// Longest pulse the RMT peripheral can address at a 1 MHz tick.
pub const MAX_PULSE_MS: f32 = 32_767.0;

/// Upper bound accepted for the millisecond scalars.
const MAX_INTERVAL_MS: i32 = 600_000;

// ---------------------------------------------------------------------------
// Scalar settings
// ---------------------------------------------------------------------------

/// Typed view of the scalar keys, read fresh at the start of each use.
///
/// Not persisted as a record: each field is its own `i32` store entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Debounce interval between trigger fires of one actuator (ms).
    pub trigger_interval_ms: u64,
    /// Delay between consecutive loop pulses (ms).
    pub loop_delay_ms: u32,
    /// Whether the loop driver emits pulses.
    pub loop_enabled: bool,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            trigger_interval_ms: DEFAULT_TRIGGER_INTERVAL_MS as u64,
            loop_delay_ms: DEFAULT_LOOP_DELAY_MS as u32,
            loop_enabled: DEFAULT_LOOP_ENABLED != 0,
        }
    }
}

impl ControllerSettings {
    /// Read every scalar from the store, substituting defaults for absent keys.
    pub fn load(store: &impl ConfigPort) -> Self {
        let get = |key, default: i32| store.get_i32(key).unwrap_or(default);
        Self {
            trigger_interval_ms: get(KEY_TRIGGER_INTERVAL, DEFAULT_TRIGGER_INTERVAL_MS).max(0)
                as u64,
            loop_delay_ms: get(KEY_LOOP_DELAY, DEFAULT_LOOP_DELAY_MS).max(0) as u32,
            loop_enabled: get(KEY_LOOP_ENABLED, DEFAULT_LOOP_ENABLED) != 0,
        }
    }
}

/// Range-check a scalar before it is persisted.
///
/// Keys this crate does not know are accepted unchanged; the store is shared
/// with the network collaborators.
pub fn validate_scalar(key: &str, value: i32) -> Result<(), ConfigError> {
    match key {
        KEY_TRIGGER_INTERVAL if !(0..=MAX_INTERVAL_MS).contains(&value) => Err(
            ConfigError::ValidationFailed("trig_interval must be 0–600000 ms"),
        ),
        KEY_LOOP_DELAY if !(0..=MAX_INTERVAL_MS).contains(&value) => Err(
            ConfigError::ValidationFailed("loop_delay must be 0–600000 ms"),
        ),
        KEY_LOOP_ENABLED if !(0..=1).contains(&value) => {
            Err(ConfigError::ValidationFailed("loop_en must be 0 or 1"))
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Pulse widths
// ---------------------------------------------------------------------------

/// Per-actuator pulse durations in milliseconds.
///
/// The serde form is the persisted `pulses` record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PulseWidth {
    /// Used by the periodic loop driver.
    pub loop_ms: f32,
    /// Used when a trigger rule fires.
    pub triggered_ms: f32,
}

/// The whole pulse-width table; replaced as one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PulseWidths(pub [PulseWidth; SOLENOID_COUNT]);

impl PulseWidths {
    pub fn get(&self, actuator: usize) -> PulseWidth {
        self.0.get(actuator).copied().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ok = |ms: f32| ms.is_finite() && (0.0..=MAX_PULSE_MS).contains(&ms);
        if self.0.iter().all(|w| ok(w.loop_ms) && ok(w.triggered_ms)) {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed(
                "pulse widths must be finite and 0–32767 ms",
            ))
        }
    }

    /// Parse the collaborator text form `"l0,t0,l1,t1,…"` (12 pairs).
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut fields = split_fields(text);
        let mut widths = Self::default();
        for w in &mut widths.0 {
            let loop_ms = next_field::<f32>(&mut fields)?;
            let triggered_ms = next_field::<f32>(&mut fields)?;
            *w = PulseWidth { loop_ms, triggered_ms };
        }
        if fields.next().is_some() {
            return Err(ConfigError::ValidationFailed("too many pulse width fields"));
        }
        widths.validate()?;
        Ok(widths)
    }

    /// Observer report: `[[loop_ms,triggered_ms],…]`.
    pub fn to_json(&self) -> String {
        let pairs: Vec<[f32; 2]> = self.0.iter().map(|w| [w.loop_ms, w.triggered_ms]).collect();
        serde_json::to_string(&pairs).unwrap_or_default()
    }
}

/// Comma-separated fields with surrounding whitespace and one trailing
/// separator removed.
pub(crate) fn split_fields(text: &str) -> impl Iterator<Item = &str> {
    let text = text.trim();
    let text = text.strip_suffix(',').unwrap_or(text);
    text.split(',').map(str::trim).filter(|f| !f.is_empty())
}

pub(crate) fn next_field<'a, T: core::str::FromStr>(
    fields: &mut impl Iterator<Item = &'a str>,
) -> Result<T, ConfigError> {
    fields
        .next()
        .ok_or(ConfigError::ValidationFailed("too few fields"))?
        .parse()
        .map_err(|_| ConfigError::ValidationFailed("field is not a number"))
}
