//! Port traits — the hexagonal boundary between the control path and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller (domain)
//! ```
//!
//! Driven adapters (pulse peripheral, configuration store, notification
//! sink, clock) implement these traits.  The
//! [`Controller`](super::service::Controller) and the pulse/loop tasks
//! consume them via generics, so the control path never touches hardware
//! directly.  The serial side has its own trait in
//! [`link::transport`](crate::link::transport).
//!
//! ## Contract notes
//!
//! - **ConfigPort** implementations MUST validate before persisting and MUST
//!   replace tables as whole records, so a reader never sees half a table.
//! - **ConfigPort** readers get copies; nothing is cached across cycles.

use crate::config::PulseWidths;
use crate::error::PulseError;
use crate::pulse::ActuatorId;
use crate::trigger::{RuleSet, TriggerTable};

// ───────────────────────────────────────────────────────────────
// Pulse output port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// A hardware-timed one-shot pulse generator shared by every actuator.
pub trait PulseOutput {
    /// Drive `gpio` high for `duration_us` microseconds, then low.
    ///
    /// Blocks until the pulse has been fully emitted.  Timing comes from
    /// the peripheral, not from a software delay.
    fn emit(&mut self, gpio: u8, duration_us: u32) -> Result<(), PulseError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / observers)
// ───────────────────────────────────────────────────────────────

/// The control path emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Delivery is best effort.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time source.
pub trait TimePort {
    /// Milliseconds since boot.
    fn uptime_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ configuration store)
// ───────────────────────────────────────────────────────────────

/// Named-value configuration shared with the external configuration API.
///
/// Every method takes `&self`: the store is shared between the poll loop,
/// the loop driver and the collaborator that writes it, so implementations
/// use interior mutability.
///
/// # Validation
///
/// Setters reject invalid input with [`ConfigError::ValidationFailed`]
/// and leave the stored value untouched.
pub trait ConfigPort {
    /// Read an integer scalar, `None` when absent.
    fn get_i32(&self, key: &str) -> Option<i32>;

    /// Validate and persist an integer scalar.
    fn set_i32(&self, key: &str, value: i32) -> Result<(), ConfigError>;

    /// Current pulse-width table (defaults when absent).
    fn pulse_widths(&self) -> PulseWidths;

    /// Validate and replace the whole pulse-width table.
    fn set_pulse_widths(&self, widths: &PulseWidths) -> Result<(), ConfigError>;

    /// Current trigger rules of one actuator (all disabled when absent).
    fn trigger_rules(&self, actuator: ActuatorId) -> RuleSet;

    /// Replace the trigger rules of one actuator.
    fn set_trigger_rules(&self, actuator: ActuatorId, rules: &RuleSet) -> Result<(), ConfigError>;

    /// Snapshot of every actuator's rules.
    fn trigger_table(&self) -> TriggerTable {
        let mut table = TriggerTable::default();
        for actuator in ActuatorId::all() {
            table.set(actuator, self.trigger_rules(actuator));
        }
        table
    }
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored record failed deserialization.
    Corrupted,
    /// A value failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from the persistent store behind a [`ConfigPort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Key empty or longer than the store allows.
    BadKey,
    /// Stored value (this many bytes) does not fit the read buffer.
    TooLarge(usize),
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::BadKey => write!(f, "invalid key"),
            Self::TooLarge(len) => write!(f, "stored value too large ({} bytes)", len),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Full => Self::StorageFull,
            StorageError::BadKey => Self::ValidationFailed("key must be 1-15 bytes"),
            StorageError::TooLarge(_) => Self::Corrupted,
            StorageError::NotFound | StorageError::IoError => Self::IoError,
        }
    }
}
