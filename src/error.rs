//! Unified error types for the bell controller firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! control loop's error handling uniform.  All variants are `Copy` so they
//! can be passed through the poll cycle without allocation.
//!
//! Nothing in the control path halts on these: a failed request marks one
//! device as timed out for one cycle, a full pulse queue drops one pulse.

use core::fmt;

use crate::app::ports::{ConfigError, StorageError};
use crate::drivers::hw_init::HwInitError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor bus exchange failed.
    Link(LinkError),
    /// A pulse could not be scheduled or emitted.
    Pulse(PulseError),
    /// Configuration was rejected or could not be loaded.
    Config(ConfigError),
    /// The persistent store failed.
    Storage(StorageError),
    /// Peripheral initialisation failed.
    HwInit(HwInitError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Pulse(e) => write!(f, "pulse: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::HwInit(e) => write!(f, "hw init: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<HwInitError> for Error {
    fn from(e: HwInitError) -> Self {
        Self::HwInit(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

/// Outcome of a failed request/response exchange.
///
/// Corrupt frames never show up here; they are dropped at the receiver and
/// surface only as a [`LinkError::Timeout`] on the pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// No valid response arrived within the request timeout.
    Timeout,
    /// The transport refused or truncated the request bytes.
    Transport,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "request timed out"),
            Self::Transport => write!(f, "transport write failed"),
        }
    }
}

impl std::error::Error for LinkError {}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Pulse errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseError {
    /// The pulse queue was full; the request was dropped.
    QueueFull,
    /// Duration was not finite, negative, or above the peripheral range.
    InvalidDuration,
    /// Actuator id has no GPIO assigned.
    UnknownActuator(u8),
    /// GPIO is not one of the solenoid outputs.
    UnknownPin(u8),
    /// The pulse peripheral reported an error code.
    OutputFailed(i32),
}

impl fmt::Display for PulseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "pulse queue full"),
            Self::InvalidDuration => write!(f, "invalid pulse duration"),
            Self::UnknownActuator(id) => write!(f, "unknown actuator {id}"),
            Self::UnknownPin(pin) => write!(f, "GPIO{pin} is not a solenoid output"),
            Self::OutputFailed(rc) => write!(f, "pulse output failed (rc={rc})"),
        }
    }
}

impl std::error::Error for PulseError {}

impl From<PulseError> for Error {
    fn from(e: PulseError) -> Self {
        Self::Pulse(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
