//! Pulse scheduler — turns "fire actuator X for N ms" into timed GPIO pulses.
//!
//! ```text
//!  poll loop ─┐
//!  loop task ─┼─▶ PulseQueue (8) ──▶ PulseExecutor ──▶ PulseOutput (RMT)
//!  commands ──┘    try_send, drop     one at a time,
//!                  + count on full    FIFO, no overlap
//! ```
//!
//! Producers never block.  The executor is the only consumer.

pub mod executor;
pub mod queue;

pub use executor::PulseExecutor;
pub use queue::{PULSE_QUEUE_DEPTH, PulseQueue};

use crate::config::MAX_PULSE_MS;
use crate::error::PulseError;
use crate::pins::{SOLENOID_COUNT, SOLENOID_GPIO};

/// Index of a solenoid actuator (0..SOLENOID_COUNT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActuatorId(u8);

impl ActuatorId {
    pub const FIRST: Self = Self(0);

    pub fn new(id: u8) -> Option<Self> {
        ((id as usize) < SOLENOID_COUNT).then_some(Self(id))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn gpio(self) -> u8 {
        SOLENOID_GPIO[self.index()]
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..SOLENOID_COUNT as u8).map(Self)
    }

    /// The following actuator, wrapping from the last back to the first.
    pub fn wrapping_next(self) -> Self {
        Self((self.0 + 1) % SOLENOID_COUNT as u8)
    }
}

impl core::fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One queued pulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseRequest {
    /// Output GPIO.
    pub pin: u8,
    pub duration_ms: f32,
}

/// Milliseconds to peripheral ticks (1 tick = 1 µs), rounded to nearest.
pub fn ms_to_us(ms: f32) -> Result<u32, PulseError> {
    if !ms.is_finite() || !(0.0..=MAX_PULSE_MS).contains(&ms) {
        return Err(PulseError::InvalidDuration);
    }
    Ok((ms * 1000.0).round() as u32)
}
