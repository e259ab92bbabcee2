//! Bounded pulse queue shared by every producer.

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use super::{ActuatorId, PulseRequest, ms_to_us};
use crate::error::PulseError;
use crate::pins::SOLENOID_GPIO;

/// Pending pulses held before producers start dropping.
pub const PULSE_QUEUE_DEPTH: usize = 8;

/// Multi-producer, single-consumer FIFO of [`PulseRequest`]s.
pub struct PulseQueue {
    channel: Channel<CriticalSectionRawMutex, PulseRequest, PULSE_QUEUE_DEPTH>,
    accepted: AtomicU32,
    dropped: AtomicU32,
    rejected: AtomicU32,
}

impl Default for PulseQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            accepted: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            rejected: AtomicU32::new(0),
        }
    }

    /// Queue a pulse without blocking.
    ///
    /// A full queue drops the request and counts it; an invalid pin or
    /// duration is rejected and counted separately.  Neither is fatal.
    pub fn enqueue(&self, pin: u8, duration_ms: f32) -> Result<(), PulseError> {
        if !SOLENOID_GPIO.contains(&pin) {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            warn!("pulse: GPIO{} is not a solenoid output", pin);
            return Err(PulseError::UnknownPin(pin));
        }
        if let Err(e) = ms_to_us(duration_ms) {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            warn!("pulse: rejected {}ms on GPIO{}", duration_ms, pin);
            return Err(e);
        }

        match self.channel.try_send(PulseRequest { pin, duration_ms }) {
            Ok(()) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(_) => {
                let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("pulse: queue full, dropped GPIO{} ({} dropped total)", pin, n);
                Err(PulseError::QueueFull)
            }
        }
    }

    /// Queue a pulse on an actuator's GPIO.
    pub fn fire(&self, actuator: ActuatorId, duration_ms: f32) -> Result<(), PulseError> {
        self.enqueue(actuator.gpio(), duration_ms)
    }

    /// Wait for the next request.
    pub async fn next(&self) -> PulseRequest {
        self.channel.receive().await
    }

    /// Next request if one is already queued.
    pub fn try_next(&self) -> Option<PulseRequest> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    pub fn accepted(&self) -> u32 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Requests lost to a full queue.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Requests refused for an invalid pin or duration.
    pub fn rejected(&self) -> u32 {
        self.rejected.load(Ordering::Relaxed)
    }
}
