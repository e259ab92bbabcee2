//! Clock and delay adapters.
//!
//! - **`target_os = "espidf"`** wraps `esp_timer_get_time()` (microsecond
//!   precision, monotonic) and FreeRTOS task delays.
//! - **`not(target_os = "espidf")`** uses `std::time::Instant` and thread
//!   sleeps for host-side testing and simulation.

#[cfg(not(target_os = "espidf"))]
use embedded_hal::delay::DelayNs;

use crate::app::ports::TimePort;

/// Monotonic clock since boot (or since construction on the host).
pub struct MonotonicClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot.
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl TimePort for MonotonicClock {
    fn uptime_ms(&self) -> u64 {
        self.uptime_us() / 1_000
    }
}

/// Blocking delay for the loop driver and the poll loop.
#[cfg(target_os = "espidf")]
pub type TaskDelay = esp_idf_hal::delay::FreeRtos;

/// Blocking delay for the loop driver and the poll loop.
#[derive(Debug, Default, Clone, Copy)]
#[cfg(not(target_os = "espidf"))]
pub struct TaskDelay;

#[cfg(not(target_os = "espidf"))]
impl DelayNs for TaskDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(core::time::Duration::from_nanos(ns as u64));
    }
}
