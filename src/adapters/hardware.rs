//! Hardware adapter — the RMT pulse generator behind [`PulseOutput`].
//!
//! One RMT TX channel serves all twelve solenoids: before each pulse the
//! channel's output is routed to the target GPIO, then a blocking write
//! emits the high phase with the line returning to the idle (low) level
//! afterwards.  On non-espidf targets the pulse is simulated with a sleep
//! of the same length, and every pulse is recorded.

use crate::app::ports::PulseOutput;
use crate::error::PulseError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use crate::pins::PULSE_RMT_CHANNEL;

/// Longest phase a single RMT item half can hold (15-bit tick count).
const RMT_MAX_TICKS: u32 = 0x7FFF;

/// Pack one RMT item: `duration0 | level0 << 15 | duration1 << 16 | level1 << 31`.
fn rmt_item(d0: u32, l0: bool, d1: u32, l1: bool) -> u32 {
    (d0 & RMT_MAX_TICKS)
        | (u32::from(l0) << 15)
        | ((d1 & RMT_MAX_TICKS) << 16)
        | (u32::from(l1) << 31)
}

/// Encode a high pulse of `duration_us` ticks as raw RMT items.
///
/// Pulses longer than one item half are chained; the sequence always ends
/// with a zero-duration phase, which stops the transmitter.
pub fn encode_pulse(duration_us: u32) -> Vec<u32> {
    let mut items = Vec::with_capacity((duration_us / (2 * RMT_MAX_TICKS)) as usize + 2);
    let mut remaining = duration_us;

    while remaining > 0 {
        let d0 = remaining.min(RMT_MAX_TICKS);
        remaining -= d0;
        let d1 = remaining.min(RMT_MAX_TICKS);
        remaining -= d1;
        items.push(rmt_item(d0, true, d1, d1 > 0));
        if d1 == 0 {
            return items;
        }
    }
    items.push(rmt_item(0, false, 0, false));
    items
}

/// Concrete [`PulseOutput`] over the shared RMT channel.
pub struct RmtPulseOutput {
    #[cfg(not(target_os = "espidf"))]
    emitted: Vec<(u8, u32)>,
}

impl Default for RmtPulseOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl RmtPulseOutput {
    /// The channel must already be installed by
    /// [`init_pulse_rmt`](crate::drivers::hw_init::init_pulse_rmt).
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            emitted: Vec::new(),
        }
    }

    /// Pulses emitted so far as `(gpio, duration_us)`.
    #[cfg(not(target_os = "espidf"))]
    pub fn emitted(&self) -> &[(u8, u32)] {
        &self.emitted
    }
}

impl PulseOutput for RmtPulseOutput {
    #[cfg(target_os = "espidf")]
    fn emit(&mut self, gpio: u8, duration_us: u32) -> Result<(), PulseError> {
        let raw = encode_pulse(duration_us);
        // SAFETY: rmt_item32_t is a 32-bit union whose `val` member has
        // exactly the layout produced by `rmt_item`.
        let items: Vec<rmt_item32_t> = raw
            .into_iter()
            .map(|v| unsafe { core::mem::transmute::<u32, rmt_item32_t>(v) })
            .collect();

        // SAFETY: the channel is installed at boot and only this executor
        // touches it; the write blocks until the items have been sent.
        unsafe {
            let ret = rmt_set_gpio(
                PULSE_RMT_CHANNEL,
                rmt_mode_t_RMT_MODE_TX,
                gpio as gpio_num_t,
                false,
            );
            if ret != ESP_OK {
                return Err(PulseError::OutputFailed(ret));
            }
            let ret = rmt_write_items(PULSE_RMT_CHANNEL, items.as_ptr(), items.len() as i32, true);
            if ret != ESP_OK {
                return Err(PulseError::OutputFailed(ret));
            }
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn emit(&mut self, gpio: u8, duration_us: u32) -> Result<(), PulseError> {
        log::debug!("rmt(sim): GPIO{} high for {}us", gpio, duration_us);
        std::thread::sleep(std::time::Duration::from_micros(u64::from(duration_us)));
        self.emitted.push((gpio, duration_us));
        Ok(())
    }
}
