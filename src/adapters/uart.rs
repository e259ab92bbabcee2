//! Sensor-bus UART adapter.
//!
//! - [`UartBus`] is the transmit half and implements the link
//!   [`Transport`].  RS-485 direction switching is done by the driver.
//! - [`UartReceiver`] is the receive task.  On the device it waits on the
//!   UART driver's event queue for trailer-pattern events, reads exactly one
//!   frame and hands it to the [`LinkInbox`].  On other targets bytes are
//!   pushed in with [`UartReceiver::feed`] and framed in software.
//!
//! ```text
//!  UART1 RX ──▶ pattern det (A5×4) ──▶ UartReceiver ──▶ LinkInbox::on_frame
//!  Poller ──▶ UartBus::write ──▶ UART1 TX (RS-485 DE)
//! ```

use std::sync::Arc;

use crate::link::{LinkInbox, Transport};

#[cfg(not(target_os = "espidf"))]
use crate::link::FrameAssembler;

#[cfg(target_os = "espidf")]
use crate::link::packet::{RX_BUFFER_LEN, TRAILER};
#[cfg(target_os = "espidf")]
use crate::pins::SENSOR_UART_NUM;
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::{error, info, warn};

/// Errors reported by the UART driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartError(pub i32);

// ── Transmit half ─────────────────────────────────────────────

pub struct UartBus {
    #[cfg(not(target_os = "espidf"))]
    sent: Vec<u8>,
}

impl Default for UartBus {
    fn default() -> Self {
        Self::new()
    }
}

impl UartBus {
    /// The driver must already be installed by
    /// [`init_sensor_uart`](crate::drivers::hw_init::init_sensor_uart).
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            sent: Vec::new(),
        }
    }

    /// Bytes written since the last call.
    #[cfg(not(target_os = "espidf"))]
    pub fn take_sent(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.sent)
    }
}

impl Transport for UartBus {
    type Error = UartError;

    #[cfg(target_os = "espidf")]
    fn write(&mut self, data: &[u8]) -> Result<usize, UartError> {
        // SAFETY: the driver is installed and only the poller writes.
        let n = unsafe { uart_write_bytes(SENSOR_UART_NUM, data.as_ptr() as *const _, data.len()) };
        if n < 0 {
            return Err(UartError(n));
        }
        Ok(n as usize)
    }

    #[cfg(not(target_os = "espidf"))]
    fn write(&mut self, data: &[u8]) -> Result<usize, UartError> {
        self.sent.extend_from_slice(data);
        Ok(data.len())
    }

    #[cfg(target_os = "espidf")]
    fn flush(&mut self) -> Result<(), UartError> {
        // Bounded by the request timeout budget.
        let ret = unsafe { uart_wait_tx_done(SENSOR_UART_NUM, 10) };
        if ret != ESP_OK {
            return Err(UartError(ret));
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn flush(&mut self) -> Result<(), UartError> {
        Ok(())
    }
}

// ── Receive half ──────────────────────────────────────────────

/// FreeRTOS queue handle owned by the receive task.
#[cfg(target_os = "espidf")]
struct EventQueue(QueueHandle_t);

// SAFETY: FreeRTOS queues may be used from any task; the handle is moved
// into the receive task and used only there.
#[cfg(target_os = "espidf")]
unsafe impl Send for EventQueue {}

pub struct UartReceiver {
    inbox: Arc<LinkInbox>,
    #[cfg(target_os = "espidf")]
    queue: EventQueue,
    #[cfg(not(target_os = "espidf"))]
    assembler: FrameAssembler,
}

impl UartReceiver {
    #[cfg(target_os = "espidf")]
    pub fn new(inbox: Arc<LinkInbox>, queue: QueueHandle_t) -> Self {
        Self {
            inbox,
            queue: EventQueue(queue),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(inbox: Arc<LinkInbox>) -> Self {
        Self {
            inbox,
            assembler: FrameAssembler::new(),
        }
    }

    /// Push received bytes through the software frame assembler.
    #[cfg(not(target_os = "espidf"))]
    pub fn feed(&mut self, bytes: &[u8]) {
        let inbox = &self.inbox;
        self.assembler.feed(bytes, |frame| match frame {
            Ok(body) => {
                let _ = inbox.on_frame(body);
            }
            Err(crate::link::FrameError::Overflow(len)) => inbox.on_overflow(len),
            Err(_) => {}
        });
    }

    /// Receive task body.  Never returns.
    #[cfg(target_os = "espidf")]
    pub fn run(self) -> ! {
        let mut buf = [0u8; RX_BUFFER_LEN];
        info!("uart-rx: waiting for frames");
        loop {
            let mut evt: uart_event_t = Default::default();
            // SAFETY: `evt` outlives the call and matches the queue item size.
            let got = unsafe {
                xQueueReceive(self.queue.0, (&raw mut evt).cast(), u32::MAX)
            };
            if got != 1 {
                continue;
            }

            #[allow(non_upper_case_globals)]
            match evt.type_ {
                uart_event_type_t_UART_PATTERN_DET => self.read_frame(&mut buf),
                uart_event_type_t_UART_FIFO_OVF | uart_event_type_t_UART_BUFFER_FULL => {
                    warn!("uart-rx: driver overflow");
                    self.inbox.on_overflow(RX_BUFFER_LEN + 1);
                    self.flush();
                }
                _ => {}
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn read_frame(&self, buf: &mut [u8; RX_BUFFER_LEN]) {
        // SAFETY: driver installed; only this task reads.
        let pos = unsafe { uart_pattern_pop_pos(SENSOR_UART_NUM) };
        if pos < 0 {
            error!("uart-rx: pattern queue overflow");
            self.inbox.on_overflow(RX_BUFFER_LEN + 1);
            self.flush();
            return;
        }

        let total = pos as usize + TRAILER.len();
        if total > RX_BUFFER_LEN {
            self.inbox.on_overflow(total);
            self.flush();
            return;
        }

        let n = unsafe {
            uart_read_bytes(SENSOR_UART_NUM, buf.as_mut_ptr().cast(), total as u32, 0)
        };
        if n < total as i32 {
            warn!("uart-rx: short read ({} of {} bytes)", n, total);
            return;
        }
        let _ = self.inbox.on_frame(&buf[..pos as usize]);
    }

    #[cfg(target_os = "espidf")]
    fn flush(&self) {
        unsafe {
            uart_flush_input(SENSOR_UART_NUM);
            xQueueGenericReset(self.queue.0, 0);
            uart_pattern_queue_reset(SENSOR_UART_NUM, crate::pins::SENSOR_UART_EVENT_QUEUE_LEN);
        }
    }
}
