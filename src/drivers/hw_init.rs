//! One-shot hardware peripheral initialization.
//!
//! Configures the solenoid GPIOs, the RMT pulse channel and the RS-485
//! sensor UART using raw ESP-IDF sys calls. Called once from `main()`
//! before any task starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::link::packet::{RX_BUFFER_LEN, TRAILER};
#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    RmtInitFailed(i32),
    UartInitFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::RmtInitFailed(rc) => write!(f, "RMT init failed (rc={})", rc),
            Self::UartInitFailed(rc) => write!(f, "UART init failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

#[cfg(target_os = "espidf")]
fn check(ret: esp_err_t, err: fn(i32) -> HwInitError) -> Result<(), HwInitError> {
    if ret == ESP_OK { Ok(()) } else { Err(err(ret)) }
}

// ── Solenoid outputs ──────────────────────────────────────────

/// Drive every solenoid GPIO low as an output.
#[cfg(target_os = "espidf")]
pub fn init_solenoid_outputs() -> Result<(), HwInitError> {
    for &pin in &pins::SOLENOID_GPIO {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: boot path, single-threaded, pin taken from the board table.
        check(unsafe { gpio_config(&cfg) }, HwInitError::GpioConfigFailed)?;
        unsafe { gpio_set_level(pin as i32, 0) };
    }
    info!("hw_init: {} solenoid outputs low", pins::SOLENOID_COUNT);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_solenoid_outputs() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): solenoid outputs skipped");
    Ok(())
}

// ── RMT pulse channel ─────────────────────────────────────────

/// Install the TX channel shared by every solenoid: 1 MHz tick, idle low,
/// no carrier, no loop.
#[cfg(target_os = "espidf")]
pub fn init_pulse_rmt() -> Result<(), HwInitError> {
    let mut cfg: rmt_config_t = unsafe { core::mem::zeroed() };
    cfg.rmt_mode = rmt_mode_t_RMT_MODE_TX;
    cfg.channel = pins::PULSE_RMT_CHANNEL;
    cfg.gpio_num = pins::SOLENOID_GPIO[0] as i32;
    cfg.clk_div = pins::PULSE_RMT_CLK_DIV;
    cfg.mem_block_num = 1;
    // SAFETY: `tx_config` is the active union member for RMT_MODE_TX.
    unsafe {
        cfg.__bindgen_anon_1.tx_config.loop_en = false;
        cfg.__bindgen_anon_1.tx_config.carrier_en = false;
        cfg.__bindgen_anon_1.tx_config.idle_output_en = true;
        cfg.__bindgen_anon_1.tx_config.idle_level = rmt_idle_level_t_RMT_IDLE_LEVEL_LOW;
    }

    check(unsafe { rmt_config(&cfg) }, HwInitError::RmtInitFailed)?;
    check(
        unsafe { rmt_driver_install(pins::PULSE_RMT_CHANNEL, 0, 0) },
        HwInitError::RmtInitFailed,
    )?;
    info!("hw_init: RMT channel {} ready (1 MHz)", pins::PULSE_RMT_CHANNEL);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_pulse_rmt() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): RMT init skipped");
    Ok(())
}

// ── Sensor UART ───────────────────────────────────────────────

/// Install the RS-485 half-duplex UART driver with trailer pattern
/// detection.  Returns the driver's event queue.
#[cfg(target_os = "espidf")]
pub fn init_sensor_uart() -> Result<QueueHandle_t, HwInitError> {
    let port = pins::SENSOR_UART_NUM;
    let cfg = uart_config_t {
        baud_rate: pins::SENSOR_UART_BAUD as i32,
        data_bits: uart_word_length_t_UART_DATA_8_BITS,
        parity: uart_parity_t_UART_PARITY_DISABLE,
        stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
        flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
        rx_flow_ctrl_thresh: 122,
        ..Default::default()
    };

    let mut queue: QueueHandle_t = core::ptr::null_mut();
    // SAFETY: boot path; the driver is installed exactly once.
    unsafe {
        check(
            uart_driver_install(
                port,
                (RX_BUFFER_LEN * 2) as i32,
                0,
                pins::SENSOR_UART_EVENT_QUEUE_LEN,
                &mut queue,
                0,
            ),
            HwInitError::UartInitFailed,
        )?;
        check(uart_param_config(port, &cfg), HwInitError::UartInitFailed)?;
        check(
            uart_set_pin(
                port,
                pins::SENSOR_UART_TX_GPIO,
                pins::SENSOR_UART_RX_GPIO,
                UART_PIN_NO_CHANGE,
                UART_PIN_NO_CHANGE,
            ),
            HwInitError::UartInitFailed,
        )?;
        check(
            uart_set_mode(port, uart_mode_t_UART_MODE_RS485_HALF_DUPLEX),
            HwInitError::UartInitFailed,
        )?;
        check(
            uart_enable_pattern_det_baud_intr(port, TRAILER[0] as i8, TRAILER.len() as u8, 9, 0, 0),
            HwInitError::UartInitFailed,
        )?;
        check(
            uart_pattern_queue_reset(port, pins::SENSOR_UART_EVENT_QUEUE_LEN),
            HwInitError::UartInitFailed,
        )?;
    }

    info!(
        "hw_init: UART{} {} baud, RS-485 half duplex (TX={}, RX={})",
        port,
        pins::SENSOR_UART_BAUD,
        pins::SENSOR_UART_TX_GPIO,
        pins::SENSOR_UART_RX_GPIO
    );
    Ok(queue)
}
