//! Bell controller firmware — main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Adapters (outer ring)                      │
//! │                                                                  │
//! │  UartBus / UartReceiver   RmtPulseOutput   NvsAdapter            │
//! │  (Transport, rx task)     (PulseOutput)    (ConfigPort)          │
//! │  LogEventSink             MonotonicClock                         │
//! │  (EventSink)              (TimePort)                             │
//! │                                                                  │
//! │  ──────────────── Port trait boundary ─────────────────────      │
//! │                                                                  │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │ Controller: poll devices · evaluate triggers · debounce    │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! │                                                                  │
//! │  Tasks: uart-rx · pulse executor · loop driver · poll loop(main) │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use anyhow::Result;
use log::{error, info, warn};

use bellctl::adapters::hardware::RmtPulseOutput;
use bellctl::adapters::log_sink::LogEventSink;
use bellctl::adapters::nvs::NvsAdapter;
use bellctl::adapters::time::{MonotonicClock, TaskDelay};
use bellctl::adapters::uart::{UartBus, UartReceiver};
use bellctl::app::service::Controller;
use bellctl::config::POLL_INTERVAL_MS;
use bellctl::drivers::hw_init;
use bellctl::drivers::task_pin::{LOOP_TASK, PULSE_TASK, UART_RX_TASK, spawn_on_core};
use bellctl::drivers::watchdog::{WATCHDOG_TIMEOUT_MS, Watchdog};
use bellctl::link::{LinkInbox, Poller};
use bellctl::loop_driver::LoopDriver;
use bellctl::pulse::{PulseExecutor, PulseQueue};
use embedded_hal::delay::DelayNs;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  bellctl v{}                         ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Peripherals ────────────────────────────────────────
    hw_init::init_solenoid_outputs()?;
    hw_init::init_pulse_rmt()?;
    let uart_events = hw_init::init_sensor_uart()?;

    // ── 3. Configuration store ────────────────────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let nvs = Arc::new(nvs);

    // ── 4. Shared channels ────────────────────────────────────
    let inbox = Arc::new(LinkInbox::new());
    let pulses = Arc::new(PulseQueue::new());

    // ── 5. Tasks ──────────────────────────────────────────────
    let rx = UartReceiver::new(inbox.clone(), uart_events);
    spawn_on_core(UART_RX_TASK, move || rx.run())?;

    let exec_queue = pulses.clone();
    spawn_on_core(PULSE_TASK, move || {
        PulseExecutor::new(RmtPulseOutput::new()).run(&exec_queue)
    })?;

    let loop_config = nvs.clone();
    let loop_queue = pulses.clone();
    spawn_on_core(LOOP_TASK, move || {
        LoopDriver::new().run(loop_config.as_ref(), &loop_queue, &mut TaskDelay)
    })?;

    // ── 6. Poll loop ──────────────────────────────────────────
    let mut controller = Controller::new(Poller::new(UartBus::new(), inbox), pulses);
    let clock = MonotonicClock::new();
    // No network front end in this build; see `LogEventSink::with_observers`.
    let mut sink = LogEventSink::new();
    let watchdog = Watchdog::subscribe(WATCHDOG_TIMEOUT_MS);
    let mut delay = TaskDelay;

    controller.start(&mut sink);
    info!("System ready. Entering poll loop.");

    loop {
        let report = controller.poll_cycle(nvs.as_ref(), &clock, &mut sink);
        if report.timed_out as usize == bellctl::sensors::SENSOR_COUNT {
            error!("poll: no device answered (cycle {})", controller.cycle_count());
        }
        watchdog.feed();
        delay.delay_ms(POLL_INTERVAL_MS as u32);
    }
}
