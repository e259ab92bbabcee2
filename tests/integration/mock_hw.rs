//! Mock hardware for integration tests.
//!
//! [`SimBus`] stands in for the RS-485 bus and the four sensor devices on
//! it: requests written by the poller are framed, decoded and answered by
//! pushing the device's reply through a host [`UartReceiver`], so the whole
//! receive path (framing, validation, rendezvous) runs as on the device.

#![allow(dead_code)]

use core::cell::Cell;
use core::convert::Infallible;
use core::time::Duration;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bellctl::adapters::uart::UartReceiver;
use bellctl::app::events::AppEvent;
use bellctl::app::ports::{EventSink, PulseOutput, TimePort};
use bellctl::error::PulseError;
use bellctl::link::packet::{BASE_ADDRESS, CELL_COUNT, RETURN_ADDRESS, TRAILER, decode_request};
use bellctl::link::{DataRecord, FrameAssembler, LinkInbox, Poller, Transport};
use bellctl::sensors::SENSOR_COUNT;

/// Short wait so silent-device tests stay fast.
pub const TEST_TIMEOUT: Duration = Duration::from_millis(5);

// ── Sensor devices ────────────────────────────────────────────

/// A device report with every cell set to the same target code and distance.
pub fn uniform_record(status: u8, target: u8, distance: i16) -> DataRecord {
    DataRecord {
        status,
        target_status: [target; CELL_COUNT],
        distance: [distance; CELL_COUNT],
    }
}

/// A report with no valid targets except `cell`.
pub fn single_cell_record(cell: usize, target: u8, distance: i16) -> DataRecord {
    let mut r = uniform_record(1, 0, i16::MAX);
    r.target_status[cell] = target;
    r.distance[cell] = distance;
    r
}

// ── SimBus ────────────────────────────────────────────────────

pub struct SimBus {
    rx: UartReceiver,
    requests: FrameAssembler,
    /// Reply of each device; `None` keeps the device silent.
    pub devices: [Option<DataRecord>; SENSOR_COUNT],
    /// Raw bytes pushed onto the line before every reply.
    pub noise: Vec<u8>,
    /// Destination of every request seen, in order.
    pub polled: Vec<u8>,
}

impl SimBus {
    pub fn new(inbox: Arc<LinkInbox>) -> Self {
        Self {
            rx: UartReceiver::new(inbox),
            requests: FrameAssembler::new(),
            devices: [None; SENSOR_COUNT],
            noise: Vec::new(),
            polled: Vec::new(),
        }
    }

    /// A bus where every device answers with `record`.
    pub fn all_answering(inbox: Arc<LinkInbox>, record: DataRecord) -> Self {
        let mut bus = Self::new(inbox);
        bus.devices = [Some(record); SENSOR_COUNT];
        bus
    }

    fn answer(&mut self, destination: u8) {
        self.polled.push(destination);
        let Some(idx) = destination.checked_sub(BASE_ADDRESS).map(usize::from) else {
            return;
        };
        let Some(Some(record)) = self.devices.get(idx).copied() else {
            return;
        };
        let mut line = self.noise.clone();
        line.extend_from_slice(&record.encode(RETURN_ADDRESS));
        line.extend_from_slice(&TRAILER);
        self.rx.feed(&line);
    }
}

impl Transport for SimBus {
    type Error = Infallible;

    fn write(&mut self, data: &[u8]) -> Result<usize, Infallible> {
        let mut bodies = Vec::new();
        self.requests.feed(data, |frame| {
            if let Ok(body) = frame {
                bodies.push(body.to_vec());
            }
        });
        for body in bodies {
            if let Some((destination, _)) = decode_request(&body) {
                self.answer(destination);
            }
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// A poller wired to a fresh [`SimBus`].
pub fn sim_poller(configure: impl FnOnce(&mut SimBus)) -> Poller<SimBus> {
    let inbox = Arc::new(LinkInbox::new());
    let mut bus = SimBus::new(inbox.clone());
    configure(&mut bus);
    Poller::with_timeout(bus, inbox, TEST_TIMEOUT)
}

// ── Pulse output ──────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingOutput {
    pub pulses: Vec<(u8, u32)>,
    pub fail_next: bool,
}

impl PulseOutput for RecordingOutput {
    fn emit(&mut self, gpio: u8, duration_us: u32) -> Result<(), PulseError> {
        if core::mem::take(&mut self.fail_next) {
            return Err(PulseError::OutputFailed(-1));
        }
        self.pulses.push((gpio, duration_us));
        Ok(())
    }
}

/// One emitted pulse with wall-clock start and end.
#[derive(Debug, Clone, Copy)]
pub struct PulseSpan {
    pub gpio: u8,
    pub start: Instant,
    pub end: Instant,
}

/// Holds each pulse for its full length and logs it to a shared list, so a
/// test thread can watch an executor running elsewhere.
#[derive(Clone, Default)]
pub struct TimedOutput {
    pub started: Arc<Mutex<Vec<u8>>>,
    pub spans: Arc<Mutex<Vec<PulseSpan>>>,
}

impl TimedOutput {
    pub fn started_count(&self) -> usize {
        self.started.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn spans(&self) -> Vec<PulseSpan> {
        self.spans.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Poll until `n` pulses have finished or `limit` passes.
    pub fn wait_for(&self, n: usize, limit: Duration) -> Vec<PulseSpan> {
        let deadline = Instant::now() + limit;
        loop {
            let spans = self.spans();
            if spans.len() >= n || Instant::now() > deadline {
                return spans;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}

impl PulseOutput for TimedOutput {
    fn emit(&mut self, gpio: u8, duration_us: u32) -> Result<(), PulseError> {
        let start = Instant::now();
        if let Ok(mut s) = self.started.lock() {
            s.push(gpio);
        }
        std::thread::sleep(Duration::from_micros(duration_us as u64));
        let end = Instant::now();
        if let Ok(mut s) = self.spans.lock() {
            s.push(PulseSpan { gpio, start, end });
        }
        Ok(())
    }
}

// ── Clock ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct FixedClock(Cell<u64>);

impl FixedClock {
    pub fn at(ms: u64) -> Self {
        Self(Cell::new(ms))
    }

    pub fn set(&self, ms: u64) {
        self.0.set(ms);
    }
}

impl TimePort for FixedClock {
    fn uptime_ms(&self) -> u64 {
        self.0.get()
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.events.iter().map(ToString::to_string).collect()
    }

    pub fn trigger_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::TriggerFired { .. }))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
