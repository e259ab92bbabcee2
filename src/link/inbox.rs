//! Response rendezvous between the receive task and the poller.
//!
//! The receive task validates each assembled frame and, if it is a data
//! frame addressed to us, hands the decoded record to whoever is waiting.
//! The slot holds at most one record; a newer one overwrites an unclaimed
//! older one.
//!
//! ```text
//! ┌──────────────┐  on_frame()  ┌───────────┐  wait()  ┌──────────────┐
//! │ Receive task │─────────────▶│  Signal   │◀─────────│    Poller    │
//! │ (UART events)│              │ (1 slot)  │ reset()  │ (poll loop)  │
//! └──────────────┘              └───────────┘          └──────────────┘
//! ```

use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{debug, warn};

use super::packet::{DataRecord, FrameError};

/// Link statistics, readable from any task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkCounters {
    pub accepted: u32,
    pub overflow: u32,
    pub bad_header: u32,
    pub bad_destination: u32,
    pub malformed: u32,
    pub timeouts: u32,
}

#[derive(Default)]
struct AtomicCounters {
    accepted: AtomicU32,
    overflow: AtomicU32,
    bad_header: AtomicU32,
    bad_destination: AtomicU32,
    malformed: AtomicU32,
    timeouts: AtomicU32,
}

fn bump(c: &AtomicU32) {
    c.fetch_add(1, Ordering::Relaxed);
}

/// Single-slot response mailbox plus link statistics.
pub struct LinkInbox {
    slot: Signal<CriticalSectionRawMutex, DataRecord>,
    counters: AtomicCounters,
}

impl Default for LinkInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkInbox {
    pub fn new() -> Self {
        Self {
            slot: Signal::new(),
            counters: AtomicCounters::default(),
        }
    }

    /// Validate one assembled frame body and publish it on success.
    ///
    /// Rejected frames are logged and counted; they never disturb a pending
    /// wait.
    pub fn on_frame(&self, body: &[u8]) -> Result<(), FrameError> {
        match DataRecord::decode(body) {
            Ok(record) => {
                bump(&self.counters.accepted);
                self.slot.signal(record);
                Ok(())
            }
            Err(e) => {
                self.reject(e);
                Err(e)
            }
        }
    }

    /// Record a capture that overran the receive buffer.
    pub fn on_overflow(&self, len: usize) {
        self.reject(FrameError::Overflow(len));
    }

    fn reject(&self, e: FrameError) {
        let c = &self.counters;
        match e {
            FrameError::Overflow(_) => {
                warn!("link: {}, flushing input", e);
                bump(&c.overflow);
            }
            FrameError::BadHeader(_) => {
                warn!("link: {}", e);
                bump(&c.bad_header);
            }
            FrameError::BadDestination(_) => {
                debug!("link: {}", e);
                bump(&c.bad_destination);
            }
            FrameError::BadType(_) | FrameError::BadLength(_) => {
                warn!("link: malformed frame: {}", e);
                bump(&c.malformed);
            }
        }
    }

    /// Discard any unclaimed response.
    pub(crate) fn clear(&self) {
        self.slot.reset();
    }

    /// Block until a response arrives or `timeout` elapses.
    pub(crate) fn wait(&self, timeout: Duration) -> Option<DataRecord> {
        let response = async { Some(self.slot.wait().await) };
        let deadline = async {
            async_io_mini::Timer::after(timeout).await;
            None
        };
        let got = futures_lite::future::block_on(futures_lite::future::or(response, deadline));
        if got.is_none() {
            bump(&self.counters.timeouts);
        }
        got
    }

    pub fn counters(&self) -> LinkCounters {
        let c = &self.counters;
        let load = |a: &AtomicU32| a.load(Ordering::Relaxed);
        LinkCounters {
            accepted: load(&c.accepted),
            overflow: load(&c.overflow),
            bad_header: load(&c.bad_header),
            bad_destination: load(&c.bad_destination),
            malformed: load(&c.malformed),
            timeouts: load(&c.timeouts),
        }
    }
}
