//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every [`AppEvent`] to the logger
//! (UART / USB-CDC console in production).  When an observer channel is
//! attached, the same notification line is also offered to it so a
//! network collaborator can forward it to connected clients.  Delivery to
//! observers is best effort: a full channel drops the line.

use core::fmt::Write;
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, info};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Longest notification line forwarded to observers.
pub const NOTIFICATION_LEN: usize = 128;
/// Lines buffered for observers before new ones are dropped.
pub const NOTIFICATION_DEPTH: usize = 8;

pub type Notification = heapless::String<NOTIFICATION_LEN>;
pub type NotificationChannel = Channel<CriticalSectionRawMutex, Notification, NOTIFICATION_DEPTH>;

/// Adapter that logs every [`AppEvent`] and optionally forwards it.
#[derive(Default)]
pub struct LogEventSink {
    observers: Option<Arc<NotificationChannel>>,
    dropped: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also offer each line to `observers`.
    ///
    /// Extension point for a network front end (web socket or similar) that
    /// drains the channel.  The firmware binary ships without one, so on
    /// the device notifications reach the log only.
    pub fn with_observers(observers: Arc<NotificationChannel>) -> Self {
        Self {
            observers: Some(observers),
            dropped: 0,
        }
    }

    /// Lines that could not be handed to observers.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        info!("EVENT | {}", event);

        let Some(observers) = &self.observers else {
            return;
        };
        let mut line = Notification::new();
        // Truncated lines are still forwarded.
        let _ = write!(line, "{}", event);
        if observers.try_send(line).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
            debug!("LogEventSink: observer channel full, line dropped");
        }
    }
}
