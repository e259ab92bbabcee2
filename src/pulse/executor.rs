//! Single consumer of the pulse queue.

use log::{debug, info, warn};

use super::{PulseQueue, PulseRequest, ms_to_us};
use crate::app::ports::PulseOutput;
use crate::error::PulseError;

/// Drives a [`PulseOutput`] from the queue, one pulse at a time.
pub struct PulseExecutor<O: PulseOutput> {
    output: O,
    executed: u32,
    failed: u32,
}

impl<O: PulseOutput> PulseExecutor<O> {
    pub fn new(output: O) -> Self {
        Self {
            output,
            executed: 0,
            failed: 0,
        }
    }

    /// Emit one pulse and block until it has finished.
    ///
    /// Zero-length pulses are skipped.
    pub fn execute(&mut self, req: PulseRequest) -> Result<(), PulseError> {
        let duration_us = ms_to_us(req.duration_ms)?;
        if duration_us == 0 {
            debug!("pulse: skipping zero-length pulse on GPIO{}", req.pin);
            return Ok(());
        }

        info!("pulse: {:.2}ms on GPIO{}", req.duration_ms, req.pin);
        match self.output.emit(req.pin, duration_us) {
            Ok(()) => {
                self.executed += 1;
                Ok(())
            }
            Err(e) => {
                self.failed += 1;
                Err(e)
            }
        }
    }

    /// Execute everything already queued; returns how many were taken.
    pub fn drain_pending(&mut self, queue: &PulseQueue) -> usize {
        let mut n = 0;
        while let Some(req) = queue.try_next() {
            n += 1;
            if let Err(e) = self.execute(req) {
                warn!("pulse: GPIO{} failed: {}", req.pin, e);
            }
        }
        n
    }

    /// Executor task body.  Never returns.
    pub fn run(&mut self, queue: &PulseQueue) -> ! {
        info!("pulse: executor started");
        loop {
            let req = futures_lite::future::block_on(queue.next());
            if let Err(e) = self.execute(req) {
                warn!("pulse: GPIO{} failed: {}", req.pin, e);
            }
        }
    }

    pub fn executed(&self) -> u32 {
        self.executed
    }

    pub fn failed(&self) -> u32 {
        self.failed
    }

    pub fn output(&self) -> &O {
        &self.output
    }
}
