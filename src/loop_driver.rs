//! Loop pulse driver — cycles through the solenoids at a fixed pace.
//!
//! Independent of the poll cycle.  Each step reads the enable flag and the
//! pace from the configuration store, so toggling `loop_en` takes effect on
//! the next step.  While disabled the driver only rechecks the flag every
//! [`LOOP_DISABLED_RECHECK_MS`].

use embedded_hal::delay::DelayNs;
use log::{debug, info};

use crate::app::ports::ConfigPort;
use crate::config::{ControllerSettings, LOOP_DISABLED_RECHECK_MS};
use crate::pulse::{ActuatorId, PulseQueue};

/// Outcome of one [`LoopDriver::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStep {
    /// A pulse was offered to the queue; wait `delay_ms` before the next step.
    Pulsed { actuator: ActuatorId, delay_ms: u32 },
    /// Loop mode is off; check again after `recheck_ms`.
    Disabled { recheck_ms: u32 },
}

impl LoopStep {
    pub fn delay_ms(self) -> u32 {
        match self {
            Self::Pulsed { delay_ms, .. } => delay_ms,
            Self::Disabled { recheck_ms } => recheck_ms,
        }
    }
}

#[derive(Debug)]
pub struct LoopDriver {
    next: ActuatorId,
    was_enabled: bool,
}

impl Default for LoopDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopDriver {
    pub fn new() -> Self {
        Self {
            next: ActuatorId::FIRST,
            was_enabled: false,
        }
    }

    /// Offer the next actuator's loop pulse, or report the recheck delay.
    ///
    /// The position in the cycle is kept while disabled, so re-enabling
    /// resumes where the driver stopped.
    pub fn step(&mut self, config: &impl ConfigPort, queue: &PulseQueue) -> LoopStep {
        let settings = ControllerSettings::load(config);
        if settings.loop_enabled != self.was_enabled {
            info!("loop: {}", if settings.loop_enabled { "enabled" } else { "disabled" });
            self.was_enabled = settings.loop_enabled;
        }
        if !settings.loop_enabled {
            return LoopStep::Disabled {
                recheck_ms: LOOP_DISABLED_RECHECK_MS,
            };
        }

        let actuator = self.next;
        self.next = actuator.wrapping_next();

        let width = config.pulse_widths().get(actuator.index()).loop_ms;
        if let Err(e) = queue.fire(actuator, width) {
            debug!("loop: solenoid {} skipped: {}", actuator, e);
        }

        LoopStep::Pulsed {
            actuator,
            delay_ms: settings.loop_delay_ms,
        }
    }

    /// Loop task body.  Never returns.
    pub fn run(
        &mut self,
        config: &impl ConfigPort,
        queue: &PulseQueue,
        delay: &mut impl DelayNs,
    ) -> ! {
        info!("loop: driver started");
        loop {
            let step = self.step(config, queue);
            delay.delay_ms(step.delay_ms());
        }
    }
}
