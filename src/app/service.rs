//! Application service — the control orchestrator.
//!
//! [`Controller`] owns the bus poller, the sensor snapshots and the
//! debounce state.  All other I/O flows through port traits injected at
//! call sites, making the whole poll cycle testable with mock adapters.
//!
//! ```text
//!  Poller ──▶ ┌─────────────────────────┐ ──▶ EventSink
//!             │       Controller        │
//! ConfigPort ─▶│ snapshots · triggers   │ ──▶ PulseQueue
//!  TimePort ──▶└─────────────────────────┘
//! ```

use std::sync::Arc;

use log::{info, warn};

use crate::config::{ControllerSettings, validate_scalar};
use crate::error::{Error, PulseError};
use crate::link::{LinkCounters, PacketType, Poller, Transport};
use crate::pins::SOLENOID_COUNT;
use crate::pulse::{ActuatorId, PulseQueue};
use crate::sensors::{SENSOR_COUNT, SensorBank, SensorId};
use crate::trigger::{DebounceState, evaluate};

use super::commands::AppCommand;
use super::events::{AppEvent, ConfigItem};
use super::ports::{ConfigPort, EventSink, TimePort};

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Devices that answered.
    pub updated: u8,
    /// Devices marked TIMEOUT.
    pub timed_out: u8,
    /// Trigger fires queued.
    pub fired: u8,
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

pub struct Controller<T: Transport> {
    poller: Poller<T>,
    pulses: Arc<PulseQueue>,
    sensors: SensorBank,
    debounce: DebounceState,
    cycle_count: u64,
}

impl<T: Transport> Controller<T> {
    pub fn new(poller: Poller<T>, pulses: Arc<PulseQueue>) -> Self {
        Self {
            poller,
            pulses,
            sensors: SensorBank::new(),
            debounce: DebounceState::default(),
            cycle_count: 0,
        }
    }

    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started {
            sensors: SENSOR_COUNT,
            actuators: SOLENOID_COUNT,
        });
        info!("Controller started");
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one poll cycle: query every device → evaluate triggers → queue pulses.
    ///
    /// Configuration is read after the devices have been polled, so a change
    /// made during the cycle applies to this cycle's evaluation.
    pub fn poll_cycle(
        &mut self,
        config: &impl ConfigPort,
        clock: &impl TimePort,
        sink: &mut impl EventSink,
    ) -> CycleReport {
        self.cycle_count += 1;
        let mut report = CycleReport::default();

        // 1. Poll devices in address order
        for sensor in SensorId::all() {
            let snap = self.sensors.get_mut(sensor);
            let before = snap.status;
            snap.begin_poll();

            match self.poller.send_request(sensor.address(), PacketType::Data) {
                Ok(record) => {
                    snap.apply(&record);
                    report.updated += 1;
                }
                Err(_) => {
                    snap.mark_timed_out();
                    report.timed_out += 1;
                }
            }

            let after = snap.status;
            if after != before {
                sink.emit(&AppEvent::SensorStatusChanged {
                    sensor,
                    from: before,
                    to: after,
                });
            }
        }

        // 2. Evaluate triggers against a fresh copy of the configuration
        let settings = ControllerSettings::load(config);
        let rules = config.trigger_table();
        let widths = config.pulse_widths();
        let fires = evaluate(
            &self.sensors,
            &rules,
            &widths,
            &mut self.debounce,
            clock.uptime_ms(),
            settings.trigger_interval_ms,
        );

        // 3. Queue pulses
        for fire in &fires {
            sink.emit(&AppEvent::TriggerFired {
                actuator: fire.actuator,
                sensor: fire.cell.sensor,
                cell: fire.cell.index,
                distance: fire.distance,
                threshold: fire.threshold,
            });
            match self.pulses.fire(fire.actuator, fire.pulse_ms) {
                Ok(()) => report.fired += 1,
                Err(e) => warn!("Trigger pulse for solenoid {} not queued: {}", fire.actuator, e),
            }
        }

        report
    }

    // ── Command handling ──────────────────────────────────────

    /// Validate and apply an external command.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        config: &impl ConfigPort,
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        match cmd {
            AppCommand::Fire { actuator, ms } => {
                let id = ActuatorId::new(actuator).ok_or(PulseError::UnknownActuator(actuator))?;
                self.pulses.fire(id, ms)?;
                sink.emit(&AppEvent::ManualFire { actuator: id, ms });
            }
            AppCommand::ReplacePulseWidths(widths) => {
                config.set_pulse_widths(&widths)?;
                sink.emit(&AppEvent::ConfigChanged(ConfigItem::PulseWidths));
            }
            AppCommand::ReplaceTriggers { actuator, rules } => {
                let id = ActuatorId::new(actuator).ok_or(PulseError::UnknownActuator(actuator))?;
                config.set_trigger_rules(id, &rules)?;
                sink.emit(&AppEvent::ConfigChanged(ConfigItem::Triggers(id)));
            }
            AppCommand::SetScalar { key, value } => {
                validate_scalar(&key, value)?;
                config.set_i32(&key, value)?;
                info!("Config {} = {}", key, value);
                sink.emit(&AppEvent::ConfigChanged(ConfigItem::Scalar(key)));
            }
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn sensors(&self) -> &SensorBank {
        &self.sensors
    }

    /// Poll cycles executed since startup.
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn debounce(&self) -> &DebounceState {
        &self.debounce
    }

    /// Bus access for diagnostics and simulation.
    pub fn poller_mut(&mut self) -> &mut Poller<T> {
        &mut self.poller
    }

    pub fn link_counters(&self) -> LinkCounters {
        self.poller.inbox().counters()
    }

    pub fn pulses(&self) -> &Arc<PulseQueue> {
        &self.pulses
    }
}
