//! Trigger evaluation: snapshots + rules + debounce state → fire decisions.
//!
//! Pure apart from the debounce state it is handed.  Actuators are visited
//! in id order and each actuator's rules in table order; the first rule
//! whose condition holds ends the search for that actuator, whether or not
//! the debounce interval lets it fire.

use heapless::Vec;

use super::{CellRef, TriggerRule, TriggerTable};
use crate::config::PulseWidths;
use crate::pins::SOLENOID_COUNT;
use crate::pulse::ActuatorId;
use crate::sensors::{SensorBank, target_valid};

/// Last fire time per actuator; `None` until the first fire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceState([Option<u64>; SOLENOID_COUNT]);

impl DebounceState {
    pub fn last_fired(&self, actuator: ActuatorId) -> Option<u64> {
        self.0[actuator.index()]
    }

    fn ready(&self, actuator: ActuatorId, now_ms: u64, debounce_ms: u64) -> bool {
        self.last_fired(actuator)
            .is_none_or(|last| now_ms.saturating_sub(last) > debounce_ms)
    }

    fn record(&mut self, actuator: ActuatorId, now_ms: u64) {
        self.0[actuator.index()] = Some(now_ms);
    }
}

/// One actuator that should pulse this cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireDecision {
    pub actuator: ActuatorId,
    pub cell: CellRef,
    pub distance: i16,
    pub threshold: i16,
    /// Triggered pulse width of the actuator.
    pub pulse_ms: f32,
}

/// Run every actuator's rules against the current snapshots.
pub fn evaluate(
    sensors: &SensorBank,
    rules: &TriggerTable,
    widths: &PulseWidths,
    debounce: &mut DebounceState,
    now_ms: u64,
    debounce_ms: u64,
) -> Vec<FireDecision, SOLENOID_COUNT> {
    let mut fires = Vec::new();

    for (actuator, set) in rules.iter() {
        for rule in set.iter() {
            let TriggerRule::Armed { cell, threshold } = *rule else {
                continue;
            };

            let snap = sensors.get(cell.sensor);
            if !snap.status.is_active() {
                continue;
            }
            let Some((target, distance)) = snap.cell(cell.index) else {
                continue;
            };
            if !target_valid(target) || distance >= threshold {
                continue;
            }

            if debounce.ready(actuator, now_ms, debounce_ms) {
                debounce.record(actuator, now_ms);
                // One decision per actuator at most, so capacity is never exceeded.
                let _ = fires.push(FireDecision {
                    actuator,
                    cell,
                    distance,
                    threshold,
                    pulse_ms: widths.get(actuator.index()).triggered_ms,
                });
            }
            break;
        }
    }

    fires
}
