//! Outbound application events.
//!
//! The [`Controller`](super::service::Controller) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, push to connected
//! observers, etc.  `Display` renders the human-readable notification line.

use core::fmt;

use crate::pulse::ActuatorId;
use crate::sensors::{DeviceStatus, SensorId};

/// Structured events emitted by the control path.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The controller has started.
    Started { sensors: usize, actuators: usize },

    /// A trigger rule fired and a pulse was queued.
    TriggerFired {
        actuator: ActuatorId,
        sensor: SensorId,
        cell: usize,
        distance: i16,
        threshold: i16,
    },

    /// A device's status byte changed between two cycles.
    SensorStatusChanged {
        sensor: SensorId,
        from: DeviceStatus,
        to: DeviceStatus,
    },

    /// A manual fire command queued a pulse.
    ManualFire { actuator: ActuatorId, ms: f32 },

    /// A configuration record was replaced.
    ConfigChanged(ConfigItem),
}

/// Which configuration record a change touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigItem {
    PulseWidths,
    Triggers(ActuatorId),
    Scalar(heapless::String<{ crate::config::KEY_MAX_LEN }>),
}

impl fmt::Display for AppEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { sensors, actuators } => {
                write!(f, "Controller started ({} sensors, {} solenoids)", sensors, actuators)
            }
            Self::TriggerFired {
                actuator,
                sensor,
                cell,
                distance,
                threshold,
            } => write!(
                f,
                "Trigger solenoid {} from sensor {} cell {} ({} < threshold {})",
                actuator,
                sensor.index(),
                cell,
                distance,
                threshold
            ),
            Self::SensorStatusChanged { sensor, from, to } => write!(
                f,
                "Sensor {} status {} -> {}",
                sensor.index(),
                from.0,
                to.0
            ),
            Self::ManualFire { actuator, ms } => {
                write!(f, "Manual fire solenoid {} for {:.2}ms", actuator, ms)
            }
            Self::ConfigChanged(item) => match item {
                ConfigItem::PulseWidths => write!(f, "Config: pulse widths replaced"),
                ConfigItem::Triggers(a) => write!(f, "Config: triggers of solenoid {} replaced", a),
                ConfigItem::Scalar(key) => write!(f, "Config: {} updated", key),
            },
        }
    }
}
