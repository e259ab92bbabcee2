//! Inbound commands to the controller.
//!
//! These represent actions requested by the outside world (the HTTP
//! configuration collaborator, a serial console) that the
//! [`Controller`](super::service::Controller) validates and applies.
//! Tables are always carried whole.

use crate::config::{KEY_MAX_LEN, PulseWidths};
use crate::trigger::RuleSet;

/// Commands that external adapters can send into the control path.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Pulse one solenoid immediately (manual bell).
    Fire { actuator: u8, ms: f32 },

    /// Replace the whole pulse-width table.
    ReplacePulseWidths(PulseWidths),

    /// Replace every trigger rule of one actuator.
    ReplaceTriggers { actuator: u8, rules: RuleSet },

    /// Set a named integer scalar (`trig_interval`, `loop_delay`, `loop_en`, …).
    SetScalar {
        key: heapless::String<KEY_MAX_LEN>,
        value: i32,
    },
}
