//! Application core — the control path, free of hardware.
//!
//! This module contains the orchestration rules of the bell controller:
//! poll cycle, trigger dispatch and command handling.  All interaction
//! with hardware happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
