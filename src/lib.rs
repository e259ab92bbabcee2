//! Bell controller firmware library.
//!
//! Polls four distance sensors over a half-duplex serial bus, evaluates
//! per-solenoid trigger rules against the latest readings and drives twelve
//! solenoids with hardware-timed pulses.  A loop driver can also sweep the
//! solenoids periodically.
//!
//! Every module builds on the host; ESP-IDF specifics are guarded by
//! `#[cfg(target_os = "espidf")]` inside the adapters and drivers.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod link;
pub mod loop_driver;
pub mod pins;
pub mod pulse;
pub mod sensors;
pub mod trigger;

mod esp_link_shims;
