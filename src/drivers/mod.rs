//! Peripheral bring-up, task placement and the task watchdog.

pub mod hw_init;
pub mod task_pin;
pub mod watchdog;
