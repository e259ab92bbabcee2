//! Core-pinned task spawning.
//!
//! ESP-IDF implements `std::thread` on pthreads, which are thin wrappers
//! around FreeRTOS tasks.  `esp_pthread_set_cfg()` sets thread-local
//! configuration for the *next* `pthread_create()` from the calling thread,
//! so the config→spawn pair must not be interleaved with other spawns on
//! the same thread.
//!
//! Task placement used by the controller:
//!
//! | Task        | Core | Priority | Role                                 |
//! |-------------|------|----------|--------------------------------------|
//! | `uart-rx`   | App  | 12       | frame reception, wakes the poller    |
//! | `pulse`     | App  | 10       | drains the pulse queue into the RMT  |
//! | `loop-drv`  | Pro  | 5        | periodic solenoid sweep              |
//! | main        | App  | 1        | poll cycle                           |

use std::io;
use std::thread::JoinHandle;

/// CPU core identifiers for the ESP32-S3 dual-core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU), shared with the network stacks.
    Pro = 0,
    /// Core 1 (APP_CPU), the control path.
    App = 1,
}

/// Placement and sizing of one spawned task.
#[derive(Debug, Clone, Copy)]
pub struct TaskSpec {
    /// NUL-terminated, e.g. `"pulse\0"`.
    pub name: &'static str,
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
}

impl TaskSpec {
    fn display_name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }
}

pub const UART_RX_TASK: TaskSpec = TaskSpec { name: "uart-rx\0", core: Core::App, priority: 12, stack_kb: 4 };
pub const PULSE_TASK: TaskSpec = TaskSpec { name: "pulse\0", core: Core::App, priority: 10, stack_kb: 4 };
pub const LOOP_TASK: TaskSpec = TaskSpec { name: "loop-drv\0", core: Core::Pro, priority: 5, stack_kb: 4 };

/// Spawn a task pinned to `spec.core` with the given priority and stack.
#[cfg(target_os = "espidf")]
pub fn spawn_on_core(
    spec: TaskSpec,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    // SAFETY: the config struct lives across the call and `name` is a
    // NUL-terminated static string.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = spec.core as i32;
        cfg.prio = spec.priority as i32;
        cfg.stack_size = (spec.stack_kb * 1024) as i32;
        cfg.thread_name = spec.name.as_ptr() as *const _;
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK {
        return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
    }

    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        spec.display_name(),
        spec.core,
        spec.priority,
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(spec.display_name().into())
        .spawn(f)
}

/// Host fallback: ignores core affinity and priority.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_on_core(
    spec: TaskSpec,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    log::info!(
        "Spawning '{}' (sim, no core pinning, stack={}KB)",
        spec.display_name(),
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(spec.display_name().into())
        .stack_size(spec.stack_kb.max(64) * 1024)
        .spawn(f)
}
