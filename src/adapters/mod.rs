//! Adapters — concrete implementations of the port traits.
//!
//! | Adapter    | Implements          | Connects to                    |
//! |------------|---------------------|--------------------------------|
//! | `hardware` | PulseOutput         | RMT channel 0, solenoid GPIOs  |
//! | `log_sink` | EventSink           | Serial log + observer channel  |
//! | `nvs`      | ConfigPort          | NVS `prefs` / in-memory store  |
//! | `time`     | TimePort            | ESP32 high-resolution timer    |
//! | `uart`     | Transport           | UART1 RS-485 sensor bus        |
//! |            | (receive task)      | UART event queue → LinkInbox   |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod uart;
