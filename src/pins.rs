//! GPIO / peripheral pin assignments for the bell controller main board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Solenoid drivers (one MOSFET low-side switch per bell)
// ---------------------------------------------------------------------------

/// Number of solenoid actuators on the board.
pub const SOLENOID_COUNT: usize = 12;

/// Actuator id → GPIO.  Index is the actuator id used everywhere else.
pub const SOLENOID_GPIO: [u8; SOLENOID_COUNT] = [40, 39, 38, 37, 36, 35, 12, 11, 10, 9, 8, 7];

// ---------------------------------------------------------------------------
// Sensor bus (RS-485 transceiver, half duplex)
// ---------------------------------------------------------------------------

/// UART peripheral used for the sensor bus.
pub const SENSOR_UART_NUM: i32 = 1;
/// Sensor bus bit rate.
pub const SENSOR_UART_BAUD: u32 = 921_600;
pub const SENSOR_UART_TX_GPIO: i32 = 19;
pub const SENSOR_UART_RX_GPIO: i32 = 20;

/// Depth of the UART driver event queue.
pub const SENSOR_UART_EVENT_QUEUE_LEN: i32 = 16;

// ---------------------------------------------------------------------------
// Pulse peripheral (RMT)
// ---------------------------------------------------------------------------

/// RMT channel shared by every solenoid; the GPIO is re-routed per pulse.
pub const PULSE_RMT_CHANNEL: u32 = 0;
/// APB (80 MHz) / 80 = 1 MHz tick, one tick per microsecond.
pub const PULSE_RMT_CLK_DIV: u8 = 80;
