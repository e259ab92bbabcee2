//! Sensor snapshots — the latest report of every distance-sensing device on the bus.
//!
//! One [`SensorSnapshot`] per device, owned by the poll loop.  A successful
//! poll overwrites the whole snapshot; a timed-out poll replaces only the
//! status with [`DeviceStatus::TIMEOUT`] and leaves the cell arrays stale.

use serde_json::Value;

use crate::link::packet::{BASE_ADDRESS, CELL_COUNT, DataRecord};

/// Number of addressable sensor devices.
pub const SENSOR_COUNT: usize = 4;

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

/// Device status byte.  The numeric values are a fixed protocol contract
/// with the sensor firmware; only `ACTIVE` is compared against here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceStatus(pub u8);

impl DeviceStatus {
    /// Never reported (boot value).
    pub const UNKNOWN: Self = Self(0);
    /// Ranging and producing data.
    pub const ACTIVE: Self = Self(1);
    /// Local sentinel: the last request got no valid response in time.
    pub const TIMEOUT: Self = Self(0xFF);

    pub fn is_active(self) -> bool {
        self == Self::ACTIVE
    }
}

/// Per-cell target status codes that carry a usable distance.
const VALID_TARGET_CODES: [u8; 3] = [5, 6, 9];

/// Whether a per-cell target status means "valid target present".
pub fn target_valid(code: u8) -> bool {
    VALID_TARGET_CODES.contains(&code)
}

// ---------------------------------------------------------------------------
// Device identity
// ---------------------------------------------------------------------------

/// Index of a sensor device on the bus (0..SENSOR_COUNT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SensorId(u8);

impl SensorId {
    pub fn new(id: u8) -> Option<Self> {
        ((id as usize) < SENSOR_COUNT).then_some(Self(id))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Bus address the device answers to.
    pub fn address(self) -> u8 {
        BASE_ADDRESS + self.0
    }

    /// Every device, in address order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..SENSOR_COUNT as u8).map(Self)
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Where a device is in its per-cycle exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollState {
    #[default]
    Unpolled,
    AwaitingResponse,
    Updated,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSnapshot {
    pub status: DeviceStatus,
    pub target_status: [u8; CELL_COUNT],
    pub distance: [i16; CELL_COUNT],
    pub poll_state: PollState,
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self {
            status: DeviceStatus::UNKNOWN,
            target_status: [0; CELL_COUNT],
            distance: [0; CELL_COUNT],
            poll_state: PollState::Unpolled,
        }
    }
}

impl SensorSnapshot {
    pub fn begin_poll(&mut self) {
        self.poll_state = PollState::AwaitingResponse;
    }

    /// Overwrite every field from a validated response.
    pub fn apply(&mut self, record: &DataRecord) {
        self.status = DeviceStatus(record.status);
        self.target_status = record.target_status;
        self.distance = record.distance;
        self.poll_state = PollState::Updated;
    }

    /// Record a missed response; cell data is left as it was.
    pub fn mark_timed_out(&mut self) {
        self.status = DeviceStatus::TIMEOUT;
        self.poll_state = PollState::TimedOut;
    }

    /// `(target_status, distance)` of one cell.
    pub fn cell(&self, index: usize) -> Option<(u8, i16)> {
        Some((*self.target_status.get(index)?, *self.distance.get(index)?))
    }

    /// Observer report: `[status,[target_status,distance],…]`, one pair per cell.
    pub fn to_json(&self) -> String {
        let mut items = Vec::with_capacity(CELL_COUNT + 1);
        items.push(Value::from(self.status.0));
        items.extend(
            self.target_status
                .iter()
                .zip(self.distance.iter())
                .map(|(&t, &d)| Value::Array(vec![Value::from(t), Value::from(d)])),
        );
        serde_json::to_string(&Value::Array(items)).unwrap_or_default()
    }
}

/// Snapshots of every device, indexed by [`SensorId`].
#[derive(Debug, Clone, Default)]
pub struct SensorBank([SensorSnapshot; SENSOR_COUNT]);

impl SensorBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: SensorId) -> &SensorSnapshot {
        &self.0[id.index()]
    }

    pub fn get_mut(&mut self, id: SensorId) -> &mut SensorSnapshot {
        &mut self.0[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SensorId, &SensorSnapshot)> {
        SensorId::all().zip(self.0.iter())
    }
}
