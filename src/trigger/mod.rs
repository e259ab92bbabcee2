//! Trigger rules — which sensor cell, closer than what, fires which actuator.
//!
//! Each actuator owns [`TRIGGERS_PER_ACTUATOR`] rules checked in table
//! order.  The configuration collaborator speaks the compact wire form
//! `(cell, threshold)`, where a negative `cell` disables the rule and
//! `cell = sensor * 100 + index` otherwise.  Inside the crate only the typed
//! form exists; the conversion validates both halves of the cell key.

pub mod engine;

pub use engine::{DebounceState, FireDecision, evaluate};

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::config::{next_field, split_fields};
use crate::link::packet::CELL_COUNT;
use crate::pins::SOLENOID_COUNT;
use crate::pulse::ActuatorId;
use crate::sensors::SensorId;

/// Rules per actuator.
pub const TRIGGERS_PER_ACTUATOR: usize = 8;

/// Wire value of a disabled rule's cell.
const DISABLED_CELL: i16 = -1;
const CELLS_PER_SENSOR_KEY: i16 = 100;

/// Wire form of one rule: `(cell, threshold)`.
pub type WireRule = (i16, i16);

// ---------------------------------------------------------------------------
// Cell reference
// ---------------------------------------------------------------------------

/// One measurement cell of one sensor device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub sensor: SensorId,
    pub index: usize,
}

impl CellRef {
    pub fn new(sensor: SensorId, index: usize) -> Option<Self> {
        (index < CELL_COUNT).then_some(Self { sensor, index })
    }

    /// Decode `sensor * 100 + index`.  Negative keys are not cells.
    pub fn decode(key: i16) -> Result<Self, ConfigError> {
        if key < 0 {
            return Err(ConfigError::ValidationFailed("negative cell key"));
        }
        let sensor = u8::try_from(key / CELLS_PER_SENSOR_KEY)
            .ok()
            .and_then(SensorId::new)
            .ok_or(ConfigError::ValidationFailed("cell key names an unknown sensor"))?;
        Self::new(sensor, (key % CELLS_PER_SENSOR_KEY) as usize)
            .ok_or(ConfigError::ValidationFailed("cell index out of range"))
    }

    pub fn encode(self) -> i16 {
        self.sensor.index() as i16 * CELLS_PER_SENSOR_KEY + self.index as i16
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerRule {
    #[default]
    Disabled,
    /// Fires when the cell's distance is strictly below `threshold`.
    Armed { cell: CellRef, threshold: i16 },
}

impl TriggerRule {
    pub fn from_wire((cell, threshold): WireRule) -> Result<Self, ConfigError> {
        if cell < 0 {
            return Ok(Self::Disabled);
        }
        Ok(Self::Armed {
            cell: CellRef::decode(cell)?,
            threshold,
        })
    }

    pub fn to_wire(self) -> WireRule {
        match self {
            Self::Disabled => (DISABLED_CELL, 0),
            Self::Armed { cell, threshold } => (cell.encode(), threshold),
        }
    }
}

/// The ordered rules of one actuator; replaced as one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(
    into = "[WireRule; TRIGGERS_PER_ACTUATOR]",
    try_from = "[WireRule; TRIGGERS_PER_ACTUATOR]"
)]
pub struct RuleSet(pub [TriggerRule; TRIGGERS_PER_ACTUATOR]);

impl RuleSet {
    /// Parse the collaborator text form `"c0,t0,c1,t1,…"` (8 pairs).
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut fields = split_fields(text);
        let mut wire = [(DISABLED_CELL, 0); TRIGGERS_PER_ACTUATOR];
        for rule in &mut wire {
            *rule = (next_field(&mut fields)?, next_field(&mut fields)?);
        }
        if fields.next().is_some() {
            return Err(ConfigError::ValidationFailed("too many trigger fields"));
        }
        Self::try_from(wire)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TriggerRule> {
        self.0.iter()
    }

    pub fn to_wire(&self) -> [WireRule; TRIGGERS_PER_ACTUATOR] {
        self.0.map(TriggerRule::to_wire)
    }

    /// Observer report: `[[cell,threshold],…]`.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.to_wire()).unwrap_or_default()
    }
}

impl From<RuleSet> for [WireRule; TRIGGERS_PER_ACTUATOR] {
    fn from(rules: RuleSet) -> Self {
        rules.to_wire()
    }
}

impl TryFrom<[WireRule; TRIGGERS_PER_ACTUATOR]> for RuleSet {
    type Error = ConfigError;

    fn try_from(wire: [WireRule; TRIGGERS_PER_ACTUATOR]) -> Result<Self, ConfigError> {
        let mut rules = Self::default();
        for (rule, w) in rules.0.iter_mut().zip(wire) {
            *rule = TriggerRule::from_wire(w)?;
        }
        Ok(rules)
    }
}

/// Every actuator's rules, indexed by [`ActuatorId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerTable([RuleSet; SOLENOID_COUNT]);

impl TriggerTable {
    pub fn get(&self, actuator: ActuatorId) -> &RuleSet {
        &self.0[actuator.index()]
    }

    pub fn set(&mut self, actuator: ActuatorId, rules: RuleSet) {
        self.0[actuator.index()] = rules;
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActuatorId, &RuleSet)> {
        ActuatorId::all().zip(self.0.iter())
    }
}
