// Light state history and propagation

mod history;
mod propagation;

pub use history::StateHistory;
pub use propagation::{apply, PropagationOutcome};

use crate::color::{normalize_brightness, Rgb};
use crate::entity::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};


/// One entry of an entity's light state history
///
/// Brightness is stored on the normalized 0-100 scale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightState {
    pub entity_id: EntityId,
    pub is_on: bool,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub brightness: u8,
    pub timestamp: DateTime<Utc>,
}

impl LightState {
    /// State reported for an entity that has no history yet
    pub fn off(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            is_on: false,
            red: 0,
            green: 0,
            blue: 0,
            brightness: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn color(&self) -> Rgb {
        Rgb::new(self.red, self.green, self.blue)
    }

    /// True when applying `command` would not change this state
    pub fn matches(&self, command: &LightCommand) -> bool {
        self.is_on == command.is_on
            && self.color() == command.color
            && self.brightness == command.normalized_brightness()
    }
}

/// Requested light setting; brightness is on the raw 0-255 scale
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightCommand {
    pub color: Rgb,
    pub brightness: u8,
    pub is_on: bool,
}

impl LightCommand {
    pub fn new(color: Rgb, brightness: u8, is_on: bool) -> Self {
        Self {
            color,
            brightness,
            is_on,
        }
    }

    /// Brightness on the 0-100 storage scale
    pub fn normalized_brightness(&self) -> u8 {
        normalize_brightness(self.brightness)
    }
}
