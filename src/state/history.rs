use super::{LightCommand, LightState};
use crate::color;
use crate::entity::EntityId;
use crate::error::LightResult;
use crate::storage::LightStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Append-only light state log per entity; the newest row is current.
pub struct StateHistory {
    store: Arc<LightStore>,
}

impl StateHistory {
    pub fn new(store: Arc<LightStore>) -> Self {
        Self { store }
    }

    /// Current state, if the entity has any history
    pub fn current(&self, entity_id: EntityId) -> LightResult<Option<LightState>> {
        Ok(self.store.latest_light_state(entity_id)?)
    }

    /// Current state, or the all-off default
    pub fn current_or_default(&self, entity_id: EntityId) -> LightResult<LightState> {
        Ok(self
            .current(entity_id)?
            .unwrap_or_else(|| LightState::off(entity_id)))
    }

    pub fn len(&self, entity_id: EntityId) -> LightResult<usize> {
        Ok(self.store.history_len(entity_id)?)
    }

    /// Append `command` for `entity_id` unless it equals the current state.
    ///
    /// Returns whether a row was appended.
    pub(crate) fn record(&self, entity_id: EntityId, command: &LightCommand) -> LightResult<bool> {
        if let Some(current) = self.current(entity_id)? {
            if current.matches(command) {
                debug!(entity_id = entity_id, "Light state unchanged, skipping");
                return Ok(false);
            }
        }

        let state = LightState {
            entity_id,
            is_on: command.is_on,
            red: command.color.red,
            green: command.color.green,
            blue: command.color.blue,
            brightness: command.normalized_brightness(),
            timestamp: Utc::now(),
        };
        self.append(&state)?;
        Ok(true)
    }

    /// Seed the all-off state for a freshly created entity.
    pub(crate) fn seed(&self, entity_id: EntityId) -> LightResult<()> {
        self.append(&LightState::off(entity_id))
    }

    fn append(&self, state: &LightState) -> LightResult<()> {
        color::validate(
            i64::from(state.red),
            i64::from(state.green),
            i64::from(state.blue),
            i64::from(state.brightness),
        )?;
        self.store.append_light_state(state)?;
        Ok(())
    }
}
