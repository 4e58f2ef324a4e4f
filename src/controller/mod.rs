// Serialized access to the entity tree, light history and strip

use crate::color::{self, denormalize_brightness, Rgb};
use crate::entity::{Entity, EntityDraft, EntityId, EntityTree};
use crate::error::LightResult;
use crate::render::{PixelSink, PixelState, Renderer};
use crate::state::{self, LightCommand, LightState, StateHistory};
use crate::storage::LightStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tracing::info;


/// Entity together with its current light state
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntityView {
    pub id: EntityId,
    pub name: String,
    pub start_addr: usize,
    pub end_addr: usize,
    pub parent_id: Option<EntityId>,
    pub state: StateView,
}

/// Current light state as reported by the API (brightness 0-100)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StateView {
    pub is_on: bool,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub brightness: u8,
}

impl From<&LightState> for StateView {
    fn from(state: &LightState) -> Self {
        Self {
            is_on: state.is_on,
            red: state.red,
            green: state.green,
            blue: state.blue,
            brightness: state.brightness,
        }
    }
}

/// Color request for an entity
///
/// Channels and brightness are unchecked integers straight from the
/// request; `None` keeps the entity's current value. Brightness is on the
/// raw 0-255 scale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColorRequest {
    pub entity_id: EntityId,
    pub red: Option<i64>,
    pub green: Option<i64>,
    pub blue: Option<i64>,
    pub brightness: Option<i64>,
    pub is_on: bool,
}

/// Result of a color change that reached the strip
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColorApplied {
    pub entity_id: EntityId,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    /// Raw 0-255 brightness
    pub brightness: u8,
    pub is_on: bool,
    /// False when every affected entity already had this state
    pub changed: bool,
    /// Target entity and its descendants, in render order
    pub affected: Vec<EntityId>,
}

/// Light change broadcast to WebSocket listeners
#[derive(Clone, Debug, Serialize)]
pub struct LightUpdate {
    pub entity_id: EntityId,
    pub affected: Vec<EntityId>,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub brightness: u8,
    pub is_on: bool,
    pub timestamp: DateTime<Utc>,
}

struct Core {
    tree: EntityTree,
    history: StateHistory,
    renderer: Renderer,
}

/// Light controller
///
/// Single serialization point for the service. Reads share the lock;
/// entity mutations and every propagate-then-render sequence hold it
/// exclusively, so a render's read-modify-flush of the whole buffer never
/// interleaves with another.
pub struct LightController {
    core: RwLock<Core>,

    /// Broadcast channel for applied light changes
    updates: broadcast::Sender<LightUpdate>,
}

impl LightController {
    /// Load tree and pixel buffer from `store`; strip length comes from `sink`.
    pub fn new(store: Arc<LightStore>, sink: Box<dyn PixelSink>) -> LightResult<Self> {
        let renderer = Renderer::load(store.clone(), sink)?;
        let tree = EntityTree::load(store.clone(), renderer.strip_length())?;
        let history = StateHistory::new(store);
        let (updates, _) = broadcast::channel(100);

        Ok(Self {
            core: RwLock::new(Core {
                tree,
                history,
                renderer,
            }),
            updates,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Core> {
        self.core.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Core> {
        self.core.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to applied light changes
    pub fn subscribe(&self) -> broadcast::Receiver<LightUpdate> {
        self.updates.subscribe()
    }

    /// Number of live update subscriptions (one per open WebSocket)
    pub fn subscriber_count(&self) -> usize {
        self.updates.receiver_count()
    }

    pub fn strip_length(&self) -> usize {
        self.read().renderer.strip_length()
    }

    /// Push the persisted pixel buffer to the strip (startup).
    pub fn restore_strip(&self) -> LightResult<()> {
        self.write().renderer.restore()
    }

    /// Create an entity with an all-off initial state.
    pub fn create_entity(&self, draft: EntityDraft) -> LightResult<EntityId> {
        let mut core = self.write();
        let id = core.tree.create(draft)?;
        core.history.seed(id)?;
        Ok(id)
    }

    pub fn update_entity(&self, id: EntityId, draft: EntityDraft) -> LightResult<()> {
        self.write().tree.update(id, draft)
    }

    /// Delete an entity and its history; children become roots.
    pub fn delete_entity(&self, id: EntityId) -> LightResult<Entity> {
        self.write().tree.delete(id)
    }

    pub fn get_entity(&self, id: EntityId) -> LightResult<EntityView> {
        let core = self.read();
        let entity = core.tree.get(id)?;
        core.view(entity)
    }

    /// All entities with their current state, ordered by id
    pub fn list_entities(&self) -> LightResult<Vec<EntityView>> {
        let core = self.read();
        core.tree
            .list()
            .iter()
            .map(|entity| core.view(entity))
            .collect()
    }

    /// Direct children of `id` with their current state, ordered by id
    pub fn children_of(&self, id: EntityId) -> LightResult<Vec<EntityView>> {
        let core = self.read();
        core.tree
            .children_of(id)?
            .iter()
            .map(|entity| core.view(entity))
            .collect()
    }

    /// Current light state of an entity
    pub fn light_state(&self, id: EntityId) -> LightResult<LightState> {
        let core = self.read();
        core.tree.get(id)?;
        core.history.current_or_default(id)
    }

    /// Number of history rows recorded for an entity
    pub fn history_len(&self, id: EntityId) -> LightResult<usize> {
        let core = self.read();
        core.tree.get(id)?;
        core.history.len(id)
    }

    /// Snapshot of the pixel buffer
    pub fn pixels(&self) -> Vec<PixelState> {
        self.read().renderer.pixels().to_vec()
    }

    /// Apply a color to an entity and its descendants and render it.
    ///
    /// The strip is re-rendered even when no history row changed, so ranges
    /// overwritten by overlapping entities get repainted.
    pub fn set_color(&self, request: ColorRequest) -> LightResult<ColorApplied> {
        let mut core = self.write();
        let applied = core.set_color(request)?;
        drop(core);

        self.publish(&applied);
        Ok(applied)
    }

    /// Flip an entity's power, keeping its stored color and brightness.
    pub fn toggle(&self, id: EntityId) -> LightResult<ColorApplied> {
        let mut core = self.write();
        core.tree.get(id)?;
        let current = core.history.current_or_default(id)?;
        let applied = core.set_color(ColorRequest {
            entity_id: id,
            red: Some(i64::from(current.red)),
            green: Some(i64::from(current.green)),
            blue: Some(i64::from(current.blue)),
            brightness: Some(i64::from(denormalize_brightness(current.brightness))),
            is_on: !current.is_on,
        })?;
        drop(core);

        self.publish(&applied);
        Ok(applied)
    }

    fn publish(&self, applied: &ColorApplied) {
        // No receivers is fine
        let _ = self.updates.send(LightUpdate {
            entity_id: applied.entity_id,
            affected: applied.affected.clone(),
            red: applied.red,
            green: applied.green,
            blue: applied.blue,
            brightness: applied.brightness,
            is_on: applied.is_on,
            timestamp: Utc::now(),
        });
    }
}

impl Core {
    fn view(&self, entity: &Entity) -> LightResult<EntityView> {
        let state = self.history.current_or_default(entity.id)?;
        Ok(EntityView {
            id: entity.id,
            name: entity.name.clone(),
            start_addr: entity.start_addr,
            end_addr: entity.end_addr,
            parent_id: entity.parent_id,
            state: StateView::from(&state),
        })
    }

    fn set_color(&mut self, request: ColorRequest) -> LightResult<ColorApplied> {
        let id = request.entity_id;
        self.tree.get(id)?;

        let current = self.history.current_or_default(id)?;
        let (color, brightness) = color::validate_raw(
            request.red.unwrap_or(i64::from(current.red)),
            request.green.unwrap_or(i64::from(current.green)),
            request.blue.unwrap_or(i64::from(current.blue)),
            request
                .brightness
                .unwrap_or(i64::from(denormalize_brightness(current.brightness))),
        )?;
        let command = LightCommand::new(color, brightness, request.is_on);

        // Every range must fit the strip before any history is written
        let mut subtree = vec![id];
        subtree.extend(self.tree.descendants_of(id)?);
        let ranges = subtree
            .iter()
            .map(|entity_id| self.tree.get(*entity_id).map(Entity::range))
            .collect::<LightResult<Vec<_>>>()?;
        self.renderer.check_ranges(&ranges)?;

        let outcome = state::apply(&self.tree, &self.history, id, &command)?;
        self.renderer
            .render_ranges(color, brightness, &ranges, request.is_on)?;

        info!(
            entity_id = id,
            red = color.red,
            green = color.green,
            blue = color.blue,
            brightness = brightness,
            is_on = request.is_on,
            changed = outcome.any_changed(),
            "Color applied"
        );

        Ok(ColorApplied {
            entity_id: id,
            red: color.red,
            green: color.green,
            blue: color.blue,
            brightness,
            is_on: request.is_on,
            changed: outcome.any_changed(),
            affected: outcome.visited,
        })
    }
}

impl ColorApplied {
    pub fn color(&self) -> Rgb {
        Rgb::new(self.red, self.green, self.blue)
    }
}
