use super::{check_parent, Entity, EntityDraft, EntityId};
use crate::error::{LightError, LightResult};
use crate::storage::LightStore;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Entity tree store
///
/// Keeps every entity in memory together with a `parent -> children` index
/// and writes each mutation through to the store before applying it
/// locally. Children are derived from `parent_id`; the index is the only
/// back-reference.
pub struct EntityTree {
    store: Arc<LightStore>,

    /// Number of pixels on the strip; addresses must stay below it
    strip_length: usize,

    /// Primary storage: id -> Entity (ordered for deterministic listing)
    entities: BTreeMap<EntityId, Entity>,

    /// Secondary index: parent id -> child ids
    children: HashMap<EntityId, BTreeSet<EntityId>>,
}

impl EntityTree {
    /// Load all persisted entities and build the children index.
    pub fn load(store: Arc<LightStore>, strip_length: usize) -> LightResult<Self> {
        let mut tree = Self {
            store,
            strip_length,
            entities: BTreeMap::new(),
            children: HashMap::new(),
        };

        for entity in tree.store.list_entities()? {
            if entity.is_self_parented() {
                warn!(
                    entity_id = entity.id,
                    "Entity is its own parent, treating it as a root for propagation"
                );
            }
            if entity.end_addr >= strip_length {
                warn!(
                    entity_id = entity.id,
                    start_addr = entity.start_addr,
                    end_addr = entity.end_addr,
                    strip_length = strip_length,
                    "Entity range is outside the strip, color requests reaching it will be rejected"
                );
            }
            tree.link(&entity);
            tree.entities.insert(entity.id, entity);
        }

        info!(entities = tree.entities.len(), "Loaded entity tree");
        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn strip_length(&self) -> usize {
        self.strip_length
    }

    pub fn get(&self, id: EntityId) -> LightResult<&Entity> {
        self.entities.get(&id).ok_or(LightError::EntityNotFound(id))
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// All entities ordered by id
    pub fn list(&self) -> Vec<Entity> {
        self.entities.values().cloned().collect()
    }

    /// Direct children of `id`, ordered by id
    pub fn children_of(&self, id: EntityId) -> LightResult<Vec<Entity>> {
        self.get(id)?;
        Ok(self
            .child_ids(id)
            .into_iter()
            .filter_map(|child| self.entities.get(&child).cloned())
            .collect())
    }

    /// Ids of the direct children of `id`, ascending
    pub fn child_ids(&self, id: EntityId) -> Vec<EntityId> {
        self.children
            .get(&id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Ids of every transitive descendant of `id` in pre-order
    pub fn descendants_of(&self, id: EntityId) -> LightResult<Vec<EntityId>> {
        self.get(id)?;

        let mut descendants = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut pending: Vec<EntityId> = self.child_ids(id).into_iter().rev().collect();
        while let Some(next) = pending.pop() {
            if !seen.insert(next) {
                return Err(LightError::CorruptHierarchy(format!(
                    "entity {} reached twice below entity {}",
                    next, id
                )));
            }
            descendants.push(next);
            pending.extend(self.child_ids(next).into_iter().rev());
        }

        Ok(descendants)
    }

    /// Create an entity and return its id.
    pub fn create(&mut self, draft: EntityDraft) -> LightResult<EntityId> {
        self.validate(None, &draft)?;

        let id = self.store.insert_entity(&draft)?;
        let entity = Entity::from_draft(id, draft);

        info!(
            entity_id = id,
            name = %entity.name,
            start_addr = entity.start_addr,
            end_addr = entity.end_addr,
            parent_id = ?entity.parent_id,
            "Entity created"
        );

        self.link(&entity);
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// Replace name, range and parent of an existing entity.
    ///
    /// A draft without `parent_id` detaches the entity into a root.
    pub fn update(&mut self, id: EntityId, draft: EntityDraft) -> LightResult<()> {
        let previous = self.get(id)?.clone();
        self.validate(Some(id), &draft)?;

        let entity = Entity::from_draft(id, draft);
        self.store.save_entity(&entity)?;

        info!(
            entity_id = id,
            name = %entity.name,
            parent_id = ?entity.parent_id,
            "Entity updated"
        );

        self.unlink(&previous);
        self.link(&entity);
        self.entities.insert(id, entity);
        Ok(())
    }

    /// Delete an entity; its children are detached and become roots.
    pub fn delete(&mut self, id: EntityId) -> LightResult<Entity> {
        let entity = self.get(id)?.clone();
        let orphans = self.child_ids(id);

        self.store.delete_entity(id)?;

        self.unlink(&entity);
        self.children.remove(&id);
        for child in &orphans {
            if let Some(child) = self.entities.get_mut(child) {
                child.parent_id = None;
            }
        }
        self.entities.remove(&id);

        info!(
            entity_id = id,
            detached_children = orphans.len(),
            "Entity deleted"
        );
        Ok(entity)
    }

    /// Field, range, parent and cycle checks; runs before any mutation.
    fn validate(&self, subject: Option<EntityId>, draft: &EntityDraft) -> LightResult<()> {
        if draft.name.trim().is_empty() {
            return Err(LightError::MissingField("name".to_string()));
        }

        if draft.start_addr > draft.end_addr {
            return Err(LightError::invalid_range(format!(
                "start_addr {} is greater than end_addr {}",
                draft.start_addr, draft.end_addr
            )));
        }
        if draft.end_addr >= self.strip_length {
            return Err(LightError::invalid_range(format!(
                "end_addr {} is outside the strip (0-{})",
                draft.end_addr,
                self.strip_length.saturating_sub(1)
            )));
        }

        if let Some(parent_id) = draft.parent_id {
            if !self.contains(parent_id) {
                return Err(LightError::ParentNotFound(parent_id));
            }
            check_parent(&self.entities, subject, parent_id)?;
        }

        Ok(())
    }

    fn link(&mut self, entity: &Entity) {
        if let Some(parent_id) = entity.parent_id {
            if parent_id != entity.id {
                self.children.entry(parent_id).or_default().insert(entity.id);
            }
        }
    }

    fn unlink(&mut self, entity: &Entity) {
        if let Some(parent_id) = entity.parent_id {
            if let Some(siblings) = self.children.get_mut(&parent_id) {
                siblings.remove(&entity.id);
                if siblings.is_empty() {
                    self.children.remove(&parent_id);
                }
            }
        }
    }
}
