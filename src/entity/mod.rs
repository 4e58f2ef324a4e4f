// Entity hierarchy: model, tree store and cycle detection

mod cycle;
mod tree;

pub use cycle::check_parent;
pub use tree::EntityTree;

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

#[cfg(test)]
mod tests;

/// Entity identifier (assigned by the store, starting at 1)
pub type EntityId = i64;

/// Entity is a named group of pixels, optionally nested under a parent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,

    /// Human-readable name (e.g., "Kitchen", "Cabinet left")
    pub name: String,

    /// First pixel index owned by this entity (inclusive)
    pub start_addr: usize,

    /// Last pixel index owned by this entity (inclusive)
    pub end_addr: usize,

    /// Parent entity, if nested
    pub parent_id: Option<EntityId>,
}

impl Entity {
    pub fn from_draft(id: EntityId, draft: EntityDraft) -> Self {
        Self {
            id,
            name: draft.name,
            start_addr: draft.start_addr,
            end_addr: draft.end_addr,
            parent_id: draft.parent_id,
        }
    }

    /// Pixel range owned by this entity
    pub fn range(&self) -> RangeInclusive<usize> {
        self.start_addr..=self.end_addr
    }

    /// True for legacy rows whose parent link points at themselves
    pub fn is_self_parented(&self) -> bool {
        self.parent_id == Some(self.id)
    }
}

/// Fields supplied when creating or updating an entity
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityDraft {
    pub name: String,
    pub start_addr: usize,
    pub end_addr: usize,
    pub parent_id: Option<EntityId>,
}

impl EntityDraft {
    pub fn new(name: impl Into<String>, start_addr: usize, end_addr: usize) -> Self {
        Self {
            name: name.into(),
            start_addr,
            end_addr,
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: EntityId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}
