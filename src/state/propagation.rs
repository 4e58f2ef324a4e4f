use super::{LightCommand, StateHistory};
use crate::entity::{EntityId, EntityTree};
use crate::error::LightResult;
use tracing::info;

/// Result of one propagation pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropagationOutcome {
    /// Target entity followed by its descendants in pre-order
    pub visited: Vec<EntityId>,

    /// Entities that received a new history row
    pub changed: Vec<EntityId>,
}

impl PropagationOutcome {
    pub fn any_changed(&self) -> bool {
        !self.changed.is_empty()
    }
}

/// Apply `command` to `entity_id` and every descendant.
///
/// The subtree is resolved first in pre-order (parent, then each child
/// subtree in ascending id order), so a parent-link cycle fails with
/// `CorruptHierarchy` before any row is written. Each visited entity then
/// gets a new history row only if its current state differs. Pixels are not
/// touched; the caller renders the visited ranges afterwards.
pub fn apply(
    tree: &EntityTree,
    history: &StateHistory,
    entity_id: EntityId,
    command: &LightCommand,
) -> LightResult<PropagationOutcome> {
    let mut visited = vec![entity_id];
    visited.extend(tree.descendants_of(entity_id)?);

    let mut outcome = PropagationOutcome::default();
    for id in visited {
        if history.record(id, command)? {
            outcome.changed.push(id);
        }
        outcome.visited.push(id);
    }

    info!(
        entity_id = entity_id,
        visited = outcome.visited.len(),
        changed = outcome.changed.len(),
        is_on = command.is_on,
        "Light state propagated"
    );

    Ok(outcome)
}
