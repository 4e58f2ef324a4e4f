use super::{Entity, EntityId};
use crate::error::{LightError, LightResult};
use std::collections::BTreeMap;

/// Checks that making `proposed_parent` the parent of `subject` keeps the
/// hierarchy acyclic.
///
/// Walks the parent chain starting at `proposed_parent`:
/// - reaching `subject` means `subject` would become its own ancestor
/// - a node whose parent is itself is a pre-existing cycle and is rejected
/// - a root, or a dangling parent link, ends the walk without a cycle
///
/// `subject` is `None` when the entity does not exist yet (create).
/// The walk is bounded by `entities.len() + 1` steps; exceeding it means a
/// cycle already exists further up the chain.
pub fn check_parent(
    entities: &BTreeMap<EntityId, Entity>,
    subject: Option<EntityId>,
    proposed_parent: EntityId,
) -> LightResult<()> {
    let max_steps = entities.len() + 1;
    let mut current = Some(proposed_parent);
    let mut steps = 0;

    while let Some(id) = current {
        if Some(id) == subject {
            return Err(LightError::CyclicRelationship {
                entity: subject,
                parent: proposed_parent,
            });
        }

        steps += 1;
        if steps > max_steps {
            return Err(LightError::CorruptHierarchy(format!(
                "parent chain from entity {} exceeds {} steps",
                proposed_parent, max_steps
            )));
        }

        let Some(node) = entities.get(&id) else {
            break;
        };

        if node.is_self_parented() {
            return Err(LightError::CyclicRelationship {
                entity: subject,
                parent: proposed_parent,
            });
        }

        current = node.parent_id;
    }

    Ok(())
}
