use super::*;
use crate::error::LightError;
use crate::storage::LightStore;
use std::collections::BTreeMap;
use std::sync::Arc;

const STRIP: usize = 100;

fn create_test_tree() -> EntityTree {
    let store = Arc::new(LightStore::in_memory().unwrap());
    EntityTree::load(store, STRIP).unwrap()
}

/// Entity1 <- Entity2 <- Entity3
fn create_chain(tree: &mut EntityTree) -> (EntityId, EntityId, EntityId) {
    let first = tree.create(EntityDraft::new("Entity1", 1, 10)).unwrap();
    let second = tree
        .create(EntityDraft::new("Entity2", 1, 10).with_parent(first))
        .unwrap();
    let third = tree
        .create(EntityDraft::new("Entity3", 1, 10).with_parent(second))
        .unwrap();
    (first, second, third)
}

fn entity(id: EntityId, parent_id: Option<EntityId>) -> Entity {
    Entity {
        id,
        name: format!("Entity{}", id),
        start_addr: 0,
        end_addr: 0,
        parent_id,
    }
}

fn map(entities: Vec<Entity>) -> BTreeMap<EntityId, Entity> {
    entities.into_iter().map(|e| (e.id, e)).collect()
}

#[test]
fn test_check_parent_no_cycle() {
    let entities = map(vec![entity(1, None), entity(2, Some(1)), entity(3, Some(2))]);

    // Moving the root under a fresh entity, or a leaf anywhere up the chain
    assert!(check_parent(&entities, Some(3), 1).is_ok());
    assert!(check_parent(&entities, Some(3), 2).is_ok());
    assert!(check_parent(&entities, None, 3).is_ok());
}

#[test]
fn test_check_parent_detects_ancestor() {
    let entities = map(vec![entity(1, None), entity(2, Some(1)), entity(3, Some(2))]);

    let err = check_parent(&entities, Some(1), 3).unwrap_err();
    assert!(matches!(
        err,
        LightError::CyclicRelationship {
            entity: Some(1),
            parent: 3
        }
    ));
}

#[test]
fn test_check_parent_same_entity() {
    let entities = map(vec![entity(1, None)]);
    assert!(matches!(
        check_parent(&entities, Some(1), 1),
        Err(LightError::CyclicRelationship { .. })
    ));
}

#[test]
fn test_check_parent_self_loop_in_chain() {
    let entities = map(vec![entity(1, Some(1)), entity(2, Some(1))]);

    assert!(matches!(
        check_parent(&entities, Some(5), 2),
        Err(LightError::CyclicRelationship { .. })
    ));
    assert!(matches!(
        check_parent(&entities, None, 1),
        Err(LightError::CyclicRelationship { .. })
    ));
}

#[test]
fn test_check_parent_existing_cycle_hits_guard() {
    // 2 and 3 already point at each other; 1 is unrelated
    let entities = map(vec![entity(1, None), entity(2, Some(3)), entity(3, Some(2))]);

    assert!(matches!(
        check_parent(&entities, Some(1), 2),
        Err(LightError::CorruptHierarchy(_))
    ));
}

#[test]
fn test_check_parent_dangling_link_ends_walk() {
    let entities = map(vec![entity(1, Some(99))]);
    assert!(check_parent(&entities, Some(2), 1).is_ok());
}

#[test]
fn test_create_and_get() {
    let mut tree = create_test_tree();
    let id = tree.create(EntityDraft::new("Test Entity", 10, 20)).unwrap();

    let entity = tree.get(id).unwrap();
    assert_eq!(entity.name, "Test Entity");
    assert_eq!(entity.range(), 10..=20);
    assert_eq!(entity.parent_id, None);
    assert_eq!(tree.len(), 1);
}

#[test]
fn test_get_nonexistent() {
    let tree = create_test_tree();
    assert!(matches!(tree.get(999), Err(LightError::EntityNotFound(999))));
}

#[test]
fn test_create_rejects_missing_name() {
    let mut tree = create_test_tree();
    let err = tree.create(EntityDraft::new("  ", 0, 1)).unwrap_err();
    assert!(matches!(err, LightError::MissingField(_)));
    assert!(tree.is_empty());
}

#[test]
fn test_create_rejects_bad_ranges() {
    let mut tree = create_test_tree();

    assert!(matches!(
        tree.create(EntityDraft::new("Backwards", 20, 10)),
        Err(LightError::InvalidRange { .. })
    ));
    assert!(matches!(
        tree.create(EntityDraft::new("Too long", 0, STRIP)),
        Err(LightError::InvalidRange { .. })
    ));
    assert!(tree.create(EntityDraft::new("Whole strip", 0, STRIP - 1)).is_ok());
}

#[test]
fn test_create_rejects_unknown_parent() {
    let mut tree = create_test_tree();
    let err = tree
        .create(EntityDraft::new("Orphan", 0, 1).with_parent(42))
        .unwrap_err();
    assert!(matches!(err, LightError::ParentNotFound(42)));
    assert!(tree.is_empty());
}

#[test]
fn test_children_and_descendants() {
    let mut tree = create_test_tree();
    let (first, second, third) = create_chain(&mut tree);
    let sibling = tree
        .create(EntityDraft::new("Sibling", 50, 60).with_parent(first))
        .unwrap();

    let children: Vec<EntityId> = tree.children_of(first).unwrap().iter().map(|e| e.id).collect();
    assert_eq!(children, vec![second, sibling]);
    assert_eq!(tree.descendants_of(first).unwrap(), vec![second, third, sibling]);
    assert!(tree.children_of(third).unwrap().is_empty());
    assert!(tree.children_of(999).is_err());
}

#[test]
fn test_update_fields() {
    let mut tree = create_test_tree();
    let id = tree.create(EntityDraft::new("Original Entity", 10, 20)).unwrap();

    tree.update(id, EntityDraft::new("Updated Entity", 15, 25))
        .unwrap();

    let entity = tree.get(id).unwrap();
    assert_eq!(entity.name, "Updated Entity");
    assert_eq!(entity.range(), 15..=25);
}

#[test]
fn test_update_nonexistent() {
    let mut tree = create_test_tree();
    assert!(matches!(
        tree.update(999, EntityDraft::new("Updated Entity", 15, 25)),
        Err(LightError::EntityNotFound(999))
    ));
}

#[test]
fn test_update_reparents_and_detaches() {
    let mut tree = create_test_tree();
    let (first, second, third) = create_chain(&mut tree);

    tree.update(third, EntityDraft::new("Entity3", 1, 10).with_parent(first))
        .unwrap();
    assert_eq!(tree.child_ids(first), vec![second, third]);
    assert!(tree.child_ids(second).is_empty());

    // No parent in the draft detaches the entity
    tree.update(third, EntityDraft::new("Entity3", 1, 10)).unwrap();
    assert_eq!(tree.get(third).unwrap().parent_id, None);
    assert_eq!(tree.child_ids(first), vec![second]);
}

#[test]
fn test_update_rejects_cycle_and_leaves_tree_unchanged() {
    let mut tree = create_test_tree();
    let (first, second, third) = create_chain(&mut tree);
    let before = tree.list();

    let err = tree
        .update(first, EntityDraft::new("Entity1", 1, 10).with_parent(third))
        .unwrap_err();
    assert!(matches!(err, LightError::CyclicRelationship { .. }));

    let err = tree
        .update(second, EntityDraft::new("Entity2", 1, 10).with_parent(second))
        .unwrap_err();
    assert!(matches!(err, LightError::CyclicRelationship { .. }));

    assert_eq!(tree.list(), before);
    assert_eq!(tree.child_ids(first), vec![second]);
}

#[test]
fn test_self_parented_legacy_entity() {
    let store = Arc::new(LightStore::in_memory().unwrap());
    store.save_entity(&entity(1, Some(1))).unwrap();
    store.save_entity(&entity(2, None)).unwrap();
    let mut tree = EntityTree::load(store, STRIP).unwrap();

    // Not its own child in the index
    assert!(tree.child_ids(1).is_empty());
    assert_eq!(tree.descendants_of(1).unwrap(), Vec::<EntityId>::new());

    // Nothing can be attached below it, and it cannot keep pointing at itself
    assert!(matches!(
        tree.create(EntityDraft::new("New", 0, 0).with_parent(1)),
        Err(LightError::CyclicRelationship { entity: None, parent: 1 })
    ));
    assert_eq!(tree.len(), 2);
    assert!(matches!(
        tree.update(2, EntityDraft::new("Entity2", 0, 0).with_parent(1)),
        Err(LightError::CyclicRelationship { .. })
    ));
    assert!(matches!(
        tree.update(1, EntityDraft::new("Entity1", 0, 0).with_parent(1)),
        Err(LightError::CyclicRelationship { .. })
    ));

    // Detaching it repairs the row
    tree.update(1, EntityDraft::new("Entity1", 0, 0)).unwrap();
    tree.update(2, EntityDraft::new("Entity2", 0, 0).with_parent(1))
        .unwrap();
    assert_eq!(tree.child_ids(1), vec![2]);
}

#[test]
fn test_delete_detaches_children() {
    let mut tree = create_test_tree();
    let (first, second, third) = create_chain(&mut tree);

    let removed = tree.delete(second).unwrap();
    assert_eq!(removed.name, "Entity2");

    assert!(matches!(tree.get(second), Err(LightError::EntityNotFound(_))));
    assert_eq!(tree.get(third).unwrap().parent_id, None);
    assert!(tree.child_ids(first).is_empty());
    assert_eq!(tree.len(), 2);
}

#[test]
fn test_delete_nonexistent() {
    let mut tree = create_test_tree();
    assert!(matches!(tree.delete(999), Err(LightError::EntityNotFound(999))));
}

#[test]
fn test_mutations_survive_reload() {
    let store = Arc::new(LightStore::in_memory().unwrap());
    let mut tree = EntityTree::load(store.clone(), STRIP).unwrap();
    let (first, second, third) = create_chain(&mut tree);
    tree.delete(second).unwrap();

    let reloaded = EntityTree::load(store, STRIP).unwrap();
    assert_eq!(reloaded.list(), tree.list());
    assert_eq!(reloaded.get(third).unwrap().parent_id, None);
    assert!(reloaded.contains(first));
}
