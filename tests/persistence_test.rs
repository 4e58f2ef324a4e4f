// Restart tests: entities, history and the pixel buffer survive a reopen of
// the SQLite file.

use lightstrip::color::Rgb;
use lightstrip::controller::ColorRequest;
use lightstrip::entity::EntityDraft;
use lightstrip::render::{MemorySink, PixelState};
use lightstrip::storage::LightStore;
use lightstrip::LightController;
use std::sync::Arc;

fn open_controller(db_path: &str, sink: &MemorySink) -> LightController {
    let store = Arc::new(LightStore::open(db_path).unwrap());
    LightController::new(store, Box::new(sink.clone())).unwrap()
}

#[test]
fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("light.db");
    let db_path = db_path.to_str().unwrap();

    let (root, child) = {
        let controller = open_controller(db_path, &MemorySink::new(20));
        let root = controller
            .create_entity(EntityDraft::new("Root", 0, 9))
            .unwrap();
        let child = controller
            .create_entity(EntityDraft::new("Child", 15, 19).with_parent(root))
            .unwrap();
        controller
            .set_color(ColorRequest {
                entity_id: root,
                red: Some(0),
                green: Some(200),
                blue: Some(0),
                brightness: Some(255),
                is_on: true,
            })
            .unwrap();
        (root, child)
    };

    let sink = MemorySink::new(20);
    let controller = open_controller(db_path, &sink);

    let view = controller.get_entity(child).unwrap();
    assert_eq!(view.parent_id, Some(root));
    assert!(view.state.is_on);
    assert_eq!(view.state.green, 200);
    assert_eq!(view.state.brightness, 100);
    assert_eq!(controller.history_len(root).unwrap(), 2);

    let pixels = controller.pixels();
    assert_eq!(pixels[0], PixelState::new(Rgb::new(0, 200, 0), 255));
    assert_eq!(pixels[12], PixelState::OFF);
    assert_eq!(pixels[17], PixelState::new(Rgb::new(0, 200, 0), 255));

    // Nothing reaches the strip until the buffer is restored
    assert_eq!(sink.show_count(), 0);
    controller.restore_strip().unwrap();
    assert_eq!(sink.show_count(), 1);
    assert_eq!(sink.shown()[5], Rgb::new(0, 200, 0));
    assert_eq!(sink.shown()[12], Rgb::OFF);
}

#[test]
fn test_delete_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("light.db");
    let db_path = db_path.to_str().unwrap();

    let child = {
        let controller = open_controller(db_path, &MemorySink::new(10));
        let root = controller
            .create_entity(EntityDraft::new("Root", 0, 9))
            .unwrap();
        let child = controller
            .create_entity(EntityDraft::new("Child", 0, 4).with_parent(root))
            .unwrap();
        controller.delete_entity(root).unwrap();
        child
    };

    let controller = open_controller(db_path, &MemorySink::new(10));
    let entities = controller.list_entities().unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].id, child);
    assert_eq!(entities[0].parent_id, None);
}

#[test]
fn test_new_ids_continue_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("light.db");
    let db_path = db_path.to_str().unwrap();

    let first = {
        let controller = open_controller(db_path, &MemorySink::new(10));
        let id = controller
            .create_entity(EntityDraft::new("First", 0, 1))
            .unwrap();
        controller.delete_entity(id).unwrap();
        id
    };

    let controller = open_controller(db_path, &MemorySink::new(10));
    let second = controller
        .create_entity(EntityDraft::new("Second", 0, 1))
        .unwrap();
    assert!(second > first);
}
