use plancad_core::collision::check_collision;
use plancad_core::document::{
    Element, ElementId, ElementPatch, Layer, Rectangle, Shape, Wall,
};
use plancad_core::geometry::Point2;
use plancad_engine::{DocumentStore, EditorSettings};
use proptest::prelude::*;

fn rectangle(width: f64, height: f64) -> Shape {
    Shape::Rectangle(Rectangle {
        width,
        height,
        fill: None,
        corner_radius: 0.0,
    })
}

fn wall(points: Vec<f64>) -> Shape {
    Shape::Wall(Wall {
        points,
        thickness: 12.0,
        connected_walls: Vec::new(),
    })
}

fn state(store: &DocumentStore) -> (Vec<Layer>, Vec<Element>) {
    (store.layers().cloned().collect(), store.elements().to_vec())
}

fn collisions_of(store: &DocumentStore, id: &ElementId) -> Vec<ElementId> {
    let element = store.element(id).expect("element exists");
    check_collision(element, store.elements(), &[])
        .into_iter()
        .map(|other| other.id.clone())
        .collect()
}

#[test]
fn overlapping_rectangles_scenario() {
    let mut store = DocumentStore::new();
    let r1 = store
        .create_element(Point2::new(0.0, 0.0), rectangle(100.0, 100.0))
        .expect("r1");
    let r2 = store
        .create_element(Point2::new(50.0, 50.0), rectangle(100.0, 100.0))
        .expect("r2");
    assert_eq!(collisions_of(&store, &r1), vec![r2.clone()]);

    assert!(store.update_element(&r2, &ElementPatch::position(200.0, 200.0)));
    assert!(collisions_of(&store, &r1).is_empty());

    assert!(store.undo());
    assert_eq!(store.element(&r2).map(Element::position), Some(Point2::new(50.0, 50.0)));
    assert_eq!(collisions_of(&store, &r1), vec![r2]);
}

#[test]
fn history_keeps_only_the_latest_fifty_commands() {
    let mut store = DocumentStore::new();
    for i in 0..60 {
        store
            .create_element(Point2::new(i as f64 * 20.0, 0.0), rectangle(10.0, 10.0))
            .expect("rectangle");
    }
    assert_eq!(store.history().undo_len(), 50);

    let mut undone = 0;
    while store.undo() {
        undone += 1;
    }
    assert_eq!(undone, 50);
    // 最早的 10 次添加无法撤销
    assert_eq!(store.elements().len(), 10);
}

#[test]
fn history_capacity_follows_settings() {
    let mut store = DocumentStore::with_settings(EditorSettings {
        history_capacity: 3,
        ..EditorSettings::default()
    });
    for i in 0..5 {
        store
            .create_element(Point2::new(i as f64, 0.0), rectangle(1.0, 1.0))
            .expect("rectangle");
    }
    assert_eq!(store.history().undo_len(), 3);
}

#[test]
fn new_command_after_undo_clears_redo() {
    let mut store = DocumentStore::new();
    store
        .create_element(Point2::new(0.0, 0.0), rectangle(10.0, 10.0))
        .expect("first");
    store
        .create_element(Point2::new(20.0, 0.0), rectangle(10.0, 10.0))
        .expect("second");
    assert!(store.undo());
    assert!(store.can_redo());

    store
        .create_element(Point2::new(40.0, 0.0), rectangle(10.0, 10.0))
        .expect("third");
    assert!(!store.can_redo());
    assert!(!store.redo());
    assert_eq!(store.elements().len(), 2);
}

#[test]
fn wall_link_propagation_only_with_link_mode() {
    for link_mode in [true, false] {
        let mut store = DocumentStore::new();
        store.set_link_mode(link_mode);
        let a = store
            .create_element(Point2::new(0.0, 0.0), wall(vec![0.0, 0.0, 100.0, 0.0]))
            .expect("a");
        let b = store
            .create_element(Point2::new(0.0, 0.0), wall(vec![100.0, 0.0, 100.0, 100.0]))
            .expect("b");

        assert!(store.move_elements(std::slice::from_ref(&a), 15.0, -5.0));
        let b_points = store.element(&b).and_then(Element::points).map(<[f64]>::to_vec);
        if link_mode {
            assert_eq!(b_points, Some(vec![115.0, -5.0, 100.0, 100.0]));
        } else {
            assert_eq!(b_points, Some(vec![100.0, 0.0, 100.0, 100.0]));
        }
    }
}

#[test]
fn joint_shared_by_two_moved_walls_shifts_once() {
    let mut store = DocumentStore::new();
    store.set_link_mode(true);
    let a = store
        .create_element(Point2::new(0.0, 0.0), wall(vec![0.0, 0.0, 100.0, 0.0]))
        .expect("a");
    let b = store
        .create_element(Point2::new(0.0, 0.0), wall(vec![100.0, -100.0, 100.0, 0.0]))
        .expect("b");
    let c = store
        .create_element(Point2::new(0.0, 0.0), wall(vec![100.0, 0.0, 200.0, 0.0]))
        .expect("c");

    assert!(store.move_elements(&[a, b], 5.0, 0.0));
    assert_eq!(
        store.element(&c).and_then(Element::points),
        Some(&[105.0, 0.0, 200.0, 0.0][..])
    );

    assert!(store.undo());
    assert_eq!(
        store.element(&c).and_then(Element::points),
        Some(&[100.0, 0.0, 200.0, 0.0][..])
    );
}

#[test]
fn removing_a_layer_refreshes_snapshots_on_other_layers() {
    let mut store = DocumentStore::new();
    let a = store
        .create_element(Point2::new(0.0, 0.0), wall(vec![0.0, 0.0, 100.0, 0.0]))
        .expect("a");
    let other = store.add_layer("Other");
    let b = store
        .create_element(Point2::new(0.0, 0.0), wall(vec![100.0, 0.0, 100.0, 100.0]))
        .expect("b");
    let connected = |store: &DocumentStore| {
        store
            .element(&a)
            .and_then(Element::as_wall)
            .map(|wall| wall.connected_walls.clone())
    };
    assert_eq!(connected(&store), Some(vec![b.clone()]));

    assert!(store.remove_layer(&other));
    assert_eq!(connected(&store), Some(Vec::new()));

    assert!(store.undo());
    assert_eq!(connected(&store), Some(vec![b.clone()]));
    assert!(store.element(&b).is_some());

    assert!(store.redo());
    assert_eq!(connected(&store), Some(Vec::new()));
}

#[test]
fn locked_neighbour_is_not_dragged() {
    let mut store = DocumentStore::new();
    store.set_link_mode(true);
    let a = store
        .create_element(Point2::new(0.0, 0.0), wall(vec![0.0, 0.0, 100.0, 0.0]))
        .expect("a");
    let frozen = store.add_layer("Existing walls");
    let b = store
        .create_element(Point2::new(0.0, 0.0), wall(vec![100.0, 0.0, 100.0, 100.0]))
        .expect("b");
    store.set_layer_locked(&frozen, true);

    assert!(store.move_elements(std::slice::from_ref(&a), 0.0, 10.0));
    assert_eq!(
        store.element(&b).and_then(Element::points),
        Some(&[100.0, 0.0, 100.0, 100.0][..])
    );
}

#[test]
fn removing_a_wall_refreshes_neighbour_snapshot() {
    let mut store = DocumentStore::new();
    let a = store
        .create_element(Point2::new(0.0, 0.0), wall(vec![0.0, 0.0, 100.0, 0.0]))
        .expect("a");
    let b = store
        .create_element(Point2::new(0.0, 0.0), wall(vec![100.0, 0.0, 100.0, 100.0]))
        .expect("b");
    let connected = |store: &DocumentStore| {
        store
            .element(&b)
            .and_then(Element::as_wall)
            .map(|wall| wall.connected_walls.clone())
    };
    assert_eq!(connected(&store), Some(vec![a.clone()]));

    assert!(store.remove_element(&a));
    assert_eq!(connected(&store), Some(Vec::new()));

    assert!(store.undo());
    assert_eq!(connected(&store), Some(vec![a]));
}

#[test]
fn loading_repairs_orphans_and_keeps_allocating_fresh_ids() {
    let json = r##"{
        "layers": [{"id": "layer-4", "name": "Plan", "visible": true, "locked": false}],
        "activeLayerId": "layer-9",
        "elements": [
            {"id": "el-7", "layerId": "layer-4", "type": "circle", "x": 0, "y": 0, "radius": 5},
            {"id": "el-8", "layerId": "missing", "type": "line", "x": 0, "y": 0, "points": [0, 0, 10, 0]}
        ]
    }"##;
    let data = serde_json::from_str(json).expect("valid project json");
    let mut store = DocumentStore::new();
    let report = store.load_from_project_data(data);

    assert!(report.active_layer_replaced);
    assert_eq!(report.reassigned_elements, vec![ElementId::new("el-8")]);
    assert_eq!(store.active_layer_id().as_str(), "layer-4");
    let fresh = store
        .create_element(Point2::new(0.0, 0.0), rectangle(1.0, 1.0))
        .expect("rectangle");
    assert_eq!(fresh.as_str(), "el-9");
}

#[derive(Debug, Clone)]
enum Op {
    Add { x: f64, y: f64 },
    Update { pick: usize, x: f64, y: f64 },
    Remove { pick: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-500.0f64..500.0, -500.0f64..500.0).prop_map(|(x, y)| Op::Add { x, y }),
        (0usize..16, -500.0f64..500.0, -500.0f64..500.0)
            .prop_map(|(pick, x, y)| Op::Update { pick, x, y }),
        (0usize..16).prop_map(|pick| Op::Remove { pick }),
    ]
}

proptest! {
    #[test]
    fn undo_and_redo_are_inverse(ops in prop::collection::vec(op(), 1..30)) {
        let mut store = DocumentStore::new();
        store
            .create_element(Point2::new(0.0, 0.0), rectangle(10.0, 10.0))
            .expect("seed");
        let initial = state(&store);
        let baseline = store.history().undo_len();

        for op in &ops {
            let ids: Vec<ElementId> = store.elements().iter().map(|e| e.id.clone()).collect();
            match op {
                Op::Add { x, y } => {
                    store.create_element(Point2::new(*x, *y), rectangle(10.0, 10.0));
                }
                Op::Update { pick, x, y } => {
                    if !ids.is_empty() {
                        let id = &ids[pick % ids.len()];
                        store.update_element(id, &ElementPatch::position(*x, *y));
                    }
                }
                Op::Remove { pick } => {
                    if !ids.is_empty() {
                        store.remove_element(&ids[pick % ids.len()]);
                    }
                }
            }
        }
        let finished = state(&store);
        let recorded = store.history().undo_len() - baseline;

        for _ in 0..recorded {
            prop_assert!(store.undo());
        }
        prop_assert_eq!(state(&store), initial);

        for _ in 0..recorded {
            prop_assert!(store.redo());
        }
        prop_assert_eq!(state(&store), finished);
    }
}
