use serde_json::json;

use shadow_objects_kernel::ShadowObjectsModule;
use shadow_objects_test::{assert_mirrored, assert_trail_types, tracer, TraceLog, TestComponentBuilder, TestView};

fn scene_module(log: &TraceLog) -> ShadowObjectsModule {
    ShadowObjectsModule::new("scene")
        .define("mesh", tracer("Mesh", log))
        .define("light", tracer("Light", log))
        .define("object3d", tracer("Object3D", log))
        .route("mesh", ["object3d"])
        .route("light", ["object3d"])
}

#[test]
fn a_built_tree_is_mirrored_by_the_kernel() {
    let log = TraceLog::new();
    let mut view = TestView::new("e2e-build");
    view.import(&scene_module(&log)).unwrap();

    let scene = view.root("scene").unwrap();
    let mesh = view
        .build(TestComponentBuilder::new("mesh").parent(&scene).order(2))
        .unwrap();
    let light = view
        .build(TestComponentBuilder::new("light").parent(&scene).order(1))
        .unwrap();

    let trail = view.flush().unwrap();
    assert_trail_types!(trail, [CreateEntities, CreateEntities, CreateEntities]);
    assert_eq!(trail[1].uuid(), light.uuid());
    assert_eq!(trail[2].uuid(), mesh.uuid());
    assert_mirrored!(view);

    assert_eq!(
        log.drain(),
        vec!["Light create light", "Object3D create light", "Mesh create mesh", "Object3D create mesh"]
    );
    assert_eq!(
        view.kernel().entity(&scene.uuid()).unwrap().children(),
        vec![light.uuid(), mesh.uuid()]
    );
}

#[test]
fn structural_edits_keep_the_mirror_in_step() {
    let log = TraceLog::new();
    let mut view = TestView::new("e2e-edits");
    view.import(&scene_module(&log)).unwrap();

    let scene = view.root("scene").unwrap();
    let group = view.child(&scene, "group").unwrap();
    let mesh = view.child(&scene, "mesh").unwrap();
    view.flush().unwrap();
    log.drain();

    mesh.set_parent(Some(&group)).unwrap();
    mesh.set_order(7).unwrap();
    group.set_order(-1).unwrap();
    view.flush().unwrap();
    assert_mirrored!(view);
    assert!(log.is_empty());

    mesh.set_token("light").unwrap();
    let trail = view.flush().unwrap();
    assert_trail_types!(trail, [ChangeToken]);
    assert_eq!(log.drain(), vec!["Mesh destroy", "Light create light"]);
    assert_eq!(
        view.kernel().shadow_object_names(&mesh.uuid()),
        vec!["Light".to_string(), "Object3D".to_string()]
    );

    mesh.set_parent(None).unwrap();
    view.flush().unwrap();
    assert_mirrored!(view);
    assert_eq!(view.kernel().root_uuids().len(), 2);
}

#[test]
fn destroying_a_parent_re_roots_children_on_both_sides() {
    let log = TraceLog::new();
    let mut view = TestView::new("e2e-destroy");
    view.import(&scene_module(&log)).unwrap();

    let scene = view.root("scene").unwrap();
    let mesh = view.child(&scene, "mesh").unwrap();
    view.flush().unwrap();
    log.drain();

    scene.destroy().unwrap();
    let trail = view.flush().unwrap();
    assert_trail_types!(trail, [SetParent, DestroyEntities]);
    assert_mirrored!(view);
    assert_eq!(view.kernel().root_uuids(), vec![mesh.uuid()]);
    assert!(!view.kernel().has_entity(&scene.uuid()));
}

#[test]
fn removing_a_sub_tree_tears_down_every_descendant() {
    let log = TraceLog::new();
    let mut view = TestView::new("e2e-subtree");
    view.import(&scene_module(&log)).unwrap();

    let scene = view.root("scene").unwrap();
    let group = view.child(&scene, "group").unwrap();
    view.child(&group, "mesh").unwrap();
    view.child(&group, "light").unwrap();
    view.flush().unwrap();
    log.drain();

    group.remove_sub_tree().unwrap();
    let trail = view.flush().unwrap();
    assert_trail_types!(trail, [DestroyEntities, DestroyEntities, DestroyEntities]);
    assert_eq!(trail[2].uuid(), group.uuid());
    assert_mirrored!(view);
    assert_eq!(view.kernel().len(), 1);

    let mut destroyed = log.drain();
    destroyed.sort();
    assert_eq!(
        destroyed,
        vec!["Light destroy", "Mesh destroy", "Object3D destroy", "Object3D destroy"]
    );
}

#[test]
fn a_component_created_and_destroyed_between_flushes_never_reaches_the_kernel() {
    let log = TraceLog::new();
    let mut view = TestView::new("e2e-transient");
    view.import(&scene_module(&log)).unwrap();

    let transient = view
        .build(TestComponentBuilder::new("mesh").property("label", json!("gone")))
        .unwrap();
    transient.dispatch_shadow_objects_event("ping", json!(null), Vec::new()).unwrap();
    transient.destroy().unwrap();

    let trail = view.flush().unwrap();
    assert!(trail.is_empty());
    assert!(view.kernel().is_empty());
    assert!(log.is_empty());
}
