use serde_json::json;

use shadow_objects_kernel::{Kernel, KernelConfig};
use shadow_objects_shared::{ChangeRecord, PropertyChange, Value};
use shadow_objects_test::{assert_mirrored, assert_trail_types, TestComponentBuilder, TestView};

fn values() -> Vec<(&'static str, Value)> {
    vec![
        ("label", json!("cube")),
        ("count", json!(3)),
        ("ratio", json!(0.5)),
        ("visible", json!(false)),
        ("nothing", Value::Null),
        ("position", json!([1, 2, 3])),
        ("material", json!({ "color": "#ff0000", "layers": [1, 2] })),
    ]
}

#[test]
fn every_json_kind_crosses_the_boundary_intact() {
    let mut view = TestView::new("props-kinds");
    let mut builder = TestComponentBuilder::new("node");
    for (key, value) in values() {
        builder = builder.property(key, value);
    }
    let node = view.build(builder).unwrap();

    let trail = view.flush().unwrap();
    assert_trail_types!(trail, [CreateEntities]);
    let ChangeRecord::CreateEntities { properties, .. } = &trail[0] else {
        panic!("expected a create record");
    };
    assert_eq!(properties.len(), values().len());

    let entity = view.kernel().entity(&node.uuid()).unwrap();
    for (key, value) in values() {
        assert_eq!(entity.property(key), Some(value), "property {}", key);
    }
    assert_mirrored!(view);
}

#[test]
fn removal_is_distinct_from_null() {
    let mut view = TestView::new("props-removal");
    let node = view
        .build(
            TestComponentBuilder::new("node")
                .property("a", json!(1))
                .property("b", json!(2)),
        )
        .unwrap();
    view.flush().unwrap();

    node.remove_property("a").unwrap();
    node.set_property("b", Value::Null).unwrap();
    let trail = view.flush().unwrap();
    assert_eq!(
        trail,
        vec![ChangeRecord::ChangeProperties {
            uuid: node.uuid(),
            properties: vec![PropertyChange::remove("a"), PropertyChange::set("b", Value::Null)],
        }]
    );

    let entity = view.kernel().entity(&node.uuid()).unwrap();
    assert_eq!(entity.property("a"), None);
    assert_eq!(entity.property("b"), Some(Value::Null));
}

#[test]
fn writes_back_to_the_sent_value_are_coalesced_away() {
    let mut view = TestView::new("props-coalesce");
    let node = view
        .build(TestComponentBuilder::new("node").property("x", json!(1)))
        .unwrap();
    view.flush().unwrap();

    node.set_property("x", json!(2)).unwrap();
    node.set_property("x", json!(1)).unwrap();
    assert!(view.flush().unwrap().is_empty());

    // a key added and removed inside one window was never sent
    node.set_property("tmp", json!("t")).unwrap();
    node.remove_property("tmp").unwrap();
    assert!(view.flush().unwrap().is_empty());
}

fn close_enough(a: &Value, b: &Value) -> bool {
    match (a.as_array(), b.as_array()) {
        (Some(a), Some(b)) => a
            .iter()
            .zip(b)
            .all(|(a, b)| (a.as_f64().unwrap_or(0.0) - b.as_f64().unwrap_or(0.0)).abs() < 0.01),
        _ => a == b,
    }
}

#[test]
fn custom_equality_suppresses_near_identical_writes() {
    let mut view = TestView::new("props-equality");
    let node = view.root("node").unwrap();
    node.set_property("pos", json!([0.0, 0.0])).unwrap();
    view.flush().unwrap();

    node.set_property_with_equality("pos", json!([0.001, 0.0]), close_enough)
        .unwrap();
    assert!(view.flush().unwrap().is_empty());

    node.set_property_with_equality("pos", json!([1.0, 0.0]), close_enough)
        .unwrap();
    view.flush().unwrap();
    assert_eq!(
        view.kernel().entity(&node.uuid()).unwrap().property("pos"),
        Some(json!([1.0, 0.0]))
    );
}

#[test]
fn a_fresh_kernel_receives_the_last_sent_properties() {
    let mut view = TestView::new("props-recovery");
    let node = view.root("node").unwrap();
    for (key, value) in values() {
        node.set_property(key, value).unwrap();
    }
    view.flush().unwrap();
    node.remove_property("count").unwrap();
    node.set_property("label", json!("sphere")).unwrap();
    view.flush().unwrap();

    view.lose_kernel(Kernel::new(KernelConfig::default())).unwrap();

    let entity = view.kernel().entity(&node.uuid()).unwrap();
    assert_eq!(entity.property("count"), None);
    assert_eq!(entity.property("label"), Some(json!("sphere")));
    assert_eq!(entity.property("nothing"), Some(Value::Null));
    assert_eq!(entity.property("material"), Some(json!({ "color": "#ff0000", "layers": [1, 2] })));
    assert_mirrored!(view);
}
