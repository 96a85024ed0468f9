use std::{cell::RefCell, rc::Rc};

use serde_json::json;

use shadow_objects_kernel::ShadowObjectsModule;
use shadow_objects_shared::{ChangeRecord, Transferable, Uuid};
use shadow_objects_view::ComponentEvent;
use shadow_objects_test::{assert_trail_types, tracer, TraceLog, TestView};

fn view_with_tracers(name: &str, log: &TraceLog) -> TestView {
    let mut view = TestView::new(name);
    view.import(&ShadowObjectsModule::new("events").define("node", tracer("Node", log)))
        .unwrap();
    view
}

#[test]
fn events_of_one_window_travel_in_one_record() {
    let log = TraceLog::new();
    let mut view = view_with_tracers("events-batch", &log);
    let node = view.root("node").unwrap();
    view.flush().unwrap();
    log.drain();

    let buffer = Transferable::from(vec![1u8; 8]);
    let other = Transferable::from(vec![2u8; 8]);
    node.dispatch_shadow_objects_event("a", json!(1), vec![buffer.clone()])
        .unwrap();
    node.dispatch_shadow_objects_event("b", json!(2), vec![buffer, other])
        .unwrap();

    let trail = view.flush().unwrap();
    assert_trail_types!(trail, [SendEvents]);
    let ChangeRecord::SendEvents { events, transferables, .. } = &trail[0] else {
        panic!("expected a send events record");
    };
    assert_eq!(
        events.iter().map(|event| event.event_type.as_str()).collect::<Vec<_>>(),
        vec!["a", "b"]
    );
    assert_eq!(transferables.len(), 2);
    assert_eq!(log.drain(), vec!["Node event a 2", "Node event b 2"]);
}

#[test]
fn events_follow_the_content_of_their_window() {
    let log = TraceLog::new();
    let mut view = view_with_tracers("events-after-create", &log);
    let node = view.root("node").unwrap();
    node.set_property("x", json!(1)).unwrap();
    node.dispatch_shadow_objects_event("ready", json!(null), Vec::new())
        .unwrap();

    let trail = view.flush().unwrap();
    assert_trail_types!(trail, [CreateEntities, SendEvents]);
    assert_eq!(log.drain(), vec!["Node create node", "Node event ready 0"]);
}

#[test]
fn a_destroyed_component_still_receives_its_last_events() {
    let log = TraceLog::new();
    let mut view = view_with_tracers("events-before-destroy", &log);
    let node = view.root("node").unwrap();
    view.flush().unwrap();
    log.drain();

    node.dispatch_shadow_objects_event("bye", json!(null), Vec::new())
        .unwrap();
    node.destroy().unwrap();

    let trail = view.flush().unwrap();
    assert_trail_types!(trail, [SendEvents, DestroyEntities]);
    assert_eq!(log.drain(), vec!["Node event bye 0", "Node destroy"]);
}

#[test]
fn broadcasts_stay_on_the_view_side() {
    let log = TraceLog::new();
    let mut view = view_with_tracers("events-broadcast", &log);
    let root = view.root("node").unwrap();
    let child = view.child(&root, "node").unwrap();
    view.flush().unwrap();
    log.drain();

    let heard: Rc<RefCell<Vec<Uuid>>> = Rc::default();
    for component in [&root, &child] {
        let heard = heard.clone();
        let uuid = component.uuid();
        component
            .subscribe(move |event| {
                if let ComponentEvent::Broadcast { event_type, .. } = event {
                    assert_eq!(event_type, "resize");
                    heard.borrow_mut().push(uuid);
                }
            })
            .unwrap();
    }

    view.context().broadcast_event("resize", json!({ "width": 800 })).unwrap();
    assert_eq!(*heard.borrow(), vec![root.uuid(), child.uuid()]);
    assert!(view.flush().unwrap().is_empty());
    assert!(log.is_empty());
}
