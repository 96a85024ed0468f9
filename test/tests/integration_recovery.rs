use std::{cell::RefCell, rc::Rc};

use serde_json::json;

use shadow_objects_kernel::{Kernel, KernelConfig, ShadowObjectsModule};
use shadow_objects_shared::{ChangeRecord, Transferable};
use shadow_objects_test::{assert_mirrored, tracer, TraceLog, TestComponentBuilder, TestView};
use shadow_objects_view::ComponentEvent;

fn fresh_kernel(log: &TraceLog) -> Kernel {
    let mut kernel = Kernel::new(KernelConfig::default());
    kernel
        .import_module(&ShadowObjectsModule::new("nodes").define("node", tracer("Node", log)))
        .unwrap();
    kernel
}

#[test]
fn a_lost_kernel_is_rebuilt_top_down_from_memory() {
    let _ = env_logger::builder().is_test(true).try_init();

    let log = TraceLog::new();
    let mut view = TestView::with_kernel("recovery-rebuild", fresh_kernel(&log));
    let root = view.root("node").unwrap();
    let a = view
        .build(TestComponentBuilder::new("node").parent(&root).order(2))
        .unwrap();
    let b = view
        .build(TestComponentBuilder::new("node").parent(&root).order(1))
        .unwrap();
    let leaf = view.child(&a, "node").unwrap();
    view.flush().unwrap();
    log.drain();

    // unflushed edits at the time of loss end up on the new kernel too
    leaf.set_parent(Some(&b)).unwrap();
    a.set_property("label", json!("a")).unwrap();

    let trail = view.lose_kernel(fresh_kernel(&log)).unwrap();
    assert!(trail
        .iter()
        .all(|record| matches!(record, ChangeRecord::CreateEntities { .. })));
    assert_eq!(
        trail.iter().map(ChangeRecord::uuid).collect::<Vec<_>>(),
        vec![root.uuid(), b.uuid(), a.uuid(), leaf.uuid()]
    );
    assert_mirrored!(view);
    assert_eq!(view.kernel().entity(&leaf.uuid()).unwrap().parent_uuid(), Some(b.uuid()));
    assert_eq!(
        view.kernel().entity(&a.uuid()).unwrap().property("label"),
        Some(json!("a"))
    );

    let log = log.drain();
    assert_eq!(log.iter().filter(|entry| entry.as_str() == "Node destroy").count(), 4);
    assert_eq!(log.iter().filter(|entry| entry.as_str() == "Node create node").count(), 4);

    // the next window diffs against what the new kernel was sent
    assert!(view.flush().unwrap().is_empty());
}

#[test]
fn every_live_component_hears_about_the_loss_once() {
    let log = TraceLog::new();
    let mut view = TestView::with_kernel("recovery-notify", fresh_kernel(&log));
    let root = view.root("node").unwrap();
    let child = view.child(&root, "node").unwrap();
    view.flush().unwrap();

    let heard: Rc<RefCell<Vec<String>>> = Rc::default();
    for (name, component) in [("root", &root), ("child", &child)] {
        let heard = heard.clone();
        component
            .subscribe(move |event| {
                if *event == ComponentEvent::ContextLost {
                    heard.borrow_mut().push(name.to_string());
                }
            })
            .unwrap();
    }

    view.lose_kernel(fresh_kernel(&log)).unwrap();
    assert_eq!(*heard.borrow(), vec!["root", "child"]);
}

#[test]
fn events_queued_before_the_loss_are_delivered_once() {
    let log = TraceLog::new();
    let mut view = TestView::with_kernel("recovery-events", fresh_kernel(&log));
    let node = view.root("node").unwrap();
    view.flush().unwrap();
    log.drain();

    let texture = Transferable::from(vec![7u8; 16]);
    node.dispatch_shadow_objects_event("upload", json!("texture"), vec![texture])
        .unwrap();

    view.lose_kernel(fresh_kernel(&log)).unwrap();
    assert_eq!(log.drain(), vec!["Node destroy", "Node create node", "Node event upload 1"]);

    assert!(view.flush().unwrap().is_empty());
    assert!(log.is_empty());
}

#[test]
fn components_destroyed_before_the_loss_stay_gone() {
    let log = TraceLog::new();
    let mut view = TestView::with_kernel("recovery-destroyed", fresh_kernel(&log));
    let keep = view.root("node").unwrap();
    let gone = view.root("node").unwrap();
    view.flush().unwrap();

    gone.destroy().unwrap();
    view.lose_kernel(fresh_kernel(&log)).unwrap();

    assert_eq!(view.kernel().root_uuids(), vec![keep.uuid()]);
    assert!(!view.kernel().has_entity(&gone.uuid()));
    assert_mirrored!(view);
}
