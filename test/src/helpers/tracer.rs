use std::{cell::RefCell, rc::Rc};

use shadow_objects_kernel::{
    shared::{ShadowObjectEvent, Transferable},
    ShadowObject, ShadowObjectConstructor, ShadowObjectScope,
};

/// Shared log every tracer appends to, in call order.
#[derive(Clone, Default)]
pub struct TraceLog {
    entries: Rc<RefCell<Vec<String>>>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: String) {
        self.entries.borrow_mut().push(entry);
    }

    /// Entries logged since the last drain
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Shadow object that logs its lifecycle as `"<name> create <token>"`,
/// `"<name> event <type> <transferables>"` and `"<name> destroy"`.
pub struct Tracer {
    name: String,
    log: TraceLog,
}

impl ShadowObject for Tracer {
    fn on_event(&mut self, _scope: &mut ShadowObjectScope<'_>, event: &ShadowObjectEvent, transferables: &[Transferable]) {
        self.log
            .push(format!("{} event {} {}", self.name, event.event_type, transferables.len()));
    }

    fn on_destroy(&mut self, _scope: &mut ShadowObjectScope<'_>) {
        self.log.push(format!("{} destroy", self.name));
    }
}

pub fn tracer(name: &str, log: &TraceLog) -> ShadowObjectConstructor {
    let tracer_name = name.to_string();
    let log = log.clone();
    ShadowObjectConstructor::new(name, move |scope| {
        log.push(format!("{} create {}", tracer_name, scope.token().unwrap_or_default()));
        Tracer {
            name: tracer_name.clone(),
            log: log.clone(),
        }
    })
}
