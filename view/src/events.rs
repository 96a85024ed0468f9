use std::rc::Rc;

use shadow_objects_shared::Value;

/// Events delivered to view-side subscribers of a component.
#[derive(Clone, Debug, PartialEq)]
pub enum ComponentEvent {
    /// The mirror side was lost; its state is going to be re-sent
    ContextLost,
    /// A shadow object sent a message to the component it mirrors
    Message { message_type: String, data: Value },
    /// An event broadcast to every live component of a context
    Broadcast { event_type: String, data: Value },
}

impl ComponentEvent {
    pub fn event_type(&self) -> &str {
        match self {
            Self::ContextLost => shadow_objects_shared::CONTEXT_LOST_EVENT,
            Self::Message { message_type, .. } => message_type,
            Self::Broadcast { event_type, .. } => event_type,
        }
    }
}

pub type ComponentListener = Rc<dyn Fn(&ComponentEvent)>;

/// Handle returned by `subscribe`, used to unsubscribe again.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionKey(u64);

impl SubscriptionKey {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }
}

// Subscribers of one component, in subscription order
pub(crate) struct ComponentListeners {
    listeners: Vec<(SubscriptionKey, ComponentListener)>,
}

impl ComponentListeners {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn insert(&mut self, key: SubscriptionKey, listener: ComponentListener) {
        self.listeners.push((key, listener));
    }

    pub fn remove(&mut self, key: &SubscriptionKey) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(known, _)| known != key);
        before != self.listeners.len()
    }

    pub fn snapshot(&self) -> Vec<ComponentListener> {
        self.listeners.iter().map(|(_, listener)| listener.clone()).collect()
    }
}
