use std::collections::HashMap;

use shadow_objects_shared::{is_truthy, OrderedUuids, Uuid, Value};

use crate::reactive::{Signal, SignalSubscription};

/// Reactive cell holding one property or context value. `None` means
/// unset.
pub type PropertySignal = Signal<Option<Value>>;

fn new_cell(value: Option<Value>) -> PropertySignal {
    Signal::new(value)
}

// A consumed context: a local cell mirroring the nearest ancestor provider
struct ContextBinding {
    local: PropertySignal,
    source: Option<(PropertySignal, SignalSubscription)>,
}

impl ContextBinding {
    fn unbind(&mut self) {
        if let Some((provider, key)) = self.source.take() {
            provider.unsubscribe(key);
        }
    }
}

/// Mirror-side node created from a change trail.
///
/// Tree links are maintained by the [`Kernel`](crate::Kernel); an entity only
/// knows its parent uuid and its ordered children.
pub struct Entity {
    uuid: Uuid,
    token: String,
    order: i32,
    parent_uuid: Option<Uuid>,
    children: OrderedUuids,
    properties: HashMap<String, PropertySignal>,
    provided: HashMap<String, PropertySignal>,
    consumed: HashMap<String, ContextBinding>,
}

impl Entity {
    pub(crate) fn new(uuid: Uuid, token: &str, parent_uuid: Option<Uuid>, order: i32) -> Self {
        Self {
            uuid,
            token: token.to_string(),
            order,
            parent_uuid,
            children: OrderedUuids::new(),
            properties: HashMap::new(),
            provided: HashMap::new(),
            consumed: HashMap::new(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn parent_uuid(&self) -> Option<Uuid> {
        self.parent_uuid
    }

    /// Child uuids in ascending order.
    pub fn children(&self) -> Vec<Uuid> {
        self.children.to_vec()
    }

    // Properties

    /// Current value of `key`. Tracked when read inside an effect and the
    /// cell exists.
    pub fn property(&self, key: &str) -> Option<Value> {
        self.properties.get(key).and_then(|cell| cell.get())
    }

    /// The cell of `key`, created unset on first access.
    pub fn property_signal(&mut self, key: &str) -> PropertySignal {
        self.properties
            .entry(key.to_string())
            .or_insert_with(|| new_cell(None))
            .clone()
    }

    /// Keys currently holding a value, sorted.
    pub fn property_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .properties
            .iter()
            .filter(|(_, cell)| cell.get_untracked().is_some())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn is_truthy(&self, key: &str) -> bool {
        let value = self.properties.get(key).and_then(|cell| cell.get_untracked());
        is_truthy(value.as_ref())
    }

    pub(crate) fn set_property(&mut self, key: &str, value: Option<Value>) -> bool {
        match self.properties.get(key) {
            Some(cell) => cell.set(value),
            None if value.is_none() => false,
            None => {
                self.properties.insert(key.to_string(), new_cell(value));
                true
            }
        }
    }

    // Structure

    pub(crate) fn set_token(&mut self, token: &str) {
        self.token = token.to_string();
    }

    pub(crate) fn set_order(&mut self, order: i32) {
        self.order = order;
    }

    pub(crate) fn set_parent_uuid(&mut self, parent_uuid: Option<Uuid>) {
        self.parent_uuid = parent_uuid;
    }

    pub(crate) fn children_mut(&mut self) -> &mut OrderedUuids {
        &mut self.children
    }

    // Contexts

    pub fn provided_context(&self, name: &str) -> Option<&PropertySignal> {
        self.provided.get(name)
    }

    /// Provides `value` under `name` to all descendants. Returns the cell and
    /// whether the name was newly provided.
    pub(crate) fn provide_context(&mut self, name: &str, value: Option<Value>) -> (PropertySignal, bool) {
        if let Some(cell) = self.provided.get(name) {
            cell.set(value);
            return (cell.clone(), false);
        }
        let cell = new_cell(value);
        self.provided.insert(name.to_string(), cell.clone());
        (cell, true)
    }

    /// The local cell mirroring context `name`. Returns whether the binding
    /// was newly created and still has to be bound.
    pub(crate) fn consume_context(&mut self, name: &str) -> (PropertySignal, bool) {
        if let Some(binding) = self.consumed.get(name) {
            return (binding.local.clone(), false);
        }
        let local = new_cell(None);
        self.consumed.insert(
            name.to_string(),
            ContextBinding {
                local: local.clone(),
                source: None,
            },
        );
        (local, true)
    }

    pub(crate) fn consumed_context_names(&self) -> Vec<String> {
        self.consumed.keys().cloned().collect()
    }

    /// Points the consumed context `name` at `provider`, or at nothing.
    pub(crate) fn bind_context(&mut self, name: &str, provider: Option<PropertySignal>) {
        let Some(binding) = self.consumed.get_mut(name) else {
            return;
        };

        let unchanged = match (&binding.source, &provider) {
            (Some((current, _)), Some(provider)) => current.same_cell(provider),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }

        binding.unbind();
        match provider {
            Some(provider) => {
                binding.local.set(provider.get_untracked());
                let local = binding.local.clone();
                let key = provider.subscribe(move |value| {
                    local.set(value.clone());
                });
                binding.source = Some((provider, key));
            }
            None => {
                binding.local.set(None);
            }
        }
    }

    /// Unsets every cell and drops all context subscriptions.
    pub(crate) fn destroy(&mut self) {
        for binding in self.consumed.values_mut() {
            binding.unbind();
            binding.local.set(None);
        }
        for cell in self.provided.values().chain(self.properties.values()) {
            cell.set(None);
        }
        self.consumed.clear();
        self.provided.clear();
        self.properties.clear();
        self.children.clear();
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("uuid", &self.uuid)
            .field("token", &self.token)
            .field("order", &self.order)
            .field("parent_uuid", &self.parent_uuid)
            .finish()
    }
}
