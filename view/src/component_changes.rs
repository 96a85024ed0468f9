use std::{collections::HashMap, mem, rc::Rc};

use shadow_objects_shared::{
    ChangeRecord, ChangeTrail, ChangeTrailPhase, PropertyChange, ShadowObjectEvent, Transferable,
    Uuid, Value, DEFAULT_ORDER,
};

/// Custom equality used to decide whether a property write is a change.
pub type PropertyEquality = Rc<dyn Fn(&Value, &Value) -> bool>;

/// A pending field: either untouched since the last flush, or explicitly
/// set. `Pending<Option<Uuid>>` tells "move to root" apart from "no change".
#[derive(Clone, Debug, PartialEq)]
pub enum Pending<T> {
    Unset,
    Explicit(T),
}

impl<T> Pending<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Pending::Explicit(_))
    }

    fn take(&mut self) -> Pending<T> {
        mem::replace(self, Pending::Unset)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Accumulator exists, component was never created
    Unborn,
    /// Created in the current window, not yet flushed
    PendingCreate,
    /// Creation has been flushed
    Alive,
    /// Was alive before the current window and got destroyed in it
    PendingDestroy,
    /// Created and destroyed inside the same window, never observable
    Discarded,
    /// Destruction has been flushed
    Destroyed,
}

/// Per-component diff accumulator.
///
/// Records intents since the last flush and renders them as change
/// records, one phase at a time. Emitting a record moves the pending value
/// into the committed state, so the next flush diffs against what was
/// actually sent.
#[derive(Clone)]
pub struct ComponentChanges {
    uuid: Uuid,
    serial: u32,
    lifecycle: Lifecycle,

    committed_token: Option<String>,
    committed_parent: Option<Uuid>,
    committed_order: i32,
    committed_properties: HashMap<String, Value>,

    token: Pending<String>,
    parent: Pending<Option<Uuid>>,
    order: Pending<i32>,
    properties: HashMap<String, Option<Value>>,
    // last-write order of `properties`
    property_keys: Vec<String>,
    events: Vec<ShadowObjectEvent>,
    transferables: Vec<Transferable>,
}

impl ComponentChanges {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            serial: 0,
            lifecycle: Lifecycle::Unborn,
            committed_token: None,
            committed_parent: None,
            committed_order: DEFAULT_ORDER,
            committed_properties: HashMap::new(),
            token: Pending::Unset,
            parent: Pending::Unset,
            order: Pending::Unset,
            properties: HashMap::new(),
            property_keys: Vec::new(),
            events: Vec::new(),
            transferables: Vec::new(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn has_changes(&self) -> bool {
        self.serial > 0
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(
            self.lifecycle,
            Lifecycle::PendingDestroy | Lifecycle::Discarded | Lifecycle::Destroyed
        )
    }

    /// True once nothing about this component is left to report.
    pub fn is_removable(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Discarded | Lifecycle::Destroyed)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    // Lifecycle

    pub fn create(&mut self, token: &str, parent_uuid: Option<Uuid>, order: i32) {
        match self.lifecycle {
            Lifecycle::Unborn | Lifecycle::PendingCreate | Lifecycle::Discarded | Lifecycle::Destroyed => {
                *self = Self::new(self.uuid);
                self.lifecycle = Lifecycle::PendingCreate;
                self.token = Pending::Explicit(token.to_string());
                self.parent = Pending::Explicit(parent_uuid);
                self.order = Pending::Explicit(order);
            }
            Lifecycle::Alive | Lifecycle::PendingDestroy => {
                // Destroyed and re-created inside one window: the mirror keeps
                // its entity, everything it was told before is cleared
                self.lifecycle = Lifecycle::Alive;
                self.properties.clear();
                self.property_keys.clear();
                let committed_keys: Vec<String> = self.committed_properties.keys().cloned().collect();
                for key in committed_keys {
                    self.remove_property(&key);
                }
                self.change_token(token);
                self.set_parent(parent_uuid);
                self.change_order(order);
            }
        }
        self.serial += 1;
    }

    pub fn destroy(&mut self) {
        match self.lifecycle {
            Lifecycle::PendingCreate => {
                self.lifecycle = Lifecycle::Discarded;
            }
            Lifecycle::Alive => {
                self.lifecycle = Lifecycle::PendingDestroy;
            }
            Lifecycle::Unborn | Lifecycle::PendingDestroy | Lifecycle::Discarded | Lifecycle::Destroyed => {
                return;
            }
        }
        self.serial += 1;
    }

    // Structure

    pub fn change_token(&mut self, token: &str) {
        if self.committed_token.as_deref() == Some(token) {
            if self.token.take().is_set() {
                self.serial += 1;
            }
            return;
        }
        self.token = Pending::Explicit(token.to_string());
        self.serial += 1;
    }

    pub fn set_parent(&mut self, parent_uuid: Option<Uuid>) {
        if self.lifecycle != Lifecycle::PendingCreate && self.committed_parent == parent_uuid {
            if self.parent.take().is_set() {
                self.serial += 1;
            }
            return;
        }
        self.parent = Pending::Explicit(parent_uuid);
        self.serial += 1;
    }

    pub fn change_order(&mut self, order: i32) {
        if self.lifecycle != Lifecycle::PendingCreate && self.committed_order == order {
            if self.order.take().is_set() {
                self.serial += 1;
            }
            return;
        }
        self.order = Pending::Explicit(order);
        self.serial += 1;
    }

    // Content

    pub fn change_property(&mut self, key: &str, value: Value, is_equal: Option<&PropertyEquality>) {
        let unchanged = match self.committed_properties.get(key) {
            Some(committed) => match is_equal {
                Some(is_equal) => is_equal(committed, &value),
                None => *committed == value,
            },
            None => false,
        };

        if unchanged {
            if self.properties.remove(key).is_some() {
                self.property_keys.retain(|known| known != key);
                self.serial += 1;
            }
            return;
        }

        self.properties.insert(key.to_string(), Some(value));
        self.touch_property_key(key);
        self.serial += 1;
    }

    pub fn remove_property(&mut self, key: &str) {
        if self.committed_properties.contains_key(key) {
            self.properties.insert(key.to_string(), None);
            self.touch_property_key(key);
            self.serial += 1;
        } else if self.properties.remove(key).is_some() {
            self.property_keys.retain(|known| known != key);
            self.serial += 1;
        }
    }

    fn touch_property_key(&mut self, key: &str) {
        self.property_keys.retain(|known| known != key);
        self.property_keys.push(key.to_string());
    }

    // Events

    pub fn create_event(&mut self, event_type: &str, data: Value, transferables: Vec<Transferable>) {
        self.events.push(ShadowObjectEvent::new(event_type, data));
        Transferable::extend_deduped(&mut self.transferables, transferables);
        self.serial += 1;
    }

    /// Moves queued events & transferables onto `other`.
    pub fn transfer_events_to(&mut self, other: &mut ComponentChanges) {
        if self.events.is_empty() && self.transferables.is_empty() {
            return;
        }
        other.events.append(&mut self.events);
        Transferable::extend_deduped(&mut other.transferables, mem::take(&mut self.transferables));
        other.serial += 1;
    }

    // Trail

    pub fn build_change_trail(&mut self, trail: &mut ChangeTrail, phase: ChangeTrailPhase) {
        match phase {
            ChangeTrailPhase::StructuralChanges => self.build_structural_changes(trail),
            ChangeTrailPhase::ContentUpdates => self.build_content_updates(trail),
            ChangeTrailPhase::Removal => self.build_removal(trail),
        }
    }

    fn build_structural_changes(&mut self, trail: &mut ChangeTrail) {
        match self.lifecycle {
            Lifecycle::PendingCreate => {
                let token = match self.token.take() {
                    Pending::Explicit(token) => token,
                    Pending::Unset => self.committed_token.clone().unwrap_or_default(),
                };
                let parent_uuid = match self.parent.take() {
                    Pending::Explicit(parent_uuid) => parent_uuid,
                    Pending::Unset => None,
                };
                let order = match self.order.take() {
                    Pending::Explicit(order) => order,
                    Pending::Unset => DEFAULT_ORDER,
                };
                let properties = self.drain_properties();

                self.committed_token = Some(token.clone());
                self.committed_parent = parent_uuid;
                self.committed_order = order;
                self.lifecycle = Lifecycle::Alive;

                trail.push(ChangeRecord::CreateEntities {
                    uuid: self.uuid,
                    token,
                    parent_uuid,
                    order: (order != DEFAULT_ORDER).then_some(order),
                    properties,
                });
            }
            Lifecycle::Alive => {
                let order = match self.order.take() {
                    Pending::Explicit(order) if order != self.committed_order => Some(order),
                    _ => None,
                };

                match self.parent.take() {
                    Pending::Explicit(parent_uuid) if parent_uuid != self.committed_parent => {
                        self.committed_parent = parent_uuid;
                        if let Some(order) = order {
                            self.committed_order = order;
                        }
                        trail.push(ChangeRecord::SetParent {
                            uuid: self.uuid,
                            parent_uuid,
                            order,
                        });
                    }
                    _ => {
                        if let Some(order) = order {
                            self.committed_order = order;
                            trail.push(ChangeRecord::UpdateOrder {
                                uuid: self.uuid,
                                order,
                            });
                        }
                    }
                }

                if let Pending::Explicit(token) = self.token.take() {
                    if self.committed_token.as_deref() != Some(token.as_str()) {
                        self.committed_token = Some(token.clone());
                        trail.push(ChangeRecord::ChangeToken {
                            uuid: self.uuid,
                            token,
                        });
                    }
                }
            }
            _ => {}
        }
    }

    fn build_content_updates(&mut self, trail: &mut ChangeTrail) {
        if self.lifecycle == Lifecycle::Alive && !self.property_keys.is_empty() {
            let properties = self.drain_properties();
            if !properties.is_empty() {
                trail.push(ChangeRecord::ChangeProperties {
                    uuid: self.uuid,
                    properties,
                });
            }
        }

        if matches!(self.lifecycle, Lifecycle::Alive | Lifecycle::PendingDestroy) && !self.events.is_empty() {
            trail.push(ChangeRecord::SendEvents {
                uuid: self.uuid,
                events: mem::take(&mut self.events),
                transferables: mem::take(&mut self.transferables),
            });
        }
    }

    fn build_removal(&mut self, trail: &mut ChangeTrail) {
        if self.lifecycle == Lifecycle::PendingDestroy {
            self.lifecycle = Lifecycle::Destroyed;
            self.committed_properties.clear();
            trail.push(ChangeRecord::DestroyEntities { uuid: self.uuid });
        }
    }

    // Takes pending property writes in last-write order, committing them.
    fn drain_properties(&mut self) -> Vec<PropertyChange> {
        let mut drained = Vec::with_capacity(self.property_keys.len());
        for key in mem::take(&mut self.property_keys) {
            let Some(value) = self.properties.remove(&key) else {
                continue;
            };
            match &value {
                Some(value) => {
                    self.committed_properties.insert(key.clone(), value.clone());
                }
                None => {
                    if self.committed_properties.remove(&key).is_none() {
                        continue;
                    }
                }
            }
            drained.push(PropertyChange { key, value });
        }
        self.properties.clear();
        drained
    }

    /// Resets pending state after a flush. Committed state is kept.
    pub fn clear(&mut self) {
        if !self.events.is_empty() {
            log::warn!(
                "Dropping {} undelivered event(s) of component {}",
                self.events.len(),
                self.uuid
            );
        }
        self.serial = 0;
        self.token = Pending::Unset;
        self.parent = Pending::Unset;
        self.order = Pending::Unset;
        self.properties.clear();
        self.property_keys.clear();
        self.events.clear();
        self.transferables.clear();
    }
}
