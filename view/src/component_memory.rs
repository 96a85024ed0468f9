use std::collections::HashMap;

use shadow_objects_shared::{ChangeRecord, PropertyChange, Uuid, Value, DEFAULT_ORDER};

/// Last state of a component as the mirror side has been told it.
#[derive(Clone, Debug, PartialEq)]
pub struct RememberedComponent {
    pub token: String,
    pub parent_uuid: Option<Uuid>,
    pub order: i32,
    // first-write order
    pub properties: Vec<(String, Value)>,
}

impl RememberedComponent {
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(known, _)| known == key)
            .map(|(_, value)| value)
    }

    fn apply_properties(&mut self, changes: &[PropertyChange]) {
        for change in changes {
            let slot = self.properties.iter().position(|(known, _)| *known == change.key);
            match (&change.value, slot) {
                (Some(value), Some(index)) => self.properties[index].1 = value.clone(),
                (Some(value), None) => self.properties.push((change.key.clone(), value.clone())),
                (None, Some(index)) => {
                    self.properties.remove(index);
                }
                (None, None) => {}
            }
        }
    }
}

/// Snapshot of every component the mirror side currently knows about,
/// rebuilt by replaying emitted change trails.
pub struct ComponentMemory {
    components: HashMap<Uuid, RememberedComponent>,
}

impl ComponentMemory {
    pub fn new() -> Self {
        Self {
            components: HashMap::new(),
        }
    }

    pub fn write(&mut self, trail: &[ChangeRecord]) {
        for record in trail {
            match record {
                ChangeRecord::CreateEntities {
                    uuid,
                    token,
                    parent_uuid,
                    order,
                    properties,
                } => {
                    let mut remembered = RememberedComponent {
                        token: token.clone(),
                        parent_uuid: *parent_uuid,
                        order: order.unwrap_or(DEFAULT_ORDER),
                        properties: Vec::new(),
                    };
                    remembered.apply_properties(properties);
                    self.components.insert(*uuid, remembered);
                }
                ChangeRecord::DestroyEntities { uuid } => {
                    self.components.remove(uuid);
                }
                ChangeRecord::SetParent {
                    uuid,
                    parent_uuid,
                    order,
                } => {
                    if let Some(remembered) = self.components.get_mut(uuid) {
                        remembered.parent_uuid = *parent_uuid;
                        if let Some(order) = order {
                            remembered.order = *order;
                        }
                    }
                }
                ChangeRecord::UpdateOrder { uuid, order } => {
                    if let Some(remembered) = self.components.get_mut(uuid) {
                        remembered.order = *order;
                    }
                }
                ChangeRecord::ChangeToken { uuid, token } => {
                    if let Some(remembered) = self.components.get_mut(uuid) {
                        remembered.token = token.clone();
                    }
                }
                ChangeRecord::ChangeProperties { uuid, properties } => {
                    if let Some(remembered) = self.components.get_mut(uuid) {
                        remembered.apply_properties(properties);
                    }
                }
                ChangeRecord::SendEvents { .. } => {}
            }
        }
    }

    pub fn get(&self, uuid: &Uuid) -> Option<&RememberedComponent> {
        self.components.get(uuid)
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.components.contains_key(uuid)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn clear(&mut self) {
        self.components.clear();
    }
}

impl Default for ComponentMemory {
    fn default() -> Self {
        Self::new()
    }
}
