use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    mem,
    rc::Rc,
};

use log::{debug, info, trace};

use shadow_objects_shared::{
    ChangeRecord, MessageToView, OrderedUuids, PropertyChange, ShadowObjectEvent, Transferable, Uuid, Value,
    DEFAULT_ORDER,
};

use crate::{
    reactive::batch,
    shadow_object::{MessageOutbox, ViewMessenger},
    ConstructorId, Entity, KernelConfig, KernelError, PropertySignal, Registry, ShadowObject,
    ShadowObjectConstructor, ShadowObjectScope, ShadowObjectsModule,
};

struct AttachedObject {
    constructor: ShadowObjectConstructor,
    // taken out while the object is being called
    object: Option<Box<dyn ShadowObject>>,
}

struct KernelEntry {
    entity: Entity,
    objects: Vec<AttachedObject>,
}

/// Applies change trails to the entity tree and keeps every entity's shadow
/// objects in line with what its token currently resolves to.
pub struct Kernel {
    config: KernelConfig,
    registry: Registry,
    entries: HashMap<Uuid, KernelEntry>,
    root_uuids: OrderedUuids,
    traversal_cache: Option<Vec<Uuid>>,
    outbox: MessageOutbox,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Self {
        Self {
            config,
            registry: Registry::new(),
            entries: HashMap::new(),
            root_uuids: OrderedUuids::new(),
            traversal_cache: None,
            outbox: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Direct registry access. Entities already alive are not re-resolved;
    /// call [`Self::upgrade_entities`] afterwards.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn import_module(&mut self, module: &ShadowObjectsModule) -> Result<(), KernelError> {
        let imported = self.registry.import_module(module)?;
        if imported && self.config.upgrade_on_import && !self.entries.is_empty() {
            self.upgrade_entities();
        }
        Ok(())
    }

    // Change trails

    /// Applies `change_trail` in order, inside one reactive batch.
    pub fn run(&mut self, change_trail: &[ChangeRecord]) -> Result<(), KernelError> {
        debug!("Applying change trail of {} record(s)", change_trail.len());
        batch(|| {
            for record in change_trail {
                self.parse(record)?;
            }
            Ok(())
        })
    }

    fn parse(&mut self, record: &ChangeRecord) -> Result<(), KernelError> {
        trace!("  {:?} {}", record.get_type(), record.uuid());
        match record {
            ChangeRecord::CreateEntities {
                uuid,
                token,
                parent_uuid,
                order,
                properties,
            } => self.create_entity(*uuid, token, *parent_uuid, order.unwrap_or(DEFAULT_ORDER), properties),
            ChangeRecord::DestroyEntities { uuid } => self.destroy_entity(uuid),
            ChangeRecord::SetParent {
                uuid,
                parent_uuid,
                order,
            } => self.set_parent(uuid, *parent_uuid, *order),
            ChangeRecord::UpdateOrder { uuid, order } => self.update_order(uuid, *order),
            ChangeRecord::ChangeToken { uuid, token } => self.change_token(uuid, token),
            ChangeRecord::ChangeProperties { uuid, properties } => self.change_properties(uuid, properties),
            ChangeRecord::SendEvents {
                uuid,
                events,
                transferables,
            } => self.send_events(uuid, events, transferables),
        }
    }

    fn create_entity(
        &mut self,
        uuid: Uuid,
        token: &str,
        parent_uuid: Option<Uuid>,
        order: i32,
        properties: &[PropertyChange],
    ) -> Result<(), KernelError> {
        if self.entries.contains_key(&uuid) {
            return Err(KernelError::EntityAlreadyExists { uuid });
        }
        if let Some(parent) = parent_uuid {
            if !self.entries.contains_key(&parent) {
                return Err(KernelError::ParentNotFound {
                    uuid,
                    parent_uuid: parent,
                });
            }
        }

        let mut entity = Entity::new(uuid, token, parent_uuid, order);
        for change in properties {
            entity.set_property(&change.key, change.value.clone());
        }
        self.entries.insert(
            uuid,
            KernelEntry {
                entity,
                objects: Vec::new(),
            },
        );
        self.add_to_children(parent_uuid, uuid, order);

        self.attach_shadow_objects(&uuid);
        Ok(())
    }

    fn destroy_entity(&mut self, uuid: &Uuid) -> Result<(), KernelError> {
        let entity = self.entity_or_err(uuid, "destroy entity")?;
        let parent_uuid = entity.parent_uuid();
        let children = entity.children();

        let attached: Vec<ConstructorId> = self.attached_ids(uuid);
        for id in attached {
            self.destroy_shadow_object(uuid, id);
        }

        self.remove_from_parent(uuid, parent_uuid);
        for child in children {
            if let Some(entry) = self.entries.get_mut(&child) {
                entry.entity.set_parent_uuid(None);
                let order = entry.entity.order();
                self.add_to_children(None, child, order);
                self.rebind_contexts(&child);
            }
        }

        if let Some(mut entry) = self.entries.remove(uuid) {
            entry.entity.destroy();
        }
        self.traversal_cache = None;
        Ok(())
    }

    fn set_parent(&mut self, uuid: &Uuid, parent_uuid: Option<Uuid>, order: Option<i32>) -> Result<(), KernelError> {
        let current_parent = self.entity_or_err(uuid, "set parent")?.parent_uuid();
        if let Some(parent) = parent_uuid {
            if !self.entries.contains_key(&parent) {
                return Err(KernelError::ParentNotFound {
                    uuid: *uuid,
                    parent_uuid: parent,
                });
            }
        }

        self.remove_from_parent(uuid, current_parent);
        let entity = self.entity_mut_or_err(uuid, "set parent")?;
        entity.set_parent_uuid(parent_uuid);
        if let Some(order) = order {
            entity.set_order(order);
        }
        let order = entity.order();
        self.add_to_children(parent_uuid, *uuid, order);

        self.rebind_contexts(uuid);
        Ok(())
    }

    fn update_order(&mut self, uuid: &Uuid, order: i32) -> Result<(), KernelError> {
        let entity = self.entity_mut_or_err(uuid, "update order")?;
        entity.set_order(order);
        let parent_uuid = entity.parent_uuid();

        self.remove_from_parent(uuid, parent_uuid);
        self.add_to_children(parent_uuid, *uuid, order);
        Ok(())
    }

    fn change_token(&mut self, uuid: &Uuid, token: &str) -> Result<(), KernelError> {
        self.entity_mut_or_err(uuid, "change token")?.set_token(token);
        self.update_shadow_objects(uuid);
        Ok(())
    }

    fn change_properties(&mut self, uuid: &Uuid, properties: &[PropertyChange]) -> Result<(), KernelError> {
        let entity = self.entity_mut_or_err(uuid, "change properties")?;
        let changed: Vec<&str> = properties
            .iter()
            .filter(|change| entity.set_property(&change.key, change.value.clone()))
            .map(|change| change.key.as_str())
            .collect();
        if changed.iter().any(|key| self.registry.is_gating_property(key)) {
            self.update_shadow_objects(uuid);
        }
        Ok(())
    }

    fn send_events(
        &mut self,
        uuid: &Uuid,
        events: &[ShadowObjectEvent],
        transferables: &[Transferable],
    ) -> Result<(), KernelError> {
        self.entity_or_err(uuid, "send events")?;
        for event in events {
            for id in self.attached_ids(uuid) {
                self.with_shadow_object(uuid, id, |object, scope| {
                    object.on_event(scope, event, transferables);
                });
            }
        }
        Ok(())
    }

    // Shadow objects

    fn attached_ids(&self, uuid: &Uuid) -> Vec<ConstructorId> {
        self.entries
            .get(uuid)
            .map(|entry| entry.objects.iter().map(|attached| attached.constructor.id()).collect())
            .unwrap_or_default()
    }

    /// Names of the constructors whose objects are attached to `uuid`, in
    /// resolution order.
    pub fn shadow_object_names(&self, uuid: &Uuid) -> Vec<String> {
        self.entries
            .get(uuid)
            .map(|entry| {
                entry
                    .objects
                    .iter()
                    .map(|attached| attached.constructor.name().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn resolve_constructors(&self, uuid: &Uuid) -> Option<Vec<ShadowObjectConstructor>> {
        let entity = &self.entries.get(uuid)?.entity;
        Some(
            self.registry
                .find_constructors(entity.token(), |key| entity.is_truthy(key)),
        )
    }

    fn update_shadow_objects(&mut self, uuid: &Uuid) {
        self.retire_shadow_objects(uuid);
        self.attach_shadow_objects(uuid);
    }

    // Destroys objects whose constructor no longer resolves
    fn retire_shadow_objects(&mut self, uuid: &Uuid) {
        let Some(resolved) = self.resolve_constructors(uuid) else {
            return;
        };
        let retired: Vec<ConstructorId> = self
            .attached_ids(uuid)
            .into_iter()
            .filter(|id| !resolved.iter().any(|constructor| constructor.id() == *id))
            .collect();
        for id in retired {
            self.destroy_shadow_object(uuid, id);
        }
    }

    // Constructs objects for newly resolving constructors. Objects that were
    // already attached keep their identity.
    fn attach_shadow_objects(&mut self, uuid: &Uuid) {
        let Some(resolved) = self.resolve_constructors(uuid) else {
            return;
        };

        for constructor in &resolved {
            let Some(entry) = self.entries.get_mut(uuid) else {
                return;
            };
            if entry
                .objects
                .iter()
                .any(|attached| attached.constructor.id() == constructor.id())
            {
                continue;
            }
            entry.objects.push(AttachedObject {
                constructor: constructor.clone(),
                object: None,
            });

            let object = {
                let mut scope = ShadowObjectScope::new(self, *uuid);
                constructor.construct(&mut scope)
            };
            if let Some(slot) = self.slot_mut(uuid, constructor.id()) {
                slot.object = Some(object);
                trace!("Attached shadow object {} to entity {}", constructor.name(), uuid);
            }
        }

        if let Some(entry) = self.entries.get_mut(uuid) {
            entry.objects.sort_by_key(|attached| {
                resolved
                    .iter()
                    .position(|constructor| constructor.id() == attached.constructor.id())
                    .unwrap_or(usize::MAX)
            });
        }
    }

    fn destroy_shadow_object(&mut self, uuid: &Uuid, id: ConstructorId) {
        self.with_shadow_object(uuid, id, |object, scope| object.on_destroy(scope));
        if let Some(entry) = self.entries.get_mut(uuid) {
            entry.objects.retain(|attached| attached.constructor.id() != id);
        }
        trace!("Destroyed shadow object of entity {}", uuid);
    }

    fn slot_mut(&mut self, uuid: &Uuid, id: ConstructorId) -> Option<&mut AttachedObject> {
        self.entries
            .get_mut(uuid)?
            .objects
            .iter_mut()
            .find(|attached| attached.constructor.id() == id)
    }

    // Takes the object out of its slot while it runs, so it can be handed a
    // scope borrowing the kernel
    fn with_shadow_object(
        &mut self,
        uuid: &Uuid,
        id: ConstructorId,
        call: impl FnOnce(&mut dyn ShadowObject, &mut ShadowObjectScope<'_>),
    ) {
        let Some(mut object) = self.slot_mut(uuid, id).and_then(|slot| slot.object.take()) else {
            return;
        };
        {
            let mut scope = ShadowObjectScope::new(self, *uuid);
            call(object.as_mut(), &mut scope);
        }
        if let Some(slot) = self.slot_mut(uuid, id) {
            slot.object = Some(object);
        }
    }

    /// Re-resolves the shadow objects of every entity: stale ones are torn
    /// down leaves first, new ones are constructed parents first.
    pub fn upgrade_entities(&mut self) {
        batch(|| {
            let bottom_up = self.traverse_level_order_bfs_reverse();
            for uuid in &bottom_up {
                self.retire_shadow_objects(uuid);
            }
            let top_down = self.traverse_level_order_bfs();
            for uuid in &top_down {
                self.attach_shadow_objects(uuid);
            }
            info!("Upgraded shadow objects of {} entities", top_down.len());
        });
    }

    // Contexts

    /// Provides `value` as context `name` to every descendant of `uuid`.
    pub fn provide_context(
        &mut self,
        uuid: &Uuid,
        name: &str,
        value: Option<Value>,
    ) -> Result<PropertySignal, KernelError> {
        let (cell, newly_provided) = self
            .entity_mut_or_err(uuid, "provide context")?
            .provide_context(name, value);
        if newly_provided {
            self.rebind_contexts(uuid);
        }
        Ok(cell)
    }

    /// A cell following context `name` as provided by the nearest ancestor
    /// of `uuid`. Unset while no ancestor provides it.
    pub fn use_context(&mut self, uuid: &Uuid, name: &str) -> Result<PropertySignal, KernelError> {
        let (cell, newly_consumed) = self.entity_mut_or_err(uuid, "use context")?.consume_context(name);
        if newly_consumed {
            let provider = self.find_context_provider(uuid, name);
            if let Some(entry) = self.entries.get_mut(uuid) {
                entry.entity.bind_context(name, provider);
            }
        }
        Ok(cell)
    }

    fn find_context_provider(&self, uuid: &Uuid, name: &str) -> Option<PropertySignal> {
        let mut current = self.entries.get(uuid)?.entity.parent_uuid();
        while let Some(ancestor) = current {
            let entity = &self.entries.get(&ancestor)?.entity;
            if let Some(cell) = entity.provided_context(name) {
                return Some(cell.clone());
            }
            current = entity.parent_uuid();
        }
        None
    }

    // Re-binds every consumed context in the subtree of `uuid`
    fn rebind_contexts(&mut self, uuid: &Uuid) {
        for member in self.subtree_level_order(uuid) {
            let names = match self.entries.get(&member) {
                Some(entry) => entry.entity.consumed_context_names(),
                None => continue,
            };
            for name in names {
                let provider = self.find_context_provider(&member, &name);
                if let Some(entry) = self.entries.get_mut(&member) {
                    entry.entity.bind_context(&name, provider);
                }
            }
        }
    }

    // Messages

    pub(crate) fn messenger(&self, uuid: Uuid) -> ViewMessenger {
        ViewMessenger::new(uuid, self.outbox.clone())
    }

    /// Drains the messages shadow objects sent to the view since the last
    /// call.
    pub fn take_messages_to_view(&mut self) -> Vec<MessageToView> {
        mem::take(&mut *self.outbox.borrow_mut())
    }

    // Tree

    fn add_to_children(&mut self, parent_uuid: Option<Uuid>, child: Uuid, order: i32) {
        match parent_uuid.and_then(|parent| self.entries.get_mut(&parent)) {
            Some(parent) => parent.entity.children_mut().insert(order, child),
            None => self.root_uuids.insert(order, child),
        }
        self.traversal_cache = None;
    }

    fn remove_from_parent(&mut self, child: &Uuid, parent_uuid: Option<Uuid>) {
        match parent_uuid.and_then(|parent| self.entries.get_mut(&parent)) {
            Some(parent) => parent.entity.children_mut().remove(child),
            None => self.root_uuids.remove(child),
        };
        self.traversal_cache = None;
    }

    /// All entities breadth-first, parents before children.
    pub fn traverse_level_order_bfs(&mut self) -> Vec<Uuid> {
        if let Some(cached) = &self.traversal_cache {
            return cached.clone();
        }
        let traversal = self.level_order_from(self.root_uuids.to_vec(), self.entries.len());
        self.traversal_cache = Some(traversal.clone());
        traversal
    }

    /// All entities breadth-first, reversed: children before parents.
    pub fn traverse_level_order_bfs_reverse(&mut self) -> Vec<Uuid> {
        let mut traversal = self.traverse_level_order_bfs();
        traversal.reverse();
        traversal
    }

    fn subtree_level_order(&self, uuid: &Uuid) -> Vec<Uuid> {
        self.level_order_from(vec![*uuid], 1)
    }

    fn level_order_from(&self, start: Vec<Uuid>, capacity: usize) -> Vec<Uuid> {
        let mut traversal = Vec::with_capacity(capacity);
        let mut queue: VecDeque<Uuid> = start.into();
        while let Some(uuid) = queue.pop_front() {
            let Some(entry) = self.entries.get(&uuid) else {
                continue;
            };
            traversal.push(uuid);
            queue.extend(entry.entity.children());
        }
        traversal
    }

    // Queries

    pub fn entity(&self, uuid: &Uuid) -> Option<&Entity> {
        self.entries.get(uuid).map(|entry| &entry.entity)
    }

    pub fn entity_mut(&mut self, uuid: &Uuid) -> Option<&mut Entity> {
        self.entries.get_mut(uuid).map(|entry| &mut entry.entity)
    }

    pub fn has_entity(&self, uuid: &Uuid) -> bool {
        self.entries.contains_key(uuid)
    }

    pub fn root_uuids(&self) -> Vec<Uuid> {
        self.root_uuids.to_vec()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entity_or_err(&self, uuid: &Uuid, operation: &'static str) -> Result<&Entity, KernelError> {
        self.entity(uuid)
            .ok_or(KernelError::EntityNotFound { uuid: *uuid, operation })
    }

    fn entity_mut_or_err(&mut self, uuid: &Uuid, operation: &'static str) -> Result<&mut Entity, KernelError> {
        self.entity_mut(uuid)
            .ok_or(KernelError::EntityNotFound { uuid: *uuid, operation })
    }

    /// Tears every entity down, leaves first, notifying their shadow objects.
    pub fn destroy(&mut self) {
        let bottom_up = self.traverse_level_order_bfs_reverse();
        batch(|| {
            for uuid in &bottom_up {
                for id in self.attached_ids(uuid) {
                    self.destroy_shadow_object(uuid, id);
                }
            }
            for (_, mut entry) in self.entries.drain() {
                entry.entity.destroy();
            }
        });
        self.root_uuids.clear();
        self.traversal_cache = None;
        info!("Kernel destroyed {} entities", bottom_up.len());
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}
