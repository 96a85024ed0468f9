use std::{
    cell::{RefCell, RefMut},
    collections::{HashMap, VecDeque},
    rc::Rc,
};

use log::{debug, info, trace, warn};

use shadow_objects_shared::{
    ChangeTrail, ChangeTrailPhase, MessageToView, OrderedUuids, Transferable, Uuid, Value,
    GLOBAL_NAMESPACE,
};

use crate::{
    component_changes::{ComponentChanges, PropertyEquality},
    component_memory::{ComponentMemory, RememberedComponent},
    events::{ComponentEvent, ComponentListener, ComponentListeners, SubscriptionKey},
    ViewError,
};

thread_local! {
    // One context per namespace. The view side is single threaded, so the
    // table is per thread.
    static CONTEXTS: RefCell<HashMap<String, Rc<ComponentContext>>> = RefCell::new(HashMap::new());
}

struct ComponentEntry {
    token: String,
    order: i32,
    parent_uuid: Option<Uuid>,
    children: OrderedUuids,
    changes: ComponentChanges,
    property_equality: HashMap<String, PropertyEquality>,
    listeners: ComponentListeners,
}

impl ComponentEntry {
    fn new(uuid: Uuid, token: &str, parent_uuid: Option<Uuid>, order: i32) -> Self {
        Self {
            token: token.to_string(),
            order,
            parent_uuid,
            children: OrderedUuids::new(),
            changes: ComponentChanges::new(uuid),
            property_equality: HashMap::new(),
            listeners: ComponentListeners::new(),
        }
    }

    fn is_alive(&self) -> bool {
        !self.changes.is_destroyed()
    }
}

struct ContextState {
    destroyed: bool,
    components: HashMap<Uuid, ComponentEntry>,
    root_uuids: OrderedUuids,
    // destroyed in the current window, still owed a trail entry
    destroyed_uuids: Vec<Uuid>,
    traversal_cache: Option<Vec<Uuid>>,
    memory: ComponentMemory,
    next_subscription: u64,
}

/// The authoritative registry of all live view components of one
/// namespace.
///
/// Owns the tree (roots + parent→children adjacency, both kept sorted by
/// `order`) and the per-component diff accumulators, and turns pending
/// changes into ordered change trails.
pub struct ComponentContext {
    namespace: String,
    state: RefCell<ContextState>,
}

impl ComponentContext {
    fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            state: RefCell::new(ContextState {
                destroyed: false,
                components: HashMap::new(),
                root_uuids: OrderedUuids::new(),
                destroyed_uuids: Vec::new(),
                traversal_cache: None,
                memory: ComponentMemory::new(),
                next_subscription: 0,
            }),
        }
    }

    // Namespace table

    /// Returns the context of `namespace`, creating it on first access.
    ///
    /// The table is per thread: each thread gets its own context for the
    /// same namespace.
    pub fn get(namespace: &str) -> Rc<ComponentContext> {
        CONTEXTS.with(|contexts| {
            contexts
                .borrow_mut()
                .entry(namespace.to_string())
                .or_insert_with(|| Rc::new(ComponentContext::new(namespace)))
                .clone()
        })
    }

    pub fn global() -> Rc<ComponentContext> {
        Self::get(GLOBAL_NAMESPACE)
    }

    /// Destroys every context of the current thread.
    pub fn clear_all() {
        let contexts: Vec<Rc<ComponentContext>> =
            CONTEXTS.with(|contexts| contexts.borrow_mut().drain().map(|(_, context)| context).collect());
        for context in contexts {
            context.mark_destroyed();
        }
    }

    /// Destroys this context. Later operations fail with
    /// [`ViewError::ContextDestroyed`]; `get` hands out a fresh context
    /// for the namespace afterwards.
    pub fn destroy(&self) {
        CONTEXTS.with(|contexts| {
            let mut contexts = contexts.borrow_mut();
            let is_registered = contexts
                .get(&self.namespace)
                .map_or(false, |registered| std::ptr::eq(Rc::as_ptr(registered), self));
            if is_registered {
                contexts.remove(&self.namespace);
            }
        });
        self.mark_destroyed();
    }

    fn mark_destroyed(&self) {
        let mut state = self.state.borrow_mut();
        if state.destroyed {
            return;
        }
        info!("Destroying component context {}", self.namespace);
        state.destroyed = true;
        state.components.clear();
        state.root_uuids.clear();
        state.destroyed_uuids.clear();
        state.traversal_cache = None;
        state.memory.clear();
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.borrow().destroyed
    }

    fn state_mut(&self, operation: &'static str) -> Result<RefMut<'_, ContextState>, ViewError> {
        let state = self.state.borrow_mut();
        if state.destroyed {
            return Err(ViewError::ContextDestroyed {
                namespace: self.namespace.clone(),
                operation,
            });
        }
        Ok(state)
    }

    // Tree

    /// Registers a component, or revives one destroyed earlier in the
    /// current window, and records its creation.
    pub fn add_component(
        &self,
        uuid: Uuid,
        token: &str,
        parent_uuid: Option<Uuid>,
        order: i32,
    ) -> Result<(), ViewError> {
        let mut guard = self.state_mut("add component")?;
        let state = &mut *guard;

        if let Some(parent) = parent_uuid {
            if !state.is_alive(&parent) {
                return Err(ViewError::ParentNotRegistered {
                    uuid,
                    parent_uuid: parent,
                });
            }
        }

        match state.components.get_mut(&uuid) {
            Some(entry) if entry.is_alive() => {
                return Err(ViewError::UuidAlreadyRegistered { uuid });
            }
            Some(entry) => {
                trace!("Reviving component {} destroyed in the current window", uuid);
                entry.token = token.to_string();
                entry.order = order;
                entry.parent_uuid = parent_uuid;
                entry.children.clear();
                entry.property_equality.clear();
                entry.listeners = ComponentListeners::new();
                entry.changes.create(token, parent_uuid, order);
                state.destroyed_uuids.retain(|known| *known != uuid);
            }
            None => {
                let mut entry = ComponentEntry::new(uuid, token, parent_uuid, order);
                entry.changes.create(token, parent_uuid, order);
                state.components.insert(uuid, entry);
            }
        }

        state.add_to_children(parent_uuid, uuid, order);
        Ok(())
    }

    pub fn set_parent(&self, uuid: Uuid, parent_uuid: Option<Uuid>) -> Result<(), ViewError> {
        let mut state = self.state_mut("set parent")?;
        let current_parent = state.alive_entry_mut(&uuid, "set parent")?.parent_uuid;

        if current_parent != parent_uuid {
            if let Some(parent) = parent_uuid {
                if !state.is_alive(&parent) {
                    return Err(ViewError::ParentNotRegistered {
                        uuid,
                        parent_uuid: parent,
                    });
                }
                if state.is_ancestor_or_self(&uuid, &parent) {
                    return Err(ViewError::CyclicParent {
                        uuid,
                        parent_uuid: parent,
                    });
                }
            }

            state.remove_from_parent(&uuid, current_parent);
            let entry = state.alive_entry_mut(&uuid, "set parent")?;
            entry.parent_uuid = parent_uuid;
            let order = entry.order;
            state.add_to_children(parent_uuid, uuid, order);
        }

        state.alive_entry_mut(&uuid, "set parent")?.changes.set_parent(parent_uuid);
        Ok(())
    }

    pub fn change_order(&self, uuid: Uuid, order: i32) -> Result<(), ViewError> {
        let mut state = self.state_mut("change order")?;
        let entry = state.alive_entry_mut(&uuid, "change order")?;
        entry.changes.change_order(order);
        if entry.order == order {
            return Ok(());
        }
        entry.order = order;
        let parent_uuid = entry.parent_uuid;

        state.remove_from_parent(&uuid, parent_uuid);
        state.add_to_children(parent_uuid, uuid, order);
        Ok(())
    }

    pub fn change_token(&self, uuid: Uuid, token: &str) -> Result<(), ViewError> {
        let mut state = self.state_mut("change token")?;
        let entry = state.alive_entry_mut(&uuid, "change token")?;
        entry.token = token.to_string();
        entry.changes.change_token(token);
        Ok(())
    }

    /// Detaches the children of `uuid` to the roots (they survive) and
    /// records its destruction.
    pub fn destroy_component(&self, uuid: Uuid) -> Result<(), ViewError> {
        let mut state = self.state_mut("destroy component")?;
        let entry = state.alive_entry_mut(&uuid, "destroy component")?;
        let children = entry.children.to_vec();
        let parent_uuid = entry.parent_uuid;

        for child in children {
            state.remove_from_parent(&child, Some(uuid));
            let child_entry = state.alive_entry_mut(&child, "detach child")?;
            child_entry.parent_uuid = None;
            child_entry.changes.set_parent(None);
            let order = child_entry.order;
            state.add_to_children(None, child, order);
        }

        state.remove_from_parent(&uuid, parent_uuid);
        let entry = state.alive_entry_mut(&uuid, "destroy component")?;
        entry.parent_uuid = None;
        entry.changes.destroy();
        state.destroyed_uuids.push(uuid);
        Ok(())
    }

    /// Destroys `uuid` and all of its descendants, deepest first.
    pub fn remove_sub_tree(&self, uuid: Uuid) -> Result<(), ViewError> {
        let subtree = {
            let mut state = self.state_mut("remove sub tree")?;
            state.alive_entry_mut(&uuid, "remove sub tree")?;
            state.subtree_level_order(&uuid)
        };
        for descendant in subtree.into_iter().rev() {
            self.destroy_component(descendant)?;
        }
        Ok(())
    }

    // Content

    pub fn set_property(&self, uuid: Uuid, key: &str, value: Value) -> Result<(), ViewError> {
        let mut state = self.state_mut("set property")?;
        let entry = state.alive_entry_mut(&uuid, "set property")?;
        let is_equal = entry.property_equality.get(key).cloned();
        entry.changes.change_property(key, value, is_equal.as_ref());
        Ok(())
    }

    /// Like [`Self::set_property`], and remembers `is_equal` for every
    /// later write of `key` on this component.
    pub fn set_property_with_equality(
        &self,
        uuid: Uuid,
        key: &str,
        value: Value,
        is_equal: PropertyEquality,
    ) -> Result<(), ViewError> {
        {
            let mut state = self.state_mut("set property")?;
            let entry = state.alive_entry_mut(&uuid, "set property")?;
            entry.property_equality.insert(key.to_string(), is_equal);
        }
        self.set_property(uuid, key, value)
    }

    pub fn remove_property(&self, uuid: Uuid, key: &str) -> Result<(), ViewError> {
        let mut state = self.state_mut("remove property")?;
        state.alive_entry_mut(&uuid, "remove property")?.changes.remove_property(key);
        Ok(())
    }

    // Events

    pub fn dispatch_shadow_objects_event(
        &self,
        uuid: Uuid,
        event_type: &str,
        data: Value,
        transferables: Vec<Transferable>,
    ) -> Result<(), ViewError> {
        let mut state = self.state_mut("dispatch event")?;
        state
            .alive_entry_mut(&uuid, "dispatch event")?
            .changes
            .create_event(event_type, data, transferables);
        Ok(())
    }

    /// Delivers an event to the view-side subscribers of every live
    /// component.
    pub fn broadcast_event(&self, event_type: &str, data: Value) -> Result<(), ViewError> {
        let live = self.state_mut("broadcast event")?.traverse_level_order_bfs();
        self.notify(
            &live,
            &ComponentEvent::Broadcast {
                event_type: event_type.to_string(),
                data,
            },
        );
        Ok(())
    }

    /// Delivers a message sent by a shadow object to the subscribers of
    /// the component it mirrors.
    pub fn dispatch_message(&self, message: MessageToView) -> Result<(), ViewError> {
        let is_alive = self.state_mut("dispatch message")?.is_alive(&message.uuid);
        if !is_alive {
            // The component may have gone away while the message was in flight
            warn!(
                "Dropping message {} for component {} - not alive",
                message.message_type, message.uuid
            );
            return Ok(());
        }
        self.notify(
            &[message.uuid],
            &ComponentEvent::Message {
                message_type: message.message_type,
                data: message.data,
            },
        );
        Ok(())
    }

    pub fn subscribe(&self, uuid: Uuid, listener: ComponentListener) -> Result<SubscriptionKey, ViewError> {
        let mut state = self.state_mut("subscribe")?;
        let key = SubscriptionKey::new(state.next_subscription);
        state.next_subscription += 1;
        state.alive_entry_mut(&uuid, "subscribe")?.listeners.insert(key, listener);
        Ok(key)
    }

    pub fn unsubscribe(&self, uuid: Uuid, key: &SubscriptionKey) -> Result<bool, ViewError> {
        let mut state = self.state_mut("unsubscribe")?;
        Ok(state.alive_entry_mut(&uuid, "unsubscribe")?.listeners.remove(key))
    }

    fn notify(&self, uuids: &[Uuid], event: &ComponentEvent) {
        // Listeners may call back into the context, so none may run while
        // the state is borrowed
        let listeners: Vec<ComponentListener> = {
            let state = self.state.borrow();
            uuids
                .iter()
                .filter_map(|uuid| state.components.get(uuid))
                .flat_map(|entry| entry.listeners.snapshot())
                .collect()
        };
        for listener in listeners {
            listener(event);
        }
    }

    // Change trails

    /// Flushes every pending change into one ordered change trail.
    ///
    /// Components are visited breadth-first, and each phase runs over all
    /// of them before the next phase starts: structure, then content, then
    /// removals. With `clear_changes == false` the trail is only previewed
    /// and no state is touched.
    pub fn build_change_trails(&self, clear_changes: bool) -> Result<ChangeTrail, ViewError> {
        let mut guard = self.state_mut("build change trails")?;
        let state = &mut *guard;
        let path = state.path_of_changes();
        let mut trail = ChangeTrail::new();

        if !clear_changes {
            let mut preview: Vec<ComponentChanges> = path
                .iter()
                .filter_map(|uuid| state.components.get(uuid))
                .map(|entry| entry.changes.clone())
                .collect();
            for phase in ChangeTrailPhase::ALL {
                for changes in preview.iter_mut() {
                    changes.build_change_trail(&mut trail, phase);
                }
            }
            return Ok(trail);
        }

        for phase in ChangeTrailPhase::ALL {
            for uuid in &path {
                if let Some(entry) = state.components.get_mut(uuid) {
                    entry.changes.build_change_trail(&mut trail, phase);
                }
            }
        }

        for uuid in &path {
            let Some(entry) = state.components.get_mut(uuid) else {
                continue;
            };
            entry.changes.clear();
            if entry.changes.is_removable() {
                state.components.remove(uuid);
            }
        }
        for uuid in std::mem::take(&mut state.destroyed_uuids) {
            if state.components.get(&uuid).map_or(false, |entry| entry.changes.is_removable()) {
                state.components.remove(&uuid);
            }
        }

        state.memory.write(&trail);

        debug!(
            "Built change trail of {} record(s) from {} dirty component(s) in {}",
            trail.len(),
            path.len(),
            self.namespace
        );
        for record in &trail {
            trace!("  {:?} {}", record.get_type(), record.uuid());
        }

        Ok(trail)
    }

    /// Prepares a full re-send after the mirror side was lost.
    ///
    /// Flushes first so the memory is current, then replaces every live
    /// component's accumulator with one that re-creates it from memory.
    /// Queued events are carried over. Every live component receives one
    /// [`ComponentEvent::ContextLost`].
    pub fn re_create_changes(&self) -> Result<(), ViewError> {
        let mut stashed: HashMap<Uuid, ComponentChanges> = HashMap::new();
        {
            let mut state = self.state_mut("re-create changes")?;
            for (uuid, entry) in state.components.iter_mut() {
                if entry.is_alive() && entry.changes.has_pending_events() {
                    let mut holder = ComponentChanges::new(*uuid);
                    entry.changes.transfer_events_to(&mut holder);
                    stashed.insert(*uuid, holder);
                }
            }
        }

        self.build_change_trails(true)?;

        let live = {
            let mut guard = self.state_mut("re-create changes")?;
            let state = &mut *guard;
            let live = state.traverse_level_order_bfs();
            for uuid in &live {
                let Some(remembered) = state.memory.get(uuid).cloned() else {
                    continue;
                };
                let Some(entry) = state.components.get_mut(uuid) else {
                    continue;
                };

                let mut changes = ComponentChanges::new(*uuid);
                changes.create(&remembered.token, remembered.parent_uuid, remembered.order);
                for (key, value) in remembered.properties {
                    changes.change_property(&key, value, entry.property_equality.get(&key));
                }
                if let Some(mut holder) = stashed.remove(uuid) {
                    holder.transfer_events_to(&mut changes);
                }
                entry.changes = changes;
            }
            state.memory.clear();
            live
        };

        info!(
            "Context {} lost, re-created changes for {} component(s)",
            self.namespace,
            live.len()
        );
        self.notify(&live, &ComponentEvent::ContextLost);
        Ok(())
    }

    // Queries

    pub fn has_component(&self, uuid: &Uuid) -> bool {
        self.state.borrow().is_alive(uuid)
    }

    /// Number of live components.
    pub fn len(&self) -> usize {
        self.state
            .borrow()
            .components
            .values()
            .filter(|entry| entry.is_alive())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn token(&self, uuid: &Uuid) -> Result<String, ViewError> {
        self.read_entry(uuid, "read token", |entry| entry.token.clone())
    }

    pub fn order(&self, uuid: &Uuid) -> Result<i32, ViewError> {
        self.read_entry(uuid, "read order", |entry| entry.order)
    }

    pub fn parent_uuid(&self, uuid: &Uuid) -> Result<Option<Uuid>, ViewError> {
        self.read_entry(uuid, "read parent", |entry| entry.parent_uuid)
    }

    pub fn children(&self, uuid: &Uuid) -> Result<Vec<Uuid>, ViewError> {
        self.read_entry(uuid, "read children", |entry| entry.children.to_vec())
    }

    pub fn root_uuids(&self) -> Vec<Uuid> {
        self.state.borrow().root_uuids.to_vec()
    }

    /// Live components in breadth-first order, ancestors first.
    pub fn traverse_level_order_bfs(&self) -> Result<Vec<Uuid>, ViewError> {
        Ok(self.state_mut("traverse")?.traverse_level_order_bfs())
    }

    /// What the mirror side was last told about `uuid`.
    pub fn remembered(&self, uuid: &Uuid) -> Option<RememberedComponent> {
        self.state.borrow().memory.get(uuid).cloned()
    }

    fn read_entry<T>(
        &self,
        uuid: &Uuid,
        operation: &'static str,
        read: impl FnOnce(&ComponentEntry) -> T,
    ) -> Result<T, ViewError> {
        let mut state = self.state_mut(operation)?;
        let entry = state.alive_entry_mut(uuid, operation)?;
        Ok(read(entry))
    }
}

impl ContextState {
    fn is_alive(&self, uuid: &Uuid) -> bool {
        self.components.get(uuid).map_or(false, ComponentEntry::is_alive)
    }

    fn alive_entry_mut(&mut self, uuid: &Uuid, operation: &'static str) -> Result<&mut ComponentEntry, ViewError> {
        let Some(entry) = self.components.get_mut(uuid) else {
            return Err(ViewError::ComponentNotFound { uuid: *uuid, operation });
        };
        if !entry.is_alive() {
            return Err(ViewError::ComponentDestroyed { uuid: *uuid, operation });
        }
        Ok(entry)
    }

    // true if `ancestor` is `uuid` itself or one of the ancestors of `uuid`
    fn is_ancestor_or_self(&self, ancestor: &Uuid, uuid: &Uuid) -> bool {
        let mut current = Some(*uuid);
        while let Some(next) = current {
            if next == *ancestor {
                return true;
            }
            current = self.components.get(&next).and_then(|entry| entry.parent_uuid);
        }
        false
    }

    fn add_to_children(&mut self, parent_uuid: Option<Uuid>, child: Uuid, order: i32) {
        match parent_uuid.and_then(|parent| self.components.get_mut(&parent)) {
            Some(parent) => parent.children.insert(order, child),
            None => self.root_uuids.insert(order, child),
        }
        self.traversal_cache = None;
    }

    fn remove_from_parent(&mut self, child: &Uuid, parent_uuid: Option<Uuid>) {
        let removed = match parent_uuid.and_then(|parent| self.components.get_mut(&parent)) {
            Some(parent) => parent.children.remove(child),
            None => self.root_uuids.remove(child),
        };
        if removed {
            self.traversal_cache = None;
        }
    }

    fn traverse_level_order_bfs(&mut self) -> Vec<Uuid> {
        if let Some(cached) = &self.traversal_cache {
            return cached.clone();
        }

        let mut traversal = Vec::with_capacity(self.components.len());
        let mut queue: VecDeque<Uuid> = self.root_uuids.iter().copied().collect();
        while let Some(uuid) = queue.pop_front() {
            traversal.push(uuid);
            if let Some(entry) = self.components.get(&uuid) {
                queue.extend(entry.children.iter().copied());
            }
        }

        self.traversal_cache = Some(traversal.clone());
        traversal
    }

    fn subtree_level_order(&self, uuid: &Uuid) -> Vec<Uuid> {
        let mut subtree = Vec::new();
        let mut queue = VecDeque::from([*uuid]);
        while let Some(next) = queue.pop_front() {
            subtree.push(next);
            if let Some(entry) = self.components.get(&next) {
                queue.extend(entry.children.iter().copied());
            }
        }
        subtree
    }

    // Dirty accumulators: live tree breadth-first, then the ones destroyed
    // in the current window
    fn path_of_changes(&mut self) -> Vec<Uuid> {
        let mut path: Vec<Uuid> = self
            .traverse_level_order_bfs()
            .into_iter()
            .filter(|uuid| self.components.get(uuid).map_or(false, |entry| entry.changes.has_changes()))
            .collect();
        path.extend(
            self.destroyed_uuids
                .iter()
                .filter(|uuid| self.components.get(uuid).map_or(false, |entry| entry.changes.has_changes()))
                .copied(),
        );
        path
    }
}
