use std::rc::Rc;

use shadow_objects_shared::{Transferable, Uuid, Value, DEFAULT_ORDER};

use crate::{
    component_changes::PropertyEquality, ComponentContext, ComponentEvent, SubscriptionKey,
    ViewError,
};

/// Options for [`ViewComponent::with_options`]. Everything is optional:
/// a random uuid, no parent, order `0`, the parent's context or else the
/// global one.
#[derive(Default)]
pub struct ViewComponentOptions<'a> {
    uuid: Option<Uuid>,
    parent: Option<&'a ViewComponent>,
    order: Option<i32>,
    context: Option<Rc<ComponentContext>>,
}

impl<'a> ViewComponentOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn parent(mut self, parent: &'a ViewComponent) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn context(mut self, context: Rc<ComponentContext>) -> Self {
        self.context = Some(context);
        self
    }
}

/// Producer-side node. A cheap handle: all state lives in the owning
/// [`ComponentContext`], which records every mutation for the next flush.
#[derive(Clone)]
pub struct ViewComponent {
    uuid: Uuid,
    context: Rc<ComponentContext>,
}

impl ViewComponent {
    /// Creates a root component in the global context.
    pub fn new(token: &str) -> Result<Self, ViewError> {
        Self::with_options(token, ViewComponentOptions::default())
    }

    pub fn with_options(token: &str, options: ViewComponentOptions<'_>) -> Result<Self, ViewError> {
        let uuid = options.uuid.unwrap_or_else(Uuid::new_v4);
        let context = match (options.context, options.parent) {
            (Some(context), _) => context,
            (None, Some(parent)) => parent.context.clone(),
            (None, None) => ComponentContext::global(),
        };

        let parent_uuid = match options.parent {
            Some(parent) => {
                if !Rc::ptr_eq(&context, &parent.context) {
                    return Err(ViewError::CrossContextParent {
                        uuid,
                        parent_uuid: parent.uuid,
                    });
                }
                Some(parent.uuid)
            }
            None => None,
        };

        context.add_component(uuid, token, parent_uuid, options.order.unwrap_or(DEFAULT_ORDER))?;

        Ok(Self { uuid, context })
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn context(&self) -> &Rc<ComponentContext> {
        &self.context
    }

    pub fn is_alive(&self) -> bool {
        self.context.has_component(&self.uuid)
    }

    pub fn token(&self) -> Result<String, ViewError> {
        self.context.token(&self.uuid)
    }

    pub fn order(&self) -> Result<i32, ViewError> {
        self.context.order(&self.uuid)
    }

    pub fn parent_uuid(&self) -> Result<Option<Uuid>, ViewError> {
        self.context.parent_uuid(&self.uuid)
    }

    /// Child uuids in ascending order.
    pub fn children(&self) -> Result<Vec<Uuid>, ViewError> {
        self.context.children(&self.uuid)
    }

    // Structure

    pub fn set_token(&self, token: &str) -> Result<(), ViewError> {
        self.context.change_token(self.uuid, token)
    }

    /// Moves this component under `parent`, or to the roots with `None`.
    pub fn set_parent(&self, parent: Option<&ViewComponent>) -> Result<(), ViewError> {
        if let Some(parent) = parent {
            if !Rc::ptr_eq(&self.context, &parent.context) {
                return Err(ViewError::CrossContextParent {
                    uuid: self.uuid,
                    parent_uuid: parent.uuid,
                });
            }
        }
        self.context.set_parent(self.uuid, parent.map(|parent| parent.uuid))
    }

    pub fn set_order(&self, order: i32) -> Result<(), ViewError> {
        self.context.change_order(self.uuid, order)
    }

    /// Destroys this component. Its children survive as roots.
    pub fn destroy(&self) -> Result<(), ViewError> {
        self.context.destroy_component(self.uuid)
    }

    /// Destroys this component together with all of its descendants.
    pub fn remove_sub_tree(&self) -> Result<(), ViewError> {
        self.context.remove_sub_tree(self.uuid)
    }

    // Content

    pub fn set_property(&self, key: &str, value: Value) -> Result<(), ViewError> {
        self.context.set_property(self.uuid, key, value)
    }

    pub fn set_property_with_equality(
        &self,
        key: &str,
        value: Value,
        is_equal: impl Fn(&Value, &Value) -> bool + 'static,
    ) -> Result<(), ViewError> {
        let is_equal: PropertyEquality = Rc::new(is_equal);
        self.context.set_property_with_equality(self.uuid, key, value, is_equal)
    }

    pub fn remove_property(&self, key: &str) -> Result<(), ViewError> {
        self.context.remove_property(self.uuid, key)
    }

    // Events

    /// Queues an event for the shadow objects mirroring this component.
    pub fn dispatch_shadow_objects_event(
        &self,
        event_type: &str,
        data: Value,
        transferables: Vec<Transferable>,
    ) -> Result<(), ViewError> {
        self.context
            .dispatch_shadow_objects_event(self.uuid, event_type, data, transferables)
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&ComponentEvent) + 'static,
    ) -> Result<SubscriptionKey, ViewError> {
        self.context.subscribe(self.uuid, Rc::new(listener))
    }

    pub fn unsubscribe(&self, key: &SubscriptionKey) -> Result<bool, ViewError> {
        self.context.unsubscribe(self.uuid, key)
    }
}

impl PartialEq for ViewComponent {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid && Rc::ptr_eq(&self.context, &other.context)
    }
}

impl std::fmt::Debug for ViewComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewComponent")
            .field("uuid", &self.uuid)
            .field("namespace", &self.context.namespace())
            .finish()
    }
}
