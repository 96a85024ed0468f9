use std::rc::Rc;

use shadow_objects_shared::{Uuid, Value};
use shadow_objects_view::{ComponentContext, ViewComponent, ViewComponentOptions, ViewError};

/// Fluent builder for creating test components
pub struct TestComponentBuilder<'a> {
    token: String,
    uuid: Option<Uuid>,
    parent: Option<&'a ViewComponent>,
    order: Option<i32>,
    properties: Vec<(String, Value)>,
}

impl<'a> TestComponentBuilder<'a> {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            uuid: None,
            parent: None,
            order: None,
            properties: Vec::new(),
        }
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

    pub fn property(mut self, key: &str, value: Value) -> Self {
        self.properties.push((key.to_string(), value));
        self
    }

    /// Build the component in `context`
    pub fn build(self, context: &Rc<ComponentContext>) -> Result<ViewComponent, ViewError> {
        let mut options = ViewComponentOptions::new().context(context.clone());
        if let Some(uuid) = self.uuid {
            options = options.uuid(uuid);
        }
        if let Some(parent) = self.parent {
            options = options.parent(parent);
        }
        if let Some(order) = self.order {
            options = options.order(order);
        }

        let component = ViewComponent::with_options(&self.token, options)?;
        for (key, value) in self.properties {
            component.set_property(&key, value)?;
        }
        Ok(component)
    }
}
