use std::{
    cell::RefCell,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use shadow_objects_shared::{MessageToView, ShadowObjectEvent, Transferable, Uuid, Value};

use crate::{Entity, Kernel, KernelError, PropertySignal};

/// Behavior attached to an entity because its token resolves to the
/// constructor that built it.
pub trait ShadowObject {
    /// An event sent to the entity from the view side.
    fn on_event(
        &mut self,
        _scope: &mut ShadowObjectScope<'_>,
        _event: &ShadowObjectEvent,
        _transferables: &[Transferable],
    ) {
    }

    /// The entity is destroyed or the constructor no longer resolves.
    fn on_destroy(&mut self, _scope: &mut ShadowObjectScope<'_>) {}
}

static NEXT_CONSTRUCTOR_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a constructor. Upgrades compare constructors by id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConstructorId(u64);

type ShadowObjectFactory = dyn Fn(&mut ShadowObjectScope<'_>) -> Box<dyn ShadowObject>;

/// Named factory for one kind of shadow object.
#[derive(Clone)]
pub struct ShadowObjectConstructor {
    id: ConstructorId,
    name: String,
    factory: Rc<ShadowObjectFactory>,
}

impl ShadowObjectConstructor {
    pub fn new<T: ShadowObject + 'static>(
        name: &str,
        factory: impl Fn(&mut ShadowObjectScope<'_>) -> T + 'static,
    ) -> Self {
        let factory: Rc<ShadowObjectFactory> =
            Rc::new(move |scope: &mut ShadowObjectScope<'_>| -> Box<dyn ShadowObject> {
                Box::new(factory(scope))
            });
        Self {
            id: ConstructorId(NEXT_CONSTRUCTOR_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.to_string(),
            factory,
        }
    }

    pub fn id(&self) -> ConstructorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn construct(&self, scope: &mut ShadowObjectScope<'_>) -> Box<dyn ShadowObject> {
        (self.factory)(scope)
    }
}

impl std::fmt::Debug for ShadowObjectConstructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowObjectConstructor")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

pub(crate) type MessageOutbox = Rc<RefCell<Vec<MessageToView>>>;

/// Sends messages from a shadow object to the view component its entity
/// mirrors. Cloneable, so effects can hold one.
#[derive(Clone)]
pub struct ViewMessenger {
    uuid: Uuid,
    outbox: MessageOutbox,
}

impl ViewMessenger {
    pub(crate) fn new(uuid: Uuid, outbox: MessageOutbox) -> Self {
        Self { uuid, outbox }
    }

    pub fn send(&self, message_type: &str, data: Value) {
        self.outbox.borrow_mut().push(MessageToView {
            uuid: self.uuid,
            message_type: message_type.to_string(),
            data,
        });
    }
}

/// What a shadow object may touch while it is being constructed or called.
pub struct ShadowObjectScope<'k> {
    kernel: &'k mut Kernel,
    uuid: Uuid,
}

impl<'k> ShadowObjectScope<'k> {
    pub(crate) fn new(kernel: &'k mut Kernel, uuid: Uuid) -> Self {
        Self { kernel, uuid }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn kernel(&self) -> &Kernel {
        &*self.kernel
    }

    pub fn entity(&self) -> Option<&Entity> {
        self.kernel.entity(&self.uuid)
    }

    pub fn token(&self) -> Option<&str> {
        self.entity().map(Entity::token)
    }

    pub fn property(&self, key: &str) -> Option<Value> {
        self.entity().and_then(|entity| entity.property(key))
    }

    pub fn property_signal(&mut self, key: &str) -> Result<PropertySignal, KernelError> {
        let entity = self
            .kernel
            .entity_mut(&self.uuid)
            .ok_or(KernelError::EntityNotFound {
                uuid: self.uuid,
                operation: "read property",
            })?;
        Ok(entity.property_signal(key))
    }

    pub fn provide_context(&mut self, name: &str, value: Option<Value>) -> Result<PropertySignal, KernelError> {
        self.kernel.provide_context(&self.uuid, name, value)
    }

    pub fn use_context(&mut self, name: &str) -> Result<PropertySignal, KernelError> {
        self.kernel.use_context(&self.uuid, name)
    }

    pub fn messenger(&self) -> ViewMessenger {
        self.kernel.messenger(self.uuid)
    }

    pub fn send_message_to_view(&self, message_type: &str, data: Value) {
        self.messenger().send(message_type, data);
    }
}
