//! # Shadow Objects Kernel
//! The mirror side of a shadow-objects tree: a Kernel applies change trails
//! record by record to a tree of entities, and attaches shadow objects to
//! every entity according to what its token resolves to in the Registry.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod reactive;
pub mod shared {
    pub use shadow_objects_shared::{
        ChangeRecord, ChangeTrail, MessageToView, PropertyChange, ShadowObjectEvent, Transferable,
        Uuid, Value,
    };
}

mod entity;
mod error;
mod kernel;
mod kernel_config;
mod module;
mod registry;
mod shadow_object;

pub use entity::{Entity, PropertySignal};
pub use error::KernelError;
pub use kernel::Kernel;
pub use kernel_config::KernelConfig;
pub use module::{ModuleInitializer, ShadowObjectsModule};
pub use reactive::{batch, Effect, Signal, SignalSubscription};
pub use registry::Registry;
pub use shadow_object::{
    ConstructorId, ShadowObject, ShadowObjectConstructor, ShadowObjectScope, ViewMessenger,
};
