//! # Shadow Objects View
//! The producer side of a shadow-objects tree: view components register in
//! a namespace-scoped [`ComponentContext`], every mutation is recorded by a
//! per-component diff accumulator, and a flush turns the accumulated intent
//! into one ordered change trail that a mirror can apply in a single pass.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use shadow_objects_shared::{
        ChangeRecord, ChangeRecordType, ChangeTrail, ChangeTrailPayload, MessageToView,
        PropertyChange, Transferable, Uuid, Value,
    };
}

mod component_changes;
mod component_context;
mod component_memory;
mod error;
mod events;
mod view_component;

pub use component_changes::{ComponentChanges, Lifecycle, Pending, PropertyEquality};
pub use component_context::ComponentContext;
pub use component_memory::{ComponentMemory, RememberedComponent};
pub use error::ViewError;
pub use events::{ComponentEvent, ComponentListener, SubscriptionKey};
pub use view_component::{ViewComponent, ViewComponentOptions};
