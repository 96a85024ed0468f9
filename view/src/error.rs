use shadow_objects_shared::Uuid;
use thiserror::Error;

/// Errors raised by the view-side component tree
///
/// Every variant is a programmer error on the producing side. They are
/// reported immediately and never recovered from internally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ViewError {
    /// The component context was destroyed and rejects further operations
    #[error("Component context {namespace} is destroyed - cannot {operation}")]
    ContextDestroyed {
        namespace: String,
        operation: &'static str,
    },

    /// Parent and child live in different component contexts
    #[error("Cannot parent component {uuid} to {parent_uuid} - they belong to different contexts")]
    CrossContextParent { uuid: Uuid, parent_uuid: Uuid },

    /// The requested parent is not a live component of this context
    #[error("Cannot attach component {uuid} - parent {parent_uuid} is not registered in this context")]
    ParentNotRegistered { uuid: Uuid, parent_uuid: Uuid },

    /// A component with this uuid is already alive in this context
    #[error("Component {uuid} is already registered in this context")]
    UuidAlreadyRegistered { uuid: Uuid },

    /// The component is unknown to this context
    #[error("Component {uuid} not found - cannot {operation}")]
    ComponentNotFound { uuid: Uuid, operation: &'static str },

    /// The component was destroyed and can no longer be mutated
    #[error("Component {uuid} is destroyed - cannot {operation}")]
    ComponentDestroyed { uuid: Uuid, operation: &'static str },

    /// Reparenting would make a component its own ancestor
    #[error("Cannot parent component {uuid} to {parent_uuid} - it would become its own ancestor")]
    CyclicParent { uuid: Uuid, parent_uuid: Uuid },
}
