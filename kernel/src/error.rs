use shadow_objects_shared::Uuid;
use thiserror::Error;

/// Errors raised while applying change trails to the entity tree
///
/// A trail referencing an entity the producer never created is corrupt.
/// The kernel reports it to the caller of `run` and does not try to recover.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KernelError {
    /// The record references an entity that does not exist
    #[error("Entity {uuid} not found - cannot {operation}")]
    EntityNotFound { uuid: Uuid, operation: &'static str },

    /// A CreateEntities record for an entity that already exists
    #[error("Entity {uuid} already exists")]
    EntityAlreadyExists { uuid: Uuid },

    /// The parent named by a record does not exist
    #[error("Parent {parent_uuid} of entity {uuid} not found")]
    ParentNotFound { uuid: Uuid, parent_uuid: Uuid },

    /// A module's initialize hook failed
    #[error("Failed to initialize module {module}: {message}")]
    ModuleInitialize { module: String, message: String },
}
