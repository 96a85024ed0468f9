//! # Shadow Objects Env
//! Moves change trails from a view-side ComponentContext to a Kernel,
//! either in-process or on a worker thread, and carries messages from
//! shadow objects back to their view components.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use shadow_objects_kernel::{KernelConfig, ShadowObjectsModule};
    pub use shadow_objects_shared::{ChangeTrailPayload, MessageToView};
    pub use shadow_objects_view::ComponentContext;
}

mod env_config;
mod error;
mod local_env;
mod module_catalog;
mod proxy;
mod remote_worker_env;
mod shadow_env;

pub use env_config::{RemoteWorkerConfig, ShadowEnvConfig};
pub use error::EnvError;
pub use local_env::LocalShadowObjectEnv;
pub use module_catalog::{ModuleCatalog, ModuleFactory};
pub use proxy::ShadowEnvProxy;
pub use remote_worker_env::RemoteWorkerEnv;
pub use shadow_env::ShadowEnv;
