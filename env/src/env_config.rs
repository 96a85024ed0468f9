use std::{default::Default, time::Duration};

use shadow_objects_shared::GLOBAL_NAMESPACE;

/// Contains Config properties which will be used by a ShadowEnv
#[derive(Clone, Debug)]
pub struct ShadowEnvConfig {
    /// Namespace of the ComponentContext whose changes this env flushes
    pub namespace: String,
    /// Whether each flush blocks until the kernel confirms it applied the
    /// change trail
    pub wait_for_confirmation: bool,
    /// Whether starting a proxy or importing a script requests a flush on
    /// its own
    pub auto_sync: bool,
}

impl Default for ShadowEnvConfig {
    fn default() -> Self {
        Self {
            namespace: GLOBAL_NAMESPACE.to_string(),
            wait_for_confirmation: false,
            auto_sync: true,
        }
    }
}

/// Contains Config properties which will be used by a RemoteWorkerEnv
#[derive(Clone, Debug)]
pub struct RemoteWorkerConfig {
    /// How long to wait for the worker to confirm one request
    pub confirmation_timeout: Duration,
    /// How many times a request is resent after its confirmation timed out
    pub max_retries: u32,
    /// Name of the worker thread
    pub thread_name: String,
}

impl Default for RemoteWorkerConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout: Duration::from_secs(5),
            max_retries: 2,
            thread_name: "shadow-objects-worker".to_string(),
        }
    }
}
