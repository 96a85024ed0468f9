use shadow_objects_kernel::KernelError;
use shadow_objects_shared::TrailError;
use shadow_objects_view::ViewError;
use thiserror::Error;

/// Errors raised while pumping change trails from a view context into a
/// kernel.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The proxy was used before `start()`
    #[error("Env proxy has not been started - cannot {operation}")]
    NotStarted { operation: &'static str },

    /// The proxy was used after `destroy()`
    #[error("Env proxy has been destroyed - cannot {operation}")]
    Destroyed { operation: &'static str },

    #[error(transparent)]
    Serialize(#[from] TrailError),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    View(#[from] ViewError),

    /// The worker thread could not be spawned
    #[error("Failed to spawn worker thread {thread_name}: {message}")]
    WorkerSpawn { thread_name: String, message: String },

    /// The worker thread is gone, its channel is closed
    #[error("Worker disconnected")]
    WorkerDisconnected,

    /// No confirmation arrived for `serial` after every retry
    #[error("No confirmation for change trail {serial} after {attempts} attempts")]
    ConfirmationTimeout { serial: u64, attempts: u32 },

    /// The worker replied with an error for `serial`
    #[error("Worker failed to apply request {serial}: {message}")]
    RemoteFailure { serial: u64, message: String },

    /// `import_script` was given a url the catalog does not know
    #[error("No module registered for script {url}")]
    UnknownScript { url: String },
}
