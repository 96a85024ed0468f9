use shadow_objects_shared::{ChangeTrailPayload, MessageToView};

use crate::EnvError;

/// Something that owns a Kernel, or talks to one, and can have change
/// trails applied to it.
pub trait ShadowEnvProxy {
    /// Creates the kernel. Must be called once before anything else.
    fn start(&mut self) -> Result<(), EnvError>;

    /// Replays `payload` against the kernel. With `wait_for_confirmation`
    /// the call only returns once the kernel has applied it.
    fn apply_change_trail(
        &mut self,
        payload: ChangeTrailPayload,
        wait_for_confirmation: bool,
    ) -> Result<(), EnvError>;

    /// Imports the module registered under `url` into the kernel.
    fn import_script(&mut self, url: &str) -> Result<(), EnvError>;

    /// Messages shadow objects sent to their view components since the
    /// last call.
    fn take_messages_to_view(&mut self) -> Vec<MessageToView>;

    /// Failures of requests sent without waiting for confirmation, oldest
    /// first. A proxy that applies everything synchronously has none.
    fn take_failures(&mut self) -> Vec<EnvError> {
        Vec::new()
    }

    /// Tears the kernel down. Further calls fail with `Destroyed`.
    fn destroy(&mut self);

    fn is_alive(&self) -> bool;
}
