use shadow_objects_kernel::{Kernel, KernelError};
use shadow_objects_shared::{ChangeTrail, ChangeTrailPayload, TrailError};
use shadow_objects_view::{ComponentContext, ViewError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error(transparent)]
    View(#[from] ViewError),
    #[error(transparent)]
    Trail(#[from] TrailError),
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

/// Flushes `context` and applies the trail to `kernel` the way a worker
/// boundary would: encoded to JSON, transferables moved alongside.
///
/// Returns the trail as the kernel received it.
pub fn exchange_trail(context: &ComponentContext, kernel: &mut Kernel) -> Result<ChangeTrail, ExchangeError> {
    let mut payload = ChangeTrailPayload::new(context.build_change_trails(true)?);
    let transferables = payload.take_transferables();
    let json = payload.to_json()?;

    let mut received = ChangeTrailPayload::from_json(&json)?;
    received.restore_transferables(transferables)?;
    kernel.run(&received.change_trail)?;
    Ok(received.change_trail)
}
