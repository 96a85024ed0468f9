use log::{info, trace};

use shadow_objects_kernel::{Kernel, KernelConfig};
use shadow_objects_shared::{ChangeTrailPayload, MessageToView};

use crate::{EnvError, ModuleCatalog, ShadowEnvProxy};

enum LocalState {
    Idle,
    Running(Kernel),
    Destroyed,
}

/// Runs the Kernel in-process, on the caller's thread. Change trails are
/// applied synchronously, so every apply is confirmed on return.
pub struct LocalShadowObjectEnv {
    catalog: ModuleCatalog,
    kernel_config: KernelConfig,
    state: LocalState,
}

impl LocalShadowObjectEnv {
    pub fn new(catalog: ModuleCatalog, kernel_config: KernelConfig) -> Self {
        Self {
            catalog,
            kernel_config,
            state: LocalState::Idle,
        }
    }

    pub fn kernel(&self) -> Option<&Kernel> {
        match &self.state {
            LocalState::Running(kernel) => Some(kernel),
            _ => None,
        }
    }

    pub fn kernel_mut(&mut self) -> Option<&mut Kernel> {
        match &mut self.state {
            LocalState::Running(kernel) => Some(kernel),
            _ => None,
        }
    }

    fn running_kernel(&mut self, operation: &'static str) -> Result<&mut Kernel, EnvError> {
        match &mut self.state {
            LocalState::Running(kernel) => Ok(kernel),
            LocalState::Idle => Err(EnvError::NotStarted { operation }),
            LocalState::Destroyed => Err(EnvError::Destroyed { operation }),
        }
    }
}

impl ShadowEnvProxy for LocalShadowObjectEnv {
    fn start(&mut self) -> Result<(), EnvError> {
        match self.state {
            LocalState::Idle => {
                self.state = LocalState::Running(Kernel::new(self.kernel_config.clone()));
                info!("Local shadow objects env started");
                Ok(())
            }
            LocalState::Running(_) => Ok(()),
            LocalState::Destroyed => Err(EnvError::Destroyed { operation: "start" }),
        }
    }

    fn apply_change_trail(
        &mut self,
        payload: ChangeTrailPayload,
        _wait_for_confirmation: bool,
    ) -> Result<(), EnvError> {
        let kernel = self.running_kernel("apply change trail")?;
        trace!(
            "Applying change trail {:?} of {} record(s) in-process",
            payload.serial,
            payload.change_trail.len()
        );
        kernel.run(&payload.change_trail)?;
        Ok(())
    }

    fn import_script(&mut self, url: &str) -> Result<(), EnvError> {
        let module = self.catalog.resolve(url)?;
        let kernel = self.running_kernel("import script")?;
        kernel.import_module(&module)?;
        Ok(())
    }

    fn take_messages_to_view(&mut self) -> Vec<MessageToView> {
        match &mut self.state {
            LocalState::Running(kernel) => kernel.take_messages_to_view(),
            _ => Vec::new(),
        }
    }

    fn destroy(&mut self) {
        if let LocalState::Running(kernel) = &mut self.state {
            kernel.destroy();
            info!("Local shadow objects env destroyed");
        }
        self.state = LocalState::Destroyed;
    }

    fn is_alive(&self) -> bool {
        matches!(self.state, LocalState::Running(_))
    }
}
