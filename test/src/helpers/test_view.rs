use std::rc::Rc;

use shadow_objects_kernel::{Kernel, KernelConfig, ShadowObjectsModule};
use shadow_objects_shared::{ChangeTrail, Uuid};
use shadow_objects_view::{ComponentContext, ViewComponent, ViewError};

use super::{exchange_trail, verify_mirror, ExchangeError, TestComponentBuilder};

/// Test harness pairing a view context with the kernel that mirrors it.
///
/// Every harness gets a namespace of its own, so tests on one thread
/// never share a context.
pub struct TestView {
    context: Rc<ComponentContext>,
    kernel: Kernel,
}

impl TestView {
    pub fn new(name: &str) -> Self {
        Self::with_kernel(name, Kernel::new(KernelConfig::default()))
    }

    pub fn with_kernel(name: &str, kernel: Kernel) -> Self {
        let namespace = format!("{}-{}", name, Uuid::new_v4());
        Self {
            context: ComponentContext::get(&namespace),
            kernel,
        }
    }

    pub fn context(&self) -> &Rc<ComponentContext> {
        &self.context
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut Kernel {
        &mut self.kernel
    }

    pub fn import(&mut self, module: &ShadowObjectsModule) -> Result<(), ExchangeError> {
        self.kernel.import_module(module)?;
        Ok(())
    }

    pub fn root(&self, token: &str) -> Result<ViewComponent, ViewError> {
        TestComponentBuilder::new(token).build(&self.context)
    }

    pub fn child(&self, parent: &ViewComponent, token: &str) -> Result<ViewComponent, ViewError> {
        TestComponentBuilder::new(token).parent(parent).build(&self.context)
    }

    pub fn build(&self, builder: TestComponentBuilder<'_>) -> Result<ViewComponent, ViewError> {
        builder.build(&self.context)
    }

    /// Flushes the context into the kernel and returns the trail sent.
    pub fn flush(&mut self) -> Result<ChangeTrail, ExchangeError> {
        exchange_trail(&self.context, &mut self.kernel)
    }

    /// Replaces the kernel with `kernel` as after a context loss, then
    /// re-sends the whole tree to it.
    pub fn lose_kernel(&mut self, kernel: Kernel) -> Result<ChangeTrail, ExchangeError> {
        self.kernel.destroy();
        self.kernel = kernel;
        self.context.re_create_changes()?;
        self.flush()
    }

    pub fn verify_mirror(&self) -> Result<(), String> {
        verify_mirror(&self.context, &self.kernel)
    }
}

impl Drop for TestView {
    fn drop(&mut self) {
        self.kernel.destroy();
        self.context.destroy();
    }
}
