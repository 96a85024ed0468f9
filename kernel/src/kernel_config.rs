/// Contains Config properties which will be used by the Kernel
#[derive(Clone, Debug)]
pub struct KernelConfig {
    /// Re-resolves the shadow objects of every live entity after a module
    /// import, so entities created earlier pick up the new constructors
    pub upgrade_on_import: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            upgrade_on_import: true,
        }
    }
}
