use std::{collections::HashMap, sync::Arc};

use shadow_objects_kernel::ShadowObjectsModule;

use crate::EnvError;

/// Builds a module. Modules hold `Rc`s, so a remote worker calls this on
/// its own thread.
pub type ModuleFactory = dyn Fn() -> ShadowObjectsModule + Send + Sync;

/// Script urls known to `import_script`, each mapped to the factory of the
/// module it stands for.
#[derive(Clone, Default)]
pub struct ModuleCatalog {
    factories: HashMap<String, Arc<ModuleFactory>>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        url: &str,
        factory: impl Fn() -> ShadowObjectsModule + Send + Sync + 'static,
    ) -> Self {
        self.factories.insert(url.to_string(), Arc::new(factory));
        self
    }

    pub fn contains(&self, url: &str) -> bool {
        self.factories.contains_key(url)
    }

    pub fn resolve(&self, url: &str) -> Result<ShadowObjectsModule, EnvError> {
        let factory = self.factories.get(url).ok_or_else(|| EnvError::UnknownScript {
            url: url.to_string(),
        })?;
        Ok(factory())
    }
}
