use std::rc::Rc;

use crate::{Registry, ShadowObjectConstructor};

pub type ModuleInitializer = Rc<dyn Fn(&mut Registry) -> Result<(), String>>;

/// A bundle of constructor definitions and routes imported into a
/// [`Registry`] as a unit. Modules named in `extends` are imported first;
/// each module is imported at most once per registry, by name.
#[derive(Clone)]
pub struct ShadowObjectsModule {
    name: String,
    defines: Vec<(String, ShadowObjectConstructor)>,
    routes: Vec<(String, Vec<String>)>,
    initialize: Option<ModuleInitializer>,
    extends: Vec<ShadowObjectsModule>,
}

impl ShadowObjectsModule {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            defines: Vec::new(),
            routes: Vec::new(),
            initialize: None,
            extends: Vec::new(),
        }
    }

    pub fn define(mut self, token: &str, constructor: ShadowObjectConstructor) -> Self {
        self.defines.push((token.to_string(), constructor));
        self
    }

    /// `from` may be a plain token or `token@property` for a route that only
    /// applies while `property` is truthy.
    pub fn route<'a>(mut self, from: &str, to: impl IntoIterator<Item = &'a str>) -> Self {
        self.routes
            .push((from.to_string(), to.into_iter().map(str::to_string).collect()));
        self
    }

    pub fn initialize(mut self, initialize: impl Fn(&mut Registry) -> Result<(), String> + 'static) -> Self {
        self.initialize = Some(Rc::new(initialize));
        self
    }

    pub fn extends(mut self, module: ShadowObjectsModule) -> Self {
        self.extends.push(module);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn defines(&self) -> &[(String, ShadowObjectConstructor)] {
        &self.defines
    }

    pub(crate) fn routes(&self) -> &[(String, Vec<String>)] {
        &self.routes
    }

    pub(crate) fn initializer(&self) -> Option<&ModuleInitializer> {
        self.initialize.as_ref()
    }

    pub(crate) fn extended(&self) -> &[ShadowObjectsModule] {
        &self.extends
    }
}

impl std::fmt::Debug for ShadowObjectsModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowObjectsModule")
            .field("name", &self.name)
            .field("defines", &self.defines.len())
            .field("routes", &self.routes.len())
            .field("extends", &self.extends.len())
            .finish()
    }
}
