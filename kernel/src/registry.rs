use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, info};

use crate::{KernelError, ShadowObjectConstructor, ShadowObjectsModule};

const ROUTE_CONDITION_SEPARATOR: char = '@';

/// Maps tokens to shadow object constructors.
///
/// A token resolves to its own constructors plus those of every token it
/// routes to, transitively. A route keyed `token@property` only applies
/// while `property` is truthy on the entity being resolved.
pub struct Registry {
    constructors: HashMap<String, Vec<ShadowObjectConstructor>>,
    routes: HashMap<String, Vec<String>>,
    // token -> [(property, targets)]
    conditional_routes: HashMap<String, Vec<(String, Vec<String>)>>,
    gating_properties: HashSet<String>,
    imported_modules: HashSet<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
            routes: HashMap::new(),
            conditional_routes: HashMap::new(),
            gating_properties: HashSet::new(),
            imported_modules: HashSet::new(),
        }
    }

    pub fn define(&mut self, token: &str, constructor: ShadowObjectConstructor) {
        let defined = self.constructors.entry(token.to_string()).or_default();
        if defined.iter().any(|known| known.id() == constructor.id()) {
            return;
        }
        debug!("Defined shadow object {} for token {}", constructor.name(), token);
        defined.push(constructor);
    }

    /// Adds route targets for `from`, which is either a token or
    /// `token@property`.
    pub fn append_route<'a>(&mut self, from: &str, to: impl IntoIterator<Item = &'a str>) {
        let targets = to.into_iter().map(str::to_string);

        match from.split_once(ROUTE_CONDITION_SEPARATOR) {
            Some((token, property)) => {
                self.gating_properties.insert(property.to_string());
                let conditional = self.conditional_routes.entry(token.to_string()).or_default();
                match conditional.iter_mut().find(|(known, _)| known == property) {
                    Some((_, existing)) => append_deduped(existing, targets),
                    None => {
                        let mut fresh = Vec::new();
                        append_deduped(&mut fresh, targets);
                        conditional.push((property.to_string(), fresh));
                    }
                }
            }
            None => append_deduped(self.routes.entry(from.to_string()).or_default(), targets),
        }
    }

    /// True if `token` has constructors or routes of its own.
    pub fn has_token(&self, token: &str) -> bool {
        self.constructors.contains_key(token)
            || self.routes.contains_key(token)
            || self.conditional_routes.contains_key(token)
    }

    /// True if some conditional route is gated by `property`.
    pub fn is_gating_property(&self, property: &str) -> bool {
        self.gating_properties.contains(property)
    }

    /// Every token reachable from `token`, breadth-first, starting with
    /// `token` itself. Each token appears once, so cyclic routes terminate.
    pub fn resolve_tokens(&self, token: &str, is_truthy: impl Fn(&str) -> bool) -> Vec<String> {
        let mut resolved = vec![token.to_string()];
        let mut visited: HashSet<String> = HashSet::from([token.to_string()]);
        let mut queue: VecDeque<String> = VecDeque::from([token.to_string()]);

        while let Some(current) = queue.pop_front() {
            let direct = self.routes.get(&current).into_iter().flatten();
            let conditional = self
                .conditional_routes
                .get(&current)
                .into_iter()
                .flatten()
                .filter(|(property, _)| is_truthy(property.as_str()))
                .flat_map(|(_, targets)| targets);

            for target in direct.chain(conditional) {
                if visited.insert(target.clone()) {
                    resolved.push(target.clone());
                    queue.push_back(target.clone());
                }
            }
        }

        resolved
    }

    /// Constructors `token` resolves to, in token resolution order and then
    /// definition order, without duplicates.
    pub fn find_constructors(&self, token: &str, is_truthy: impl Fn(&str) -> bool) -> Vec<ShadowObjectConstructor> {
        let mut found: Vec<ShadowObjectConstructor> = Vec::new();
        for resolved in self.resolve_tokens(token, is_truthy) {
            for constructor in self.constructors.get(&resolved).into_iter().flatten() {
                if !found.iter().any(|known| known.id() == constructor.id()) {
                    found.push(constructor.clone());
                }
            }
        }
        found
    }

    // Modules

    pub fn is_imported(&self, module_name: &str) -> bool {
        self.imported_modules.contains(module_name)
    }

    /// Imports `module` and, first, the modules it extends. Returns `false`
    /// if it had already been imported.
    pub fn import_module(&mut self, module: &ShadowObjectsModule) -> Result<bool, KernelError> {
        if !self.imported_modules.insert(module.name().to_string()) {
            return Ok(false);
        }

        for extended in module.extended() {
            self.import_module(extended)?;
        }
        for (token, constructor) in module.defines() {
            self.define(token, constructor.clone());
        }
        for (from, to) in module.routes() {
            self.append_route(from, to.iter().map(String::as_str));
        }
        if let Some(initialize) = module.initializer() {
            initialize(self).map_err(|message| KernelError::ModuleInitialize {
                module: module.name().to_string(),
                message,
            })?;
        }

        info!("Imported shadow objects module {}", module.name());
        Ok(true)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn append_deduped(existing: &mut Vec<String>, targets: impl Iterator<Item = String>) {
    for target in targets {
        if !existing.contains(&target) {
            existing.push(target);
        }
    }
}
