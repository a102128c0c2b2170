use crate::exports::Factory;
use crate::module::{Module, ModuleId, Status};
use fxhash::FxHashMap;
use tracing::{debug, warn};

/// Outcome of registering a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Definition {
    /// The definition was stored; the module is `Fetched`.
    Applied,
    /// The module already started resolving (or failed); the definition was dropped.
    Ignored(Status),
}

/// Mapping from identifier to module record.
///
/// Records are created lazily through [`Registry::get_or_create`] and never removed.
/// Each [`Loader`](crate::Loader) owns one, so independent graphs never share state.
#[derive(Debug, Default)]
pub struct Registry {
    modules: FxHashMap<ModuleId, Module>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for `id`, inserting an `Uninitialized` one first if needed.
    pub fn get_or_create(&mut self, id: &ModuleId) -> &mut Module {
        self.modules.entry(id.clone()).or_insert_with(|| Module::new(id.clone()))
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Module> {
        self.modules.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Module> {
        self.modules.get_mut(id)
    }

    /// Status of `id`; unknown identifiers report `Uninitialized`.
    #[must_use]
    pub fn status(&self, id: &str) -> Status {
        self.get(id).map_or(Status::Uninitialized, Module::status)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.keys()
    }

    /// Stores `dependencies` and `factory` for `id` and marks it `Fetched`.
    ///
    /// Redefinition overwrites (last writer wins) until resolution starts. From then on
    /// the dependency list is fixed and cached exports stay untouched.
    pub fn define(
        &mut self,
        id: &ModuleId,
        dependencies: Vec<ModuleId>,
        factory: Factory,
    ) -> Definition {
        let module = self.get_or_create(id);
        match module.status() {
            Status::Uninitialized | Status::Fetching | Status::Fetched => {
                debug!(module = %id, deps = ?dependencies, arity = factory.arity(), "Module defined");
                module.define(dependencies, factory);
                Definition::Applied
            },
            status => {
                warn!(module = %id, %status, "Ignoring redefinition of a module already in use");
                Definition::Ignored(status)
            },
        }
    }
}
