//! Runs factories and caches their exports.
//!
//! No registry borrow is held while a factory runs, so factories may define or
//! require further modules.

use crate::exports::Exports;
use crate::module::{ModuleId, Status};
use crate::registry::Registry;
use std::cell::RefCell;
use tracing::{debug, warn};

pub(crate) struct Executor<'a> {
    registry: &'a RefCell<Registry>,
}

impl<'a> Executor<'a> {
    pub(crate) const fn new(registry: &'a RefCell<Registry>) -> Self {
        Self { registry }
    }

    /// Returns the exports of a ready module, running its factory the first time.
    ///
    /// With `circular` set the factory receives no arguments at all. Otherwise it gets the
    /// exports of its first `min(arity, dependencies.len())` dependencies, in declaration
    /// order. Returns `None` for modules that are not ready.
    pub(crate) fn execute(&self, id: &ModuleId, circular: bool) -> Option<Exports> {
        let (factory, inputs) = {
            let registry = self.registry.borrow();
            let module = registry.get(id)?;
            match module.status() {
                Status::Executed => return module.exports().cloned(),
                Status::Ready => {},
                _ => return None,
            }

            let factory = module.factory().clone();
            let inputs = if circular {
                Vec::new()
            } else {
                let count = factory.arity().min(module.dependencies().len());
                module.dependencies()[..count].to_vec()
            };
            (factory, inputs)
        };

        let args: Vec<Exports> = inputs.iter().map(|dep| self.exports_of(id, dep)).collect();
        debug!(module = %id, args = args.len(), circular, "Running factory");
        let exports = factory.call(&args);

        let mut registry = self.registry.borrow_mut();
        let module = registry.get_or_create(id);
        // A re-entrant call from inside the factory may have finished first.
        if let Some(existing) = module.exports() {
            return Some(existing.clone());
        }
        module.store_exports(exports.clone());
        debug!(module = %id, "Module executed");
        Some(exports)
    }

    fn exports_of(&self, dependent: &ModuleId, dep: &ModuleId) -> Exports {
        self.execute(dep, false).unwrap_or_else(|| {
            let status = self.registry.borrow().status(dep);
            warn!(module = %dependent, dependency = %dep, %status, "Dependency not ready, passing empty exports");
            Exports::empty()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exports::Factory;
    use std::cell::Cell;
    use std::rc::Rc;

    fn ready(registry: &RefCell<Registry>, id: &str, deps: &[&str], factory: Factory) {
        let mut registry = registry.borrow_mut();
        let id = ModuleId::from(id);
        registry.define(&id, deps.iter().map(|d| ModuleId::from(*d)).collect(), factory);
        let module = registry.get_or_create(&id);
        module.begin_resolving();
        module.advance(Status::Ready);
    }

    #[test]
    fn test_execute_is_idempotent() {
        let registry = RefCell::new(Registry::new());
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        ready(
            &registry,
            "a",
            &[],
            Factory::nullary(move || {
                counter.set(counter.get() + 1);
                Exports::new("a")
            }),
        );

        let executor = Executor::new(&registry);
        let first = executor.execute(&"a".into(), false).expect("ready module executes");
        let second = executor.execute(&"a".into(), false).expect("cached exports");

        assert!(first.ptr_eq(&second));
        assert_eq!(calls.get(), 1);
        assert_eq!(registry.borrow().status("a"), Status::Executed);
    }

    #[test]
    fn test_arity_truncates_arguments() {
        let registry = RefCell::new(Registry::new());
        for dep in ["p", "q", "r"] {
            ready(&registry, dep, &[], Factory::value(dep));
        }
        ready(
            &registry,
            "m",
            &["p", "q", "r"],
            Factory::new(1, |args| Exports::new(args.len())),
        );

        let exports = Executor::new(&registry).execute(&"m".into(), false).expect("executes");
        assert_eq!(exports.downcast_ref::<usize>(), Some(&1));
        assert_eq!(registry.borrow().status("q"), Status::Ready, "unused deps are not executed");
    }

    #[test]
    fn test_circular_execution_passes_nothing() {
        let registry = RefCell::new(Registry::new());
        ready(&registry, "b", &[], Factory::value("b"));
        ready(&registry, "a", &["b"], Factory::new(1, |args| Exports::new(args.len())));

        let exports = Executor::new(&registry).execute(&"a".into(), true).expect("executes");
        assert_eq!(exports.downcast_ref::<usize>(), Some(&0));
    }

    #[test]
    fn test_not_ready_module_is_not_executed() {
        let registry = RefCell::new(Registry::new());
        registry.borrow_mut().define(&"a".into(), Vec::new(), Factory::value(1_u8));

        assert!(Executor::new(&registry).execute(&"a".into(), false).is_none());
        assert_eq!(registry.borrow().status("a"), Status::Fetched);
    }
}
