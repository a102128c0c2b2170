//! Dependency resolution.
//!
//! The walk runs on an explicit frame stack in declaration order. Whenever a module's
//! last pending dependency becomes ready it is marked ready, executed, and its
//! listeners are settled through a work queue, so neither the walk nor the
//! notification cascade recurses.

use crate::executor::Executor;
use crate::module::{Module, ModuleId, Status};
use crate::registry::Registry;
use fxhash::FxHashSet;
use std::cell::RefCell;
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// A module whose dependency list is being walked.
#[derive(Debug)]
struct Frame {
    id: ModuleId,
    dependencies: Vec<ModuleId>,
    cursor: usize,
    /// Dependency entered from this frame; settled once its walk returns.
    awaiting: Option<ModuleId>,
}

enum Step {
    Done,
    /// Walk into the dependency. `counted` is false when the dependent is already ready
    /// and only wants the dependency loaded.
    Descend { counted: bool },
}

pub(crate) struct Resolver<'a> {
    registry: &'a RefCell<Registry>,
    fetches: Vec<ModuleId>,
}

impl<'a> Resolver<'a> {
    pub(crate) const fn new(registry: &'a RefCell<Registry>) -> Self {
        Self { registry, fetches: Vec::new() }
    }

    /// Drives `root` as far as it can go synchronously.
    ///
    /// Returns the modules that moved to `Fetching` and need a transport dispatch.
    pub(crate) fn resolve(mut self, root: &ModuleId) -> Vec<ModuleId> {
        let mut stack = Vec::new();
        self.enter(root, &mut stack);

        while let Some(frame) = stack.last_mut() {
            let module = frame.id.clone();
            if let Some(dep) = frame.awaiting.take() {
                self.settle(&module, &dep);
            }

            let Some(dep) = frame.dependencies.get(frame.cursor).cloned() else {
                stack.pop();
                self.finish(&module);
                continue;
            };
            frame.cursor += 1;

            if let Step::Descend { counted } = self.visit(&module, &dep) {
                if counted {
                    frame.awaiting = Some(dep.clone());
                }
                self.enter(&dep, &mut stack);
            }
        }

        self.fetches
    }

    fn enter(&mut self, id: &ModuleId, stack: &mut Vec<Frame>) {
        let mut registry = self.registry.borrow_mut();
        let module = registry.get_or_create(id);
        match module.status() {
            Status::Uninitialized => {
                module.advance(Status::Fetching);
                trace!(module = %id, "Scheduling fetch");
                self.fetches.push(id.clone());
            },
            Status::Fetched => {
                let dependencies = module.begin_resolving();
                debug!(module = %id, deps = dependencies.len(), "Resolving module");
                if dependencies.is_empty() {
                    drop(registry);
                    self.mark_ready(id, false);
                } else {
                    stack.push(Frame { id: id.clone(), dependencies, cursor: 0, awaiting: None });
                }
            },
            // In flight, failed, or already being resolved by someone else.
            Status::Fetching | Status::Resolving | Status::Ready | Status::Executed | Status::Error => {},
        }
    }

    fn visit(&self, module: &ModuleId, dep: &ModuleId) -> Step {
        let (module_status, dep_status, closes_pair) = {
            let mut registry = self.registry.borrow_mut();
            let dep_record = registry.get_or_create(dep);
            let dep_status = dep_record.status();
            let closes_pair = dep_record.dependencies().contains(module);
            (registry.status(module), dep_status, closes_pair)
        };

        if module_status != Status::Resolving {
            let loadable = matches!(dep_status, Status::Uninitialized | Status::Fetched);
            return if loadable { Step::Descend { counted: false } } else { Step::Done };
        }

        match dep_status {
            Status::Ready | Status::Executed => {
                if closes_pair {
                    warn!(module = %module, dependency = %dep, "Circular dependency, executing without injected exports");
                    self.mark_ready(module, true);
                } else {
                    self.settle_one(module);
                }
                Step::Done
            },
            Status::Uninitialized | Status::Fetched => Step::Descend { counted: true },
            Status::Resolving if self.waits_on(dep, module) => {
                warn!(module = %module, dependency = %dep, "Circular dependency, executing without injected exports");
                self.mark_ready(module, true);
                Step::Done
            },
            Status::Resolving | Status::Fetching | Status::Error => {
                self.listen(module, dep);
                Step::Done
            },
        }
    }

    /// Accounts for a dependency whose walk just returned.
    fn settle(&self, module: &ModuleId, dep: &ModuleId) {
        if self.registry.borrow().status(module) != Status::Resolving {
            return;
        }
        if self.registry.borrow().status(dep).is_ready() {
            self.settle_one(module);
        } else {
            self.listen(module, dep);
        }
    }

    fn finish(&self, id: &ModuleId) {
        let complete = self
            .registry
            .borrow()
            .get(id)
            .is_some_and(|m| m.status() == Status::Resolving && m.pending() == 0);
        if complete {
            self.mark_ready(id, false);
        }
    }

    fn settle_one(&self, module: &ModuleId) {
        if let Some(record) = self.registry.borrow_mut().get_mut(module) {
            record.settle_one();
        }
    }

    fn listen(&self, module: &ModuleId, dep: &ModuleId) {
        trace!(module = %module, dependency = %dep, "Waiting on dependency");
        self.registry.borrow_mut().get_or_create(dep).add_listener(module.clone());
    }

    /// Whether `from` reaches `target` through declared dependencies of modules that
    /// are not ready yet. Such a path means `target` would wait on itself.
    fn waits_on(&self, from: &ModuleId, target: &ModuleId) -> bool {
        let registry = self.registry.borrow();
        let mut seen = FxHashSet::default();
        let mut stack = vec![from];

        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            let Some(module) = registry.get(id) else { continue };
            if module.status().is_ready() {
                continue;
            }
            stack.extend(module.dependencies());
        }

        false
    }

    /// Marks `id` ready, executes it, and settles every module that listened on it.
    pub(crate) fn mark_ready(&self, id: &ModuleId, circular: bool) {
        let mut queue = VecDeque::from([(id.clone(), circular)]);

        while let Some((id, circular)) = queue.pop_front() {
            {
                let mut registry = self.registry.borrow_mut();
                let Some(module) = registry.get_mut(&id) else { continue };
                if module.status() != Status::Resolving {
                    continue;
                }
                module.advance(Status::Ready);
            }
            debug!(module = %id, circular, "Module ready");

            Executor::new(self.registry).execute(&id, circular);

            let listeners =
                self.registry.borrow_mut().get_mut(&id).map(Module::take_listeners).unwrap_or_default();
            for dependent in listeners {
                let mut registry = self.registry.borrow_mut();
                if let Some(module) = registry.get_mut(&dependent)
                    && module.status() == Status::Resolving
                    && module.settle_one()
                {
                    queue.push_back((dependent, false));
                }
            }
        }
    }
}
