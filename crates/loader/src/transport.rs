//! The seam between the loader and whatever retrieves module sources.

use crate::error::{LoaderError, Result};
use crate::exports::Factory;
use crate::module::ModuleId;
use crate::registry::{Definition, Registry};
use fxhash::{FxHashMap, FxHashSet};
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

/// Retrieves module sources on behalf of a [`Loader`](crate::Loader).
///
/// A fetch resolves `Ok(())` once the module (and anything else the source contains)
/// has been registered through the supplied [`Definer`]. It resolves at most once per
/// dispatch; the loader never dispatches the same identifier twice.
pub trait Transport {
    type Error: std::error::Error + 'static;

    fn fetch(
        &self,
        id: &ModuleId,
        definer: Definer,
    ) -> impl Future<Output = std::result::Result<(), Self::Error>> + 'static;
}

/// Handle through which fetched sources register their definitions.
///
/// Holds the registry weakly so in-flight fetches do not keep a dropped loader alive.
#[derive(Clone)]
pub struct Definer {
    registry: Weak<RefCell<Registry>>,
}

impl Definer {
    pub(crate) fn new(registry: &Rc<RefCell<Registry>>) -> Self {
        Self { registry: Rc::downgrade(registry) }
    }

    /// Registers `id` with its ordered dependency list and factory.
    ///
    /// # Errors
    /// Returns [`LoaderError::Internal`] if the owning loader no longer exists.
    pub fn define<I, D>(&self, id: impl Into<ModuleId>, dependencies: I, factory: Factory) -> Result<Definition>
    where
        I: IntoIterator<Item = D>,
        D: Into<ModuleId>,
    {
        let Some(shared) = self.registry.upgrade() else {
            return Err(LoaderError::from("loader dropped before the definition arrived"));
        };
        let dependencies = dependencies.into_iter().map(Into::into).collect();
        Ok(shared.borrow_mut().define(&id.into(), dependencies, factory))
    }
}

impl fmt::Debug for Definer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definer").field("attached", &(self.registry.strong_count() > 0)).finish()
    }
}

/// Errors produced by [`MemoryTransport`].
#[modload_derive::loader_error]
pub enum MemoryError {
    #[error("No source registered{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Fetch rejected{}: {message}", format_context(.context))]
    Rejected { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Source failed to define{}: {source}", format_context(.context))]
    Define { source: LoaderError, context: Option<Cow<'static, str>> },
}

type Source = Rc<dyn Fn(&Definer) -> Result<()>>;

#[derive(Default)]
struct MemoryInner {
    sources: RefCell<FxHashMap<ModuleId, Source>>,
    failing: RefCell<FxHashSet<ModuleId>>,
    latency: RefCell<FxHashMap<ModuleId, usize>>,
    stalled: RefCell<FxHashSet<ModuleId>>,
    dispatched: RefCell<FxHashMap<ModuleId, usize>>,
}

/// In-process transport serving sources from a table.
///
/// Latency is simulated by yielding to the scheduler a configurable number of times,
/// which lets tests control the order in which fetches complete. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Rc<MemoryInner>,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `id` by running `source`, which may define any number of modules.
    #[must_use]
    pub fn source<F>(self, id: impl Into<ModuleId>, source: F) -> Self
    where
        F: Fn(&Definer) -> Result<()> + 'static,
    {
        self.inner.sources.borrow_mut().insert(id.into(), Rc::new(source));
        self
    }

    /// Serves `id` as a source that defines exactly that module.
    #[must_use]
    pub fn module<I, D>(self, id: impl Into<ModuleId>, dependencies: I, factory: Factory) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<ModuleId>,
    {
        let id = id.into();
        let dependencies: Vec<ModuleId> = dependencies.into_iter().map(Into::into).collect();
        let name = id.clone();
        self.source(id, move |definer| {
            definer.define(name.clone(), dependencies.clone(), factory.clone()).map(|_| ())
        })
    }

    /// Makes every fetch of `id` fail.
    #[must_use]
    pub fn fail(self, id: impl Into<ModuleId>) -> Self {
        self.inner.failing.borrow_mut().insert(id.into());
        self
    }

    /// Makes every fetch of `id` wait forever.
    #[must_use]
    pub fn stall(self, id: impl Into<ModuleId>) -> Self {
        self.inner.stalled.borrow_mut().insert(id.into());
        self
    }

    /// Delays the fetch of `id` by `yields` scheduler turns.
    #[must_use]
    pub fn latency(self, id: impl Into<ModuleId>, yields: usize) -> Self {
        self.inner.latency.borrow_mut().insert(id.into(), yields);
        self
    }

    /// How many times a fetch for `id` was dispatched.
    #[must_use]
    pub fn dispatched(&self, id: &str) -> usize {
        self.inner.dispatched.borrow().get(id).copied().unwrap_or(0)
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("sources", &self.inner.sources.borrow().len())
            .field("failing", &self.inner.failing.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Transport for MemoryTransport {
    type Error = MemoryError;

    fn fetch(
        &self,
        id: &ModuleId,
        definer: Definer,
    ) -> impl Future<Output = std::result::Result<(), MemoryError>> + 'static {
        *self.inner.dispatched.borrow_mut().entry(id.clone()).or_default() += 1;
        let inner = Rc::clone(&self.inner);
        let id = id.clone();

        async move {
            let yields = inner.latency.borrow().get(&id).copied().unwrap_or(0);
            for _ in 0..yields {
                tokio::task::yield_now().await;
            }

            if inner.stalled.borrow().contains(&id) {
                std::future::pending::<()>().await;
            }

            if inner.failing.borrow().contains(&id) {
                return Err(MemoryError::Rejected { message: id.to_string().into(), context: None });
            }

            let source = inner.sources.borrow().get(&id).cloned();
            let Some(source) = source else {
                return Err(MemoryError::NotFound { message: id.to_string().into(), context: None });
            };
            source(&definer).map_err(|source| MemoryError::Define {
                source,
                context: Some(format!("Evaluating `{id}`").into()),
            })
        }
    }
}
