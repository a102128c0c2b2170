use crate::error::{LoaderError, Result};
use crate::exports::{Exports, Factory};
use crate::module::{ModuleId, Status};
use crate::registry::{Definition, Registry};
use crate::resolver::Resolver;
use crate::transport::{Definer, Transport};
use private::Sealed;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use tokio::sync::{Notify, oneshot};
use tracing::{debug, error, info, warn};

/// A fetch that did not succeed, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub id: ModuleId,
    pub reason: String,
}

type FailureHook = Box<dyn Fn(&FetchFailure)>;

struct Inner<T> {
    registry: Rc<RefCell<Registry>>,
    transport: T,
    anonymous: Cell<u64>,
    in_flight: Cell<usize>,
    idle: Notify,
    failures: RefCell<Vec<FetchFailure>>,
    bootstrapped: Cell<bool>,
    on_fetch_failure: Option<FailureHook>,
}

/// Asynchronous module loader.
///
/// Owns a [`Registry`] and a [`Transport`]. All state lives on the current thread;
/// fetches are spawned with [`tokio::task::spawn_local`], so every method that can start
/// a fetch must run inside a [`LocalSet`](tokio::task::LocalSet). Clones share the
/// same graph.
///
/// # Example
///
/// ```rust
/// use modload::{Exports, Factory, Loader, MemoryTransport};
///
/// let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// tokio::task::LocalSet::new().block_on(&runtime, async {
///     let transport = MemoryTransport::new()
///         .module("greeting", Vec::<&str>::new(), Factory::value("hello"))
///         .module("app", ["greeting"], Factory::new(1, |args| {
///             let greeting = args[0].downcast_ref::<&str>().copied().unwrap_or_default();
///             Exports::new(format!("{greeting}, world"))
///         }));
///
///     let loader = Loader::new(transport);
///     let app = loader.settle(loader.bootstrap("app").unwrap()).await.unwrap();
///     assert_eq!(app.downcast_ref::<String>().unwrap(), "hello, world");
/// });
/// ```
pub struct Loader<T: Transport> {
    inner: Rc<Inner<T>>,
}

impl<T: Transport> Clone for Loader<T> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<T: Transport> fmt::Debug for Loader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("modules", &self.inner.registry.borrow().len())
            .field("in_flight", &self.inner.in_flight.get())
            .field("failures", &self.inner.failures.borrow().len())
            .field("bootstrapped", &self.inner.bootstrapped.get())
            .finish_non_exhaustive()
    }
}

impl<T: Transport + 'static> Loader<T> {
    #[must_use]
    pub fn new(transport: T) -> Self {
        LoaderBuilder::new().transport(transport).build()
    }

    /// Registers a definition without starting resolution.
    ///
    /// Overwrites an earlier definition until the module starts resolving; later
    /// definitions are ignored and reported as [`Definition::Ignored`].
    pub fn define<I, D>(&self, id: impl Into<ModuleId>, dependencies: I, factory: Factory) -> Definition
    where
        I: IntoIterator<Item = D>,
        D: Into<ModuleId>,
    {
        let dependencies = dependencies.into_iter().map(Into::into).collect();
        self.inner.registry.borrow_mut().define(&id.into(), dependencies, factory)
    }

    /// Creates an anonymous root module over `dependencies` and starts resolving it.
    ///
    /// `callback` runs once every dependency is ready; its exports belong to the returned
    /// identifier, which nothing else refers to.
    pub fn require<I, D>(&self, dependencies: I, callback: Factory) -> ModuleId
    where
        I: IntoIterator<Item = D>,
        D: Into<ModuleId>,
    {
        let sequence = self.inner.anonymous.get();
        self.inner.anonymous.set(sequence + 1);

        let id = ModuleId::anonymous(sequence);
        self.define(id.clone(), dependencies, callback);
        debug!(module = %id, "Require issued");
        self.resolve(&id);
        id
    }

    /// Loads `dependencies` and yields their exports in declaration order.
    pub fn import<I, D>(&self, dependencies: I) -> Pending<Vec<Exports>>
    where
        I: IntoIterator<Item = D>,
        D: Into<ModuleId>,
    {
        let dependencies: Vec<ModuleId> = dependencies.into_iter().map(Into::into).collect();
        let arity = dependencies.len();
        self.await_root(dependencies, arity, <[Exports]>::to_vec)
    }

    /// Starts the application at `entry`. Allowed once per loader.
    ///
    /// # Errors
    /// Returns [`LoaderError::AlreadyBootstrapped`] on the second call.
    pub fn bootstrap(&self, entry: impl Into<ModuleId>) -> Result<Pending<Exports>> {
        let entry = entry.into();
        if self.inner.bootstrapped.replace(true) {
            return Err(LoaderError::AlreadyBootstrapped {
                message: format!("refusing entry `{entry}`").into(),
                context: None,
            });
        }

        info!(entry = %entry, "Bootstrapping loader");
        Ok(self.await_root(vec![entry], 1, |args: &[Exports]| {
            args.first().cloned().unwrap_or_default()
        }))
    }

    /// Waits until no fetch is in flight.
    ///
    /// Once idle the graph cannot make further progress on its own.
    pub async fn idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.in_flight.get() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Waits for `pending`, giving up as soon as the loader goes idle without it.
    ///
    /// Fetches unrelated to `pending` do not hold it back.
    ///
    /// # Errors
    /// Returns [`LoaderError::FetchFailed`] when fetches failed along the way, otherwise
    /// [`LoaderError::Unresolved`] listing the modules left waiting.
    pub async fn settle<R>(&self, mut pending: Pending<R>) -> Result<R> {
        tokio::select! {
            biased;
            received = &mut pending => received,
            () = self.idle() => pending.try_take().ok_or_else(|| self.stall_error()),
        }
    }

    #[must_use]
    pub fn status(&self, id: &str) -> Status {
        self.inner.registry.borrow().status(id)
    }

    /// Cached exports of an executed module.
    #[must_use]
    pub fn exports(&self, id: &str) -> Option<Exports> {
        self.inner.registry.borrow().get(id)?.exports().cloned()
    }

    #[must_use]
    pub fn dependencies(&self, id: &str) -> Option<Vec<ModuleId>> {
        self.inner.registry.borrow().get(id).map(|m| m.dependencies().to_vec())
    }

    #[must_use]
    pub fn failures(&self) -> Vec<FetchFailure> {
        self.inner.failures.borrow().clone()
    }

    /// Number of modules the registry knows about.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.get()
    }

    /// A definition handle bound to this loader's registry.
    #[must_use]
    pub fn definer(&self) -> Definer {
        Definer::new(&self.inner.registry)
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    fn await_root<R, F>(&self, dependencies: Vec<ModuleId>, arity: usize, pick: F) -> Pending<R>
    where
        R: 'static,
        F: Fn(&[Exports]) -> R + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let sender = Cell::new(Some(sender));
        let callback = Factory::new(arity, move |args| {
            if let Some(sender) = sender.take() {
                // The receiver may be gone; the exports are cached regardless.
                let _ = sender.send(pick(args));
            }
            Exports::empty()
        });

        self.require(dependencies, callback);
        Pending { receiver }
    }

    fn resolve(&self, id: &ModuleId) {
        let fetches = Resolver::new(&self.inner.registry).resolve(id);
        self.dispatch(fetches);
    }

    fn dispatch(&self, fetches: Vec<ModuleId>) {
        for id in fetches {
            debug!(module = %id, "Dispatching fetch");
            let fetch = self.inner.transport.fetch(&id, self.definer());
            self.inner.in_flight.set(self.inner.in_flight.get() + 1);

            let loader = Rc::downgrade(&self.inner);
            tokio::task::spawn_local(async move {
                let outcome = fetch.await.map_err(|e| e.to_string());
                if let Some(inner) = loader.upgrade() {
                    Self { inner }.complete(&id, outcome);
                }
            });
        }
    }

    fn complete(&self, id: &ModuleId, outcome: std::result::Result<(), String>) {
        let status = self.status(id);
        match outcome {
            Ok(()) => {
                if status == Status::Fetching {
                    warn!(module = %id, "Fetched source did not define the module, treating it as empty");
                    self.inner.registry.borrow_mut().define(id, Vec::new(), Factory::empty());
                }
                debug!(module = %id, "Fetch completed");
            },
            Err(reason) if status != Status::Fetching => {
                debug!(module = %id, %status, reason = %reason, "Fetch failed after the module was defined elsewhere");
            },
            Err(reason) => {
                if let Some(module) = self.inner.registry.borrow_mut().get_mut(id) {
                    module.advance(Status::Error);
                }
                let failure = FetchFailure { id: id.clone(), reason };
                error!(module = %id, reason = %failure.reason, "Fetch failed");
                if let Some(hook) = &self.inner.on_fetch_failure {
                    hook(&failure);
                }
                self.inner.failures.borrow_mut().push(failure);
            },
        }

        if self.status(id) == Status::Fetched {
            self.resolve(id);
        }

        let remaining = self.inner.in_flight.get().saturating_sub(1);
        self.inner.in_flight.set(remaining);
        if remaining == 0 {
            debug!(modules = self.len(), "Loader idle");
            self.inner.idle.notify_waiters();
        }
    }

    fn stall_error(&self) -> LoaderError {
        let failures = self.inner.failures.borrow();
        if !failures.is_empty() {
            let message =
                failures.iter().map(|f| format!("{}: {}", f.id, f.reason)).collect::<Vec<_>>().join("; ");
            return LoaderError::FetchFailed { message: message.into(), context: None };
        }

        let registry = self.inner.registry.borrow();
        let mut waiting: Vec<&str> = registry
            .ids()
            .filter(|id| !id.is_anonymous() && !registry.status(id).is_ready())
            .map(ModuleId::as_str)
            .collect();
        waiting.sort_unstable();
        LoaderError::Unresolved { message: waiting.join(", ").into(), context: None }
    }
}

/// Exports that become available once a root module executes.
///
/// Resolves to [`LoaderError::Unresolved`] if the loader is dropped first. A root that
/// waits on a failed fetch never completes; see [`Loader::settle`].
pub struct Pending<R> {
    receiver: oneshot::Receiver<R>,
}

impl<R> Pending<R> {
    /// Takes the value if the root already executed.
    pub fn try_take(&mut self) -> Option<R> {
        self.receiver.try_recv().ok()
    }
}

impl<R> Future for Pending<R> {
    type Output = Result<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|received| {
            received.map_err(|_| LoaderError::Unresolved {
                message: "loader dropped before the root module executed".into(),
                context: None,
            })
        })
    }
}

impl<R> fmt::Debug for Pending<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct NoTransport;
#[derive(Debug)]
pub struct WithTransport<T>(T);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoTransport {}
impl<T> Sealed for WithTransport<T> {}

/// Type-state builder for [`Loader`]. A transport is required before `build`.
#[allow(private_bounds)]
#[derive(Default)]
pub struct LoaderBuilder<S: Sealed = NoTransport> {
    state: S,
    on_fetch_failure: Option<FailureHook>,
}

#[allow(private_bounds)]
impl<S: Sealed> LoaderBuilder<S> {
    /// Called once for every failed fetch, after the failure is recorded.
    #[must_use = "Registers a fetch failure hook"]
    pub fn on_fetch_failure(mut self, hook: impl Fn(&FetchFailure) + 'static) -> Self {
        self.on_fetch_failure = Some(Box::new(hook));
        self
    }
}

impl LoaderBuilder<NoTransport> {
    #[must_use = "Creates a new loader builder"]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the transport used to fetch modules"]
    pub fn transport<T: Transport>(self, transport: T) -> LoaderBuilder<WithTransport<T>> {
        LoaderBuilder { state: WithTransport(transport), on_fetch_failure: self.on_fetch_failure }
    }
}

impl<T: Transport + 'static> LoaderBuilder<WithTransport<T>> {
    #[must_use = "Builds the loader"]
    pub fn build(self) -> Loader<T> {
        Loader {
            inner: Rc::new(Inner {
                registry: Rc::new(RefCell::new(Registry::new())),
                transport: self.state.0,
                anonymous: Cell::new(0),
                in_flight: Cell::new(0),
                idle: Notify::new(),
                failures: RefCell::new(Vec::new()),
                bootstrapped: Cell::new(false),
                on_fetch_failure: self.on_fetch_failure,
            }),
        }
    }
}

#[allow(private_bounds)]
impl<S: Sealed + fmt::Debug> fmt::Debug for LoaderBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderBuilder")
            .field("state", &self.state)
            .field("on_fetch_failure", &self.on_fetch_failure.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    #[tokio::test(flavor = "current_thread")]
    async fn test_idle_without_fetches_returns_immediately() {
        let loader = Loader::new(MemoryTransport::new());
        loader.idle().await;
        assert_eq!(loader.in_flight(), 0);
        assert_eq!(loader.len(), 0);
    }

    #[test]
    fn test_require_assigns_fresh_anonymous_ids() {
        let loader = Loader::new(MemoryTransport::new());
        let first = loader.require(Vec::<ModuleId>::new(), Factory::value(1_u8));
        let second = loader.require(Vec::<ModuleId>::new(), Factory::value(2_u8));

        assert_ne!(first, second);
        assert!(first.is_anonymous() && second.is_anonymous());
        assert_eq!(loader.status(&first), Status::Executed);
        assert_eq!(loader.exports(&second).and_then(|e| e.downcast_ref::<u8>().copied()), Some(2));
    }

    #[test]
    fn test_bootstrap_only_once() {
        let loader = Loader::new(MemoryTransport::new());
        loader.define("main", Vec::<ModuleId>::new(), Factory::value("main"));

        let mut pending = loader.bootstrap("main").expect("first bootstrap");
        let exports = pending.try_take().expect("defined entry executes synchronously");
        assert_eq!(exports.downcast_ref::<&str>(), Some(&"main"));

        let err = loader.bootstrap("main").unwrap_err();
        assert!(matches!(err, LoaderError::AlreadyBootstrapped { .. }));
    }
}
