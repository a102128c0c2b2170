//! The per-module record and its status machine.

use crate::exports::{Exports, Factory};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

const ANONYMOUS_PREFIX: &str = "@anonymous/";

/// Unique module identifier. Cheap to clone.
///
/// Doubles as the fetch locator unless a transport maps it elsewhere.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(Rc<str>);

impl ModuleId {
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Rc::from(id.as_ref()))
    }

    /// Identifier for the root module synthesized by a `require` call.
    #[must_use]
    pub fn anonymous(sequence: u64) -> Self {
        Self::new(format!("{ANONYMOUS_PREFIX}{sequence}"))
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.0.starts_with(ANONYMOUS_PREFIX)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        Self(Rc::from(id))
    }
}

impl From<&ModuleId> for ModuleId {
    fn from(id: &ModuleId) -> Self {
        id.clone()
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Deref for ModuleId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

/// Lifecycle of a module.
///
/// Transitions only move forward:
/// `Uninitialized → Fetching → Fetched → Resolving → Ready → Executed`,
/// with `Fetching → Error` as the single terminal failure edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// Known to the registry, nothing defined, no fetch started.
    #[default]
    Uninitialized,
    /// A transport fetch is in flight.
    Fetching,
    /// Definition registered; dependencies and factory are known.
    Fetched,
    /// Waiting for dependencies to become ready.
    Resolving,
    /// The whole dependency subgraph is loaded.
    Ready,
    /// The factory ran and the exports are cached.
    Executed,
    /// The fetch failed. Terminal.
    Error,
}

impl Status {
    /// Position in the forward lifecycle. `Error` sits outside of it.
    const fn rank(self) -> Option<u8> {
        match self {
            Self::Uninitialized => Some(0),
            Self::Fetching => Some(1),
            Self::Fetched => Some(2),
            Self::Resolving => Some(3),
            Self::Ready => Some(4),
            Self::Executed => Some(5),
            Self::Error => None,
        }
    }

    /// `Ready` or `Executed`: dependents may treat the module as satisfied.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready | Self::Executed)
    }

    #[must_use]
    pub const fn is_executed(self) -> bool {
        matches!(self, Self::Executed)
    }

    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Error)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => from <= to,
            (_, None) => matches!(self, Self::Fetching | Self::Error),
            (None, Some(_)) => false,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Fetching => "fetching",
            Self::Fetched => "fetched",
            Self::Resolving => "resolving",
            Self::Ready => "ready",
            Self::Executed => "executed",
            Self::Error => "error",
        })
    }
}

/// A registered module. Owned by the [`Registry`](crate::Registry) for its whole life.
#[derive(Debug)]
pub struct Module {
    id: ModuleId,
    status: Status,
    dependencies: Vec<ModuleId>,
    factory: Factory,
    exports: Option<Exports>,
    pending: usize,
    /// Dependents to notify once this module becomes ready.
    listeners: Vec<ModuleId>,
}

impl Module {
    pub(crate) fn new(id: ModuleId) -> Self {
        Self {
            id,
            status: Status::Uninitialized,
            dependencies: Vec::new(),
            factory: Factory::empty(),
            exports: None,
            pending: 0,
            listeners: Vec::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> &ModuleId {
        &self.id
    }

    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    #[must_use]
    pub fn dependencies(&self) -> &[ModuleId] {
        &self.dependencies
    }

    #[must_use]
    pub const fn factory(&self) -> &Factory {
        &self.factory
    }

    /// Cached factory result, present once the module is executed.
    #[must_use]
    pub const fn exports(&self) -> Option<&Exports> {
        self.exports.as_ref()
    }

    /// Dependencies that have not become ready yet.
    #[must_use]
    pub const fn pending(&self) -> usize {
        self.pending
    }

    #[must_use]
    pub fn listeners(&self) -> &[ModuleId] {
        &self.listeners
    }

    pub(crate) fn advance(&mut self, next: Status) {
        debug_assert!(
            self.status.can_advance_to(next),
            "illegal transition {} -> {next} for {}",
            self.status,
            self.id
        );
        self.status = next;
    }

    /// Replaces the definition. Only valid before resolution begins.
    pub(crate) fn define(&mut self, dependencies: Vec<ModuleId>, factory: Factory) {
        self.dependencies = dependencies;
        self.factory = factory;
        self.advance(Status::Fetched);
    }

    /// Enters `Resolving` and returns a snapshot of the dependency list to walk.
    pub(crate) fn begin_resolving(&mut self) -> Vec<ModuleId> {
        self.advance(Status::Resolving);
        self.pending = self.dependencies.len();
        self.dependencies.clone()
    }

    /// Counts one dependency as ready. Returns `true` when none are left.
    pub(crate) fn settle_one(&mut self) -> bool {
        self.pending = self.pending.saturating_sub(1);
        self.pending == 0
    }

    pub(crate) fn add_listener(&mut self, dependent: ModuleId) {
        self.listeners.push(dependent);
    }

    pub(crate) fn take_listeners(&mut self) -> Vec<ModuleId> {
        std::mem::take(&mut self.listeners)
    }

    pub(crate) fn store_exports(&mut self, exports: Exports) {
        self.exports = Some(exports);
        self.advance(Status::Executed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions_are_monotonic() {
        assert!(Status::Uninitialized.can_advance_to(Status::Fetching));
        assert!(Status::Fetched.can_advance_to(Status::Fetched));
        assert!(Status::Ready.can_advance_to(Status::Executed));
        assert!(!Status::Executed.can_advance_to(Status::Resolving));
        assert!(!Status::Resolving.can_advance_to(Status::Fetched));
    }

    #[test]
    fn test_error_only_from_fetching() {
        assert!(Status::Fetching.can_advance_to(Status::Error));
        assert!(!Status::Resolving.can_advance_to(Status::Error));
        assert!(!Status::Error.can_advance_to(Status::Fetched));
        assert!(!Status::Error.is_ready());
    }

    #[test]
    fn test_anonymous_ids() {
        let id = ModuleId::anonymous(3);
        assert!(id.is_anonymous());
        assert_eq!(id.as_str(), "@anonymous/3");
        assert!(!ModuleId::from("app/main").is_anonymous());
    }

    #[test]
    fn test_listeners_are_drained_once() {
        let mut module = Module::new("a".into());
        module.add_listener("b".into());
        module.add_listener("c".into());

        assert_eq!(module.take_listeners(), vec![ModuleId::from("b"), ModuleId::from("c")]);
        assert!(module.take_listeners().is_empty());
    }

    #[test]
    fn test_pending_count_reaches_zero() {
        let mut module = Module::new("a".into());
        module.define(vec!["b".into(), "c".into()], Factory::empty());

        let walked = module.begin_resolving();
        assert_eq!(walked.len(), 2);
        assert_eq!(module.pending(), 2);
        assert!(!module.settle_one());
        assert!(module.settle_one());
    }
}
