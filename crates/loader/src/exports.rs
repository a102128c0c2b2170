use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// The value a module exposes to its dependents.
///
/// Type-erased and reference-counted: every dependent receives a handle to the
/// same instance, so [`Exports::ptr_eq`] tells whether two modules saw the same export.
#[derive(Clone)]
pub struct Exports(Rc<dyn Any>);

impl Exports {
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    /// The placeholder produced by factories with nothing to export.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is::<()>()
    }

    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Converts into a typed handle, giving the untouched exports back on mismatch.
    ///
    /// # Errors
    /// Returns `self` when the exported value is not a `T`.
    pub fn downcast<T: Any>(self) -> Result<Rc<T>, Self> {
        self.0.downcast::<T>().map_err(Self)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Exports {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Exports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() { f.write_str("Exports(empty)") } else { f.write_str("Exports(..)") }
    }
}

type FactoryFn = dyn Fn(&[Exports]) -> Exports;

/// A module's initialization function.
///
/// `arity` plays the role of the declared parameter count: the executor passes the
/// exports of the first `min(arity, dependencies.len())` dependencies and nothing else.
/// Dependencies past that point are still loaded before the factory runs.
#[derive(Clone)]
pub struct Factory {
    arity: usize,
    body: Rc<FactoryFn>,
}

impl Factory {
    pub fn new<F>(arity: usize, body: F) -> Self
    where
        F: Fn(&[Exports]) -> Exports + 'static,
    {
        Self { arity, body: Rc::new(body) }
    }

    /// A factory taking no arguments.
    pub fn nullary<F>(body: F) -> Self
    where
        F: Fn() -> Exports + 'static,
    {
        Self::new(0, move |_| body())
    }

    /// A definition whose factory is a plain value rather than a function.
    ///
    /// Every call hands out the same instance.
    pub fn value<T: Any>(value: T) -> Self {
        let exports = Exports::new(value);
        Self::new(0, move |_| exports.clone())
    }

    /// The factory of a module that has not been defined yet.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(0, |_| Exports::empty())
    }

    #[must_use]
    pub const fn arity(&self) -> usize {
        self.arity
    }

    pub(crate) fn call(&self, args: &[Exports]) -> Exports {
        (self.body)(args)
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory").field("arity", &self.arity).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_roundtrip() {
        let exports = Exports::new(41_u32);
        assert_eq!(exports.downcast_ref::<u32>(), Some(&41));
        assert!(exports.downcast_ref::<String>().is_none());

        let exports = exports.downcast::<String>().expect_err("wrong type keeps the exports");
        assert_eq!(*exports.downcast::<u32>().expect("right type"), 41);
    }

    #[test]
    fn test_value_factory_shares_one_instance() {
        let factory = Factory::value(String::from("config"));
        let first = factory.call(&[]);
        let second = factory.call(&[]);
        assert!(first.ptr_eq(&second));
        assert_eq!(factory.arity(), 0);
    }

    #[test]
    fn test_empty_factory_exports_placeholder() {
        assert!(Factory::empty().call(&[]).is_empty());
        assert!(!Exports::new(1_u8).is_empty());
    }
}
