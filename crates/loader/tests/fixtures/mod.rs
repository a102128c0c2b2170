use modload::{Exports, Factory};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

/// One factory invocation: the module name and the names found in its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub module: String,
    pub args: Vec<String>,
}

/// Shared log of factory invocations, in execution order.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    calls: Rc<RefCell<Vec<Call>>>,
}

impl Journal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory that logs its call and exports its own name as a `String`.
    ///
    /// Arguments that are not names (e.g. an empty export) are logged as `"-"`.
    #[must_use]
    pub fn factory(&self, module: &str, arity: usize) -> Factory {
        let calls = Rc::clone(&self.calls);
        let module = module.to_owned();
        Factory::new(arity, move |args| {
            let args = args
                .iter()
                .map(|a| a.downcast_ref::<String>().cloned().unwrap_or_else(|| "-".to_owned()))
                .collect();
            calls.borrow_mut().push(Call { module: module.clone(), args });
            Exports::new(module.clone())
        })
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Arguments of the single call made for `module`.
    ///
    /// # Panics
    /// * If `module` ran zero or several times.
    #[must_use]
    pub fn args_of(&self, module: &str) -> Vec<String> {
        let calls: Vec<Call> = self.calls().into_iter().filter(|c| c.module == module).collect();
        assert_eq!(calls.len(), 1, "{module} must run exactly once, got {calls:?}");
        calls[0].args.clone()
    }

    #[must_use]
    pub fn runs(&self, module: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.module == module).count()
    }
}

/// Runs `future` inside a fresh `LocalSet` so loader fetches can be spawned.
pub async fn local<F: Future>(future: F) -> F::Output {
    tokio::task::LocalSet::new().run_until(future).await
}

/// Blocking variant of [`local`] for synchronous test harnesses such as proptest.
///
/// # Panics
/// * If the Tokio runtime cannot be built.
pub fn block_on_local<F: Future>(future: F) -> F::Output {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("current-thread runtime");
    tokio::task::LocalSet::new().block_on(&runtime, future)
}

#[must_use]
pub fn name(exports: &Exports) -> Option<&str> {
    exports.downcast_ref::<String>().map(String::as_str)
}
