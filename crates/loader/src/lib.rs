//! # Module Loader
//!
//! An asynchronous, dependency-ordered module loader.
//!
//! ## Overview
//!
//! Modules declare an ordered list of dependencies and a factory. The [`Loader`] fetches
//! unknown modules through a [`Transport`], walks each dependency graph, and runs every
//! factory exactly once after all of its dependencies are ready, handing it their exports
//! in declaration order.
//!
//! ## Features
//!
//! * **Deduplicated**: a module is fetched at most once and executed at most once.
//! * **Cycle tolerant**: circular dependencies are broken by executing the module that
//!   closes the cycle without injected exports.
//! * **Failure contained**: a failed fetch stalls only the modules that depend on it.
//! * **Single-threaded**: state lives in `Rc`/`RefCell`; fetches run as `spawn_local` tasks.
//!
//! # Example
//!
//! ```rust
//! use modload::{Exports, Factory, Loader, MemoryTransport};
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! tokio::task::LocalSet::new().block_on(&runtime, async {
//!     let transport = MemoryTransport::new()
//!         .module("math", Vec::<&str>::new(), Factory::value(2_u32))
//!         .module("double", ["math"], Factory::new(1, |args| {
//!             let base = args[0].downcast_ref::<u32>().copied().unwrap_or_default();
//!             Exports::new(base * 2)
//!         }));
//!     let loader = Loader::new(transport);
//!
//!     let exports = loader.settle(loader.import(["double", "math"])).await.unwrap();
//!     assert_eq!(exports[0].downcast_ref::<u32>(), Some(&4));
//!     assert_eq!(exports[1].downcast_ref::<u32>(), Some(&2));
//! });
//! ```

mod error;
mod executor;
mod exports;
mod loader;
mod module;
mod registry;
mod resolver;
mod transport;

pub use error::{LoaderError, LoaderErrorExt, Result};
pub use exports::{Exports, Factory};
pub use loader::{FetchFailure, Loader, LoaderBuilder, NoTransport, Pending, WithTransport};
pub use module::{Module, ModuleId, Status};
pub use registry::{Definition, Registry};
pub use transport::{Definer, MemoryError, MemoryErrorExt, MemoryTransport, Transport};
