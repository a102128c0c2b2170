//! # Runtime
//!
//! The loader keeps all module state on one thread and spawns transport fetches with
//! [`tokio::task::spawn_local`]. This crate packages the runtime that makes that work:
//! a current-thread Tokio runtime paired with a [`LocalSet`].
//!
//! ## Profiles
//! * **Default**: balanced scheduler settings for command-line use.
//! * **Responsive**: polls the I/O and timer drivers more often, useful when many
//!   fetches complete in bursts.
//!
//! ## Example
//!
//! ```rust
//! use modload_runtime::{LocalRuntime, RuntimeConfig};
//!
//! let runtime = LocalRuntime::new(&RuntimeConfig::default()).unwrap();
//! let answer = runtime.block_on(async {
//!     let task = tokio::task::spawn_local(async { 40 + 2 });
//!     task.await.unwrap()
//! });
//! assert_eq!(answer, 42);
//! ```

pub use anyhow::Result;
pub use modload_derive::main;

use anyhow::anyhow;
use std::future::Future;
use tokio::runtime::{Builder, Runtime};
use tokio::task::LocalSet;
use tracing::debug;

const DEFAULT_THREAD_NAME: &str = "modload";
const DEFAULT_EVENT_INTERVAL: u32 = 61;
const RESPONSIVE_EVENT_INTERVAL: u32 = 7;
const DEFAULT_MAX_BLOCKING_THREADS: usize = 64;
/// Upper bound for the blocking pool; `tokio::fs` runs on it.
const MAX_BLOCKING_THREADS: usize = 512;

/// Scheduler settings for the loader runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub thread_name: String,
    /// Number of scheduler ticks between polls of the I/O and timer drivers.
    pub event_interval: u32,
    pub max_blocking_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            event_interval: DEFAULT_EVENT_INTERVAL,
            max_blocking_threads: DEFAULT_MAX_BLOCKING_THREADS,
        }
    }
}

impl RuntimeConfig {
    /// Preset that checks the drivers more often between local tasks.
    #[must_use = "Use this configuration for fetch-heavy workloads"]
    pub fn responsive() -> Self {
        Self { event_interval: RESPONSIVE_EVENT_INTERVAL, ..Self::default() }
    }

    #[must_use = "Customize the thread name"]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.thread_name = if name.trim().is_empty() { DEFAULT_THREAD_NAME.to_owned() } else { name };
        self
    }

    #[must_use = "Customize how often the drivers are polled"]
    pub fn with_event_interval(mut self, interval: u32) -> Self {
        self.event_interval = interval.max(1);
        self
    }

    #[must_use = "Customize the size of the blocking pool"]
    pub fn with_max_blocking_threads(mut self, threads: usize) -> Self {
        self.max_blocking_threads = threads.clamp(1, MAX_BLOCKING_THREADS);
        self
    }

    fn normalized(&self) -> Self {
        Self::default()
            .with_thread_name(self.thread_name.clone())
            .with_event_interval(self.event_interval)
            .with_max_blocking_threads(self.max_blocking_threads)
    }
}

/// A current-thread runtime with a [`LocalSet`] attached.
///
/// Everything passed to [`LocalRuntime::block_on`] may call `spawn_local`.
#[derive(Debug)]
pub struct LocalRuntime {
    runtime: Runtime,
    local: LocalSet,
}

impl LocalRuntime {
    /// Builds the runtime from `config`.
    ///
    /// # Errors
    /// Returns an error if Tokio cannot create the runtime (e.g. the OS refuses to
    /// spawn the blocking pool).
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        let config = config.normalized();
        debug!(config = ?config, "Building local loader runtime");

        let runtime = Builder::new_current_thread()
            .thread_name(&config.thread_name)
            .event_interval(config.event_interval)
            .max_blocking_threads(config.max_blocking_threads)
            .enable_all()
            .build()
            .map_err(|e| anyhow!("Failed to initialize runtime: {e}"))?;

        Ok(Self { runtime, local: LocalSet::new() })
    }

    /// Runs `future` to completion inside the local task set.
    ///
    /// Tasks spawned with `spawn_local` keep running as long as `future` has not
    /// returned; leftovers are dropped with the runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.local.block_on(&self.runtime, future)
    }
}
