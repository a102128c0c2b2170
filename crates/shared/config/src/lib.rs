//! Configuration for the module loader.
//!
//! [`LoaderConfig`] mirrors `modload.toml`; [`load_config`] layers the file with
//! `MODLOAD__`-prefixed environment variables.
//!
//! ```toml
//! [bootstrap]
//! entry = "app/main"
//!
//! [transport]
//! root = "modules"
//! extension = "json"
//!
//! [transport.paths]
//! "lib/math" = "vendor/math-1.2"
//!
//! [log]
//! level = "debug"
//! ```

mod loader;
mod model;

pub use loader::{ConfigError, ConfigErrorExt, DEFAULT_CONFIG, ENV_PREFIX, load_config};
pub use model::{BootstrapConfig, LoaderConfig, LoaderConfigInner, LogConfig, TransportConfig};
