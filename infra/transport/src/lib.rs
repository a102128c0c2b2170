//! # Filesystem Transport
//!
//! A [`Transport`](modload::Transport) that reads module definitions from JSON
//! manifests below a sandboxed root directory.
//!
//! ## Resolution
//!
//! 1. The identifier is looked up in the configured path mappings.
//! 2. The extension is appended unless the locator already ends with it.
//! 3. The locator is normalized lexically; `..` that climbs above the root and absolute
//!    locators are rejected.
//! 4. The file is canonicalized and must still live under the canonical root.
//!
//! A manifest holds one module object or an array of them. See [`ModuleManifest`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use modload::Loader;
//! use modload_transport::FsTransport;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = FsTransport::builder().root("./modules").path("jquery", "vendor/jquery-3").build().await?;
//! let loader = Loader::new(transport);
//! let _main = loader.settle(loader.bootstrap("main")?).await?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod error;
mod manifest;
mod security;
mod transport;

pub use builder::{FsTransportBuilder, NoRoot, WithRoot};
pub use error::{TransportError, TransportErrorExt};
pub use manifest::ModuleManifest;
pub use transport::FsTransport;

impl FsTransport {
    #[must_use = "Creates a new transport builder with default configuration"]
    pub fn builder() -> FsTransportBuilder {
        FsTransportBuilder::new()
    }
}
