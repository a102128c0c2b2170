use serde::Deserialize;
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything `modload.toml` can hold.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderConfigInner {
    pub bootstrap: BootstrapConfig,
    pub transport: TransportConfig,
    pub log: LogConfig,
}

/// Thin Arc-wrapped config, cheap to clone into subsystems.
#[derive(Default, Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    #[serde(flatten, default)]
    inner: Arc<LoaderConfigInner>,
}

impl Deref for LoaderConfig {
    type Target = LoaderConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for LoaderConfig {
    fn deref_mut(&mut self) -> &mut LoaderConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

/// The entry module, consumed once at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub entry: String,
}

/// Where module sources come from.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Directory locators are resolved against.
    pub root: PathBuf,
    /// Appended to locators that carry no extension.
    pub extension: String,
    /// Identifier to locator overrides.
    pub paths: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// `EnvFilter` directives, e.g. `modload=debug`.
    pub filter: Option<String>,
    pub console: bool,
    pub json: bool,
    /// Enables rolling file output when set.
    pub dir: Option<PathBuf>,
    pub max_files: usize,
}

// --- Default ---

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self { entry: "main".to_owned() }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { root: PathBuf::from("."), extension: "json".to_owned(), paths: BTreeMap::new() }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            filter: None,
            console: true,
            json: false,
            dir: None,
            max_files: 10,
        }
    }
}
