use crate::error::{TransportError, TransportErrorExt};
use crate::transport::{FsInner, FsTransport};
use fxhash::FxHashMap;
use private::Sealed;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::info;

const DEFAULT_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
struct FsConfig {
    extension: String,
    paths: FxHashMap<String, String>,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self { extension: DEFAULT_EXTENSION.to_owned(), paths: FxHashMap::default() }
    }
}

#[derive(Debug, Default)]
pub struct NoRoot;
#[derive(Debug)]
pub struct WithRoot(PathBuf);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoRoot {}
impl Sealed for WithRoot {}

#[allow(private_bounds)]
#[derive(Debug, Default)]
pub struct FsTransportBuilder<S: Sealed = NoRoot> {
    state: S,
    config: FsConfig,
}

#[allow(private_bounds)]
impl<S: Sealed> FsTransportBuilder<S> {
    /// File extension appended to locators that do not already carry it. Leading dots are ignored.
    #[must_use = "Sets the module file extension"]
    pub fn extension(mut self, extension: impl AsRef<str>) -> Self {
        self.config.extension = extension.as_ref().trim_start_matches('.').to_owned();
        self
    }

    /// Maps a module identifier to a different locator, relative to the root.
    #[must_use = "Registers a path mapping"]
    pub fn path(mut self, id: impl Into<String>, locator: impl Into<String>) -> Self {
        self.config.paths.insert(id.into(), locator.into());
        self
    }

    #[must_use = "Registers path mappings"]
    pub fn paths<I, K, V>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.config.paths.extend(paths.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    fn transition<N: Sealed>(self, state: N) -> FsTransportBuilder<N> {
        FsTransportBuilder { state, config: self.config }
    }
}

impl FsTransportBuilder<NoRoot> {
    #[must_use = "Creates a new transport builder with default configuration"]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the directory module locators are resolved against"]
    pub fn root(self, path: impl Into<PathBuf>) -> FsTransportBuilder<WithRoot> {
        self.transition(WithRoot(path.into()))
    }
}

impl FsTransportBuilder<WithRoot> {
    /// Resolves the root to its canonical path and returns the transport.
    ///
    /// Every fetched file is checked against the canonical root, so symlinks
    /// cannot point a module outside of it.
    ///
    /// # Errors
    /// * [`TransportError::Io`] if the root does not exist or cannot be resolved.
    /// * [`TransportError::PathTraversal`] if the root is not a directory.
    pub async fn build(self) -> Result<FsTransport, TransportError> {
        let root = &self.state.0;

        let canonical = fs::canonicalize(root)
            .await
            .context(format!("Failed to resolve module root: {}", root.display()))?;

        let metadata = fs::metadata(&canonical).await.context("Failed to inspect module root")?;
        if !metadata.is_dir() {
            return Err(TransportError::PathTraversal {
                message: canonical.display().to_string().into(),
                context: Some("Module root must be a directory".into()),
            });
        }

        info!(
            root = %canonical.display(),
            extension = %self.config.extension,
            mappings = self.config.paths.len(),
            "Filesystem transport ready"
        );

        Ok(FsTransport {
            inner: Arc::new(FsInner {
                root: canonical,
                extension: self.config.extension,
                paths: self.config.paths,
            }),
        })
    }
}
