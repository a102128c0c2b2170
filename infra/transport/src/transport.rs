use crate::error::{TransportError, TransportErrorExt};
use crate::manifest::Manifest;
use crate::security::{ensure_within, normalize_relative};
use fxhash::FxHashMap;
use modload::{Definer, Definition, ModuleId, Transport};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, trace};

#[derive(Debug)]
pub(crate) struct FsInner {
    pub(crate) root: PathBuf,
    pub(crate) extension: String,
    pub(crate) paths: FxHashMap<String, String>,
}

/// Serves modules from JSON manifests under a sandboxed root directory.
///
/// Identifiers are mapped through the configured `paths`, suffixed with the
/// extension and resolved relative to the root. Clones share configuration.
#[derive(Debug, Clone)]
pub struct FsTransport {
    pub(crate) inner: Arc<FsInner>,
}

impl FsTransport {
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    #[must_use]
    pub fn extension(&self) -> &str {
        &self.inner.extension
    }

    /// The relative locator for `id` before it touches the filesystem.
    #[must_use]
    pub fn locator(&self, id: &str) -> String {
        self.inner.locator(id)
    }

    /// Resolves `id` to the canonical path of its manifest.
    ///
    /// # Errors
    /// * [`TransportError::PathTraversal`] if the locator escapes the root.
    /// * [`TransportError::NotFound`] if no such file exists.
    /// * [`TransportError::Io`] for any other filesystem failure.
    pub async fn locate(&self, id: &str) -> Result<PathBuf, TransportError> {
        self.inner.locate(id).await
    }
}

impl FsInner {
    fn locator(&self, id: &str) -> String {
        let mapped = self.paths.get(id).map_or(id, String::as_str);
        let suffixed = Path::new(mapped).extension().is_some_and(|e| e.to_str() == Some(self.extension.as_str()));
        if self.extension.is_empty() || suffixed {
            mapped.to_owned()
        } else {
            format!("{mapped}.{}", self.extension)
        }
    }

    async fn locate(&self, id: &str) -> Result<PathBuf, TransportError> {
        let relative = normalize_relative(Path::new(&self.locator(id)))?;
        let candidate = self.root.join(relative);

        let canonical = match fs::canonicalize(&candidate).await {
            Ok(path) => path,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TransportError::NotFound {
                    message: candidate.display().to_string().into(),
                    context: Some(format!("No manifest for module '{id}'").into()),
                });
            },
            Err(e) => return Err(e).context(format!("Failed to resolve {}", candidate.display())),
        };

        ensure_within(&self.root, canonical)
    }

    async fn load(&self, id: &ModuleId, definer: &Definer) -> Result<(), TransportError> {
        let path = self.locate(id).await?;
        let bytes = fs::read(&path).await.context(format!("Failed to read {}", path.display()))?;
        let manifest =
            serde_json::from_slice::<Manifest>(&bytes).context(path.display().to_string())?;

        for module in manifest.into_modules() {
            let target = module.id.clone().unwrap_or_else(|| id.to_string());
            let factory = module.factory(&target);
            let outcome = definer
                .define(target.as_str(), module.deps.iter().map(String::as_str), factory)
                .context(format!("Defining '{target}' from {}", path.display()))?;

            match outcome {
                Definition::Applied => trace!(module = %target, deps = ?module.deps, "Defined from manifest"),
                Definition::Ignored(status) => {
                    debug!(module = %target, %status, "Manifest definition ignored; module already past definition");
                },
            }
        }

        Ok(())
    }
}

impl Transport for FsTransport {
    type Error = TransportError;

    fn fetch(&self, id: &ModuleId, definer: Definer) -> impl Future<Output = Result<(), Self::Error>> + 'static {
        let inner = Arc::clone(&self.inner);
        let id = id.clone();
        async move {
            debug!(module = %id, "Fetching module manifest");
            inner.load(&id, &definer).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inner(extension: &str) -> FsInner {
        let mut paths = FxHashMap::default();
        paths.insert("jquery".to_owned(), "vendor/jquery-3".to_owned());
        paths.insert("data".to_owned(), "fixtures/data.json".to_owned());
        FsInner { root: PathBuf::from("/srv"), extension: extension.to_owned(), paths }
    }

    #[test]
    fn test_locator_appends_extension_once() {
        let fs = inner("json");
        assert_eq!(fs.locator("app/main"), "app/main.json");
        assert_eq!(fs.locator("app/main.json"), "app/main.json");
        assert_eq!(fs.locator("jquery"), "vendor/jquery-3.json");
        assert_eq!(fs.locator("data"), "fixtures/data.json");
    }

    #[test]
    fn test_locator_without_extension() {
        assert_eq!(inner("").locator("app/main"), "app/main");
    }
}
