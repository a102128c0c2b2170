use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::Path;
use tracing::info;

/// Base name of the configuration file looked up when no path is given.
pub const DEFAULT_CONFIG: &str = "modload";
/// Prefix of environment overrides, e.g. `MODLOAD__BOOTSTRAP__ENTRY`.
pub const ENV_PREFIX: &str = "MODLOAD";

#[modload_derive::loader_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Loads `T` from a configuration file overlaid with environment variables.
///
/// 1. **Base file**: `path` when given (must exist), otherwise an optional `modload.*`
///    in the working directory. Any format the `config` crate understands works.
/// 2. **Environment**: variables prefixed with `MODLOAD__`; nested keys are separated by
///    double underscores (`MODLOAD__TRANSPORT__ROOT` maps to `transport.root`).
///
/// # Errors
/// Returns [`ConfigError::Config`] if an explicit file is missing, a source cannot be
/// parsed, or the merged values do not match `T`.
///
/// # Example
/// ```rust
/// use modload_config::{LoaderConfig, load_config};
///
/// let cfg: LoaderConfig = load_config(None::<&str>).unwrap_or_default();
/// assert!(!cfg.transport.extension.is_empty());
/// ```
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let (file, required) = match path.as_ref() {
        Some(p) => (File::from(p.as_ref()).required(true), true),
        None => (File::with_name(DEFAULT_CONFIG).required(false), false),
    };

    let builder = Config::builder().add_source(file).add_source(
        Environment::with_prefix(ENV_PREFIX).separator("__").convert_case(config::Case::Snake),
    );

    match &path {
        Some(p) => info!(path = %p.as_ref().display(), required, "Loading config"),
        None => info!(name = DEFAULT_CONFIG, required, "Loading config"),
    }

    let config = builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}
