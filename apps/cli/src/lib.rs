//! # Loader CLI
//!
//! Wires configuration, logging, the filesystem transport and the loader together:
//!
//! 1. [`settings`] layers `modload.toml`, `MODLOAD__*` variables and command-line flags.
//! 2. [`init_logger`] installs the subscriber described by the `[log]` table.
//! 3. [`bootstrap`] loads the entry module and returns its JSON exports.

mod args;

pub use args::Cli;

use anyhow::Context;
use modload::{FetchFailure, Loader, LoaderBuilder};
use modload_config::{LoaderConfig, LogConfig, load_config};
use modload_logger::{Logger, parse_level};
use modload_transport::FsTransport;
use serde_json::Value;
use tracing::{info, warn};

/// Resolves the effective configuration; flags win over the environment and files.
///
/// # Errors
/// Fails if an explicitly named config file is missing or any source is malformed.
pub fn settings(cli: &Cli) -> anyhow::Result<LoaderConfig> {
    let mut config: LoaderConfig =
        load_config(cli.config.as_ref()).context("Critical: Configuration is malformed")?;

    if let Some(entry) = &cli.entry {
        config.bootstrap.entry.clone_from(entry);
    }
    if let Some(root) = &cli.root {
        config.transport.root.clone_from(root);
    }
    if let Some(extension) = &cli.extension {
        config.transport.extension.clone_from(extension);
    }
    if !cli.paths.is_empty() {
        config.transport.paths.extend(cli.paths.iter().cloned());
    }
    if let Some(level) = &cli.log_level {
        config.log.level.clone_from(level);
    }
    if cli.json {
        config.log.json = true;
    }

    Ok(config)
}

/// Installs the global subscriber.
///
/// # Errors
/// Fails on an unknown level, bad filter directives or an unusable log directory.
pub fn init_logger(log: &LogConfig) -> anyhow::Result<Logger> {
    let mut builder = Logger::builder()
        .name(env!("CARGO_PKG_NAME"))
        .level(parse_level(&log.level)?)
        .console(log.console)
        .json(log.json);
    if let Some(filter) = &log.filter {
        builder = builder.env_filter(filter);
    }

    let logger = match &log.dir {
        Some(dir) => builder.path(dir).max_files(log.max_files).init()?,
        None => builder.init()?,
    };
    Ok(logger)
}

/// Builds the transport and loader for `config`.
///
/// # Errors
/// Fails if the module root cannot be resolved.
pub async fn loader(config: &LoaderConfig) -> anyhow::Result<Loader<FsTransport>> {
    let transport = FsTransport::builder()
        .root(&config.transport.root)
        .extension(&config.transport.extension)
        .paths(config.transport.paths.iter().map(|(id, locator)| (id.as_str(), locator.as_str())))
        .build()
        .await?;

    Ok(LoaderBuilder::new()
        .on_fetch_failure(|failure: &FetchFailure| {
            warn!(module = %failure.id, reason = %failure.reason, "Module unavailable");
        })
        .transport(transport)
        .build())
}

/// Loads the configured entry module and returns its exports.
///
/// Modules without JSON exports yield `null`.
///
/// # Errors
/// Fails if the root is unusable, a required module cannot be fetched, or the
/// dependency graph never settles.
pub async fn bootstrap(config: &LoaderConfig) -> anyhow::Result<Value> {
    let loader = loader(config).await?;
    let entry = &config.bootstrap.entry;

    info!(entry = %entry, root = %config.transport.root.display(), "Bootstrapping");
    let exports = loader
        .settle(loader.bootstrap(entry.as_str())?)
        .await
        .with_context(|| format!("Failed to load '{entry}'"))?;

    info!(entry = %entry, modules = loader.len(), "Entry module executed");
    Ok(exports.downcast_ref::<Value>().cloned().unwrap_or(Value::Null))
}
