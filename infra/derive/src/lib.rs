#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the loader workspace.
//!
//! * [`loader_error`] turns an enum into a `thiserror` error with context support.
//! * [`main`] boots the single-threaded runtime the loader expects.
//!
//! Doc examples are `ignore`d here because a proc-macro crate cannot use its own macros;
//! see the consuming crates for compiled usages.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemFn, parse_macro_input};

/// Attribute macro that runs an `async fn main` on the single-threaded loader runtime.
///
/// The generated `fn main` builds a current-thread Tokio runtime, wraps it with a
/// `LocalSet` so non-`Send` loader futures can be spawned, and blocks on the body.
///
/// # Arguments
///
/// * `default` (or no argument) - [`RuntimeConfig::default`](../modload_runtime/struct.RuntimeConfig.html).
/// * `responsive` - shorter event interval, polls I/O more eagerly between tasks.
///
/// # Examples
///
/// ```rust,ignore
/// #[modload_runtime::main]
/// async fn main() -> anyhow::Result<()> {
///     Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn main(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    macros::runtime::expand_main(args.into(), input).into()
}

/// Attribute macro for crate-level error enums.
///
/// # Generated Items
///
/// * `#[derive(Debug, thiserror::Error)]` unless already derived.
/// * `<ErrorName>Ext` trait with `.context(..)` for `Result<T, ErrorName>` and for
///   `Result<T, Source>` of every source-carrying variant.
/// * `From<Source>` for every variant with a `source` field (or a `#[source]`/`#[from]` field).
/// * `From<&'static str>` and `From<String>` when an `Internal { message, context }` variant exists.
/// * A private `format_context` helper for use inside `#[error(..)]` strings.
///
/// # Requirements
///
/// Every variant uses named fields. A variant with a source must also carry
/// `context: Option<Cow<'static, str>>`.
///
/// # Example
///
/// ```rust,ignore
/// use std::borrow::Cow;
///
/// #[modload_derive::loader_error]
/// pub enum TransportError {
///     #[error("I/O failure{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal transport error{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn read(path: &std::path::Path) -> Result<Vec<u8>, TransportError> {
///     std::fs::read(path).context("Reading module manifest")
/// }
/// ```
#[proc_macro_attribute]
pub fn loader_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand(input).into()
}
