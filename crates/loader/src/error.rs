use std::borrow::Cow;

/// Errors surfaced by the [`Loader`](crate::Loader) API.
///
/// A failed fetch never aborts the loader: it is recorded and the affected
/// modules simply stay unresolved.
#[modload_derive::loader_error]
pub enum LoaderError {
    /// A transport reported that a module could not be fetched.
    #[error("Failed to fetch module{}: {message}", format_context(.context))]
    FetchFailed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// `bootstrap` was called a second time on the same loader.
    #[error("Loader already bootstrapped{}: {message}", format_context(.context))]
    AlreadyBootstrapped { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The loader was dropped or went idle before the awaited modules executed.
    #[error("Dependencies never became ready{}: {message}", format_context(.context))]
    Unresolved { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal loader error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

pub type Result<T> = std::result::Result<T, LoaderError>;
