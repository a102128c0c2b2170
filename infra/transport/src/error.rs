use std::borrow::Cow;

/// A specialized [`TransportError`] enum of this crate.
#[modload_derive::loader_error]
pub enum TransportError {
    #[error("Module source not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Path traversal security violation{}: {message}", format_context(.context))]
    PathTraversal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Malformed manifest{}: {source}", format_context(.context))]
    Manifest { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[error("Definition rejected{}: {source}", format_context(.context))]
    Define { source: modload::LoaderError, context: Option<Cow<'static, str>> },

    #[error("Internal transport error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
