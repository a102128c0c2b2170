use modload_derive::loader_error;
use std::borrow::Cow;

#[loader_error]
pub enum FetchError {
    #[error("Read failure{}: {source}", format_context(.context))]
    Read {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Module not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn open() -> Result<(), FetchError> {
    Err(std::io::Error::other("boom")).context("opening manifest")
}

fn main() {
    let err = open().unwrap_err();
    assert_eq!(err.to_string(), "Read failure (opening manifest): boom");

    let err: FetchError = "unexpected".into();
    assert!(matches!(err, FetchError::Internal { .. }));

    let err = Err::<(), _>(FetchError::NotFound { message: "a".into(), context: None })
        .context("resolving b")
        .unwrap_err();
    assert_eq!(err.to_string(), "Module not found (resolving b): a");
}
