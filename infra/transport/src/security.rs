use crate::error::TransportError;
use std::path::{Component, Path, PathBuf};

/// Collapses `.` and `..` lexically without ever climbing above the sandbox root.
pub(crate) fn normalize_relative(path: &Path) -> Result<PathBuf, TransportError> {
    let mut out = PathBuf::new();

    for c in path.components() {
        match c {
            Component::CurDir => {},
            Component::Normal(seg) => out.push(seg),
            Component::ParentDir => {
                if !out.pop() {
                    return Err(TransportError::PathTraversal {
                        message: path.display().to_string().into(),
                        context: Some("Locator attempted to escape the module root via '..'".into()),
                    });
                }
            },
            Component::RootDir | Component::Prefix(_) => {
                return Err(TransportError::PathTraversal {
                    message: path.display().to_string().into(),
                    context: Some("Absolute locators are not allowed".into()),
                });
            },
        }
    }

    if out.as_os_str().is_empty() {
        return Err(TransportError::NotFound {
            message: path.display().to_string().into(),
            context: Some("Locator does not name a file".into()),
        });
    }

    Ok(out)
}

/// Rejects a canonical path that resolved outside `root`, e.g. through a symlink.
pub(crate) fn ensure_within(root: &Path, canonical: PathBuf) -> Result<PathBuf, TransportError> {
    if canonical.starts_with(root) {
        Ok(canonical)
    } else {
        Err(TransportError::PathTraversal {
            message: canonical.display().to_string().into(),
            context: Some("Resolved outside the module root".into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_inner_segments() {
        let path = normalize_relative(Path::new("app/./lib/../main.json")).unwrap();
        assert_eq!(path, PathBuf::from("app/main.json"));
    }

    #[test]
    fn test_normalize_rejects_escape_and_absolute() {
        assert!(matches!(
            normalize_relative(Path::new("../secret.json")),
            Err(TransportError::PathTraversal { .. })
        ));
        assert!(matches!(
            normalize_relative(Path::new("/etc/passwd")),
            Err(TransportError::PathTraversal { .. })
        ));
        assert!(matches!(normalize_relative(Path::new("a/..")), Err(TransportError::NotFound { .. })));
    }

    #[test]
    fn test_ensure_within() {
        let root = Path::new("/srv/modules");
        assert!(ensure_within(root, PathBuf::from("/srv/modules/a.json")).is_ok());
        assert!(ensure_within(root, PathBuf::from("/srv/other/a.json")).is_err());
    }
}
