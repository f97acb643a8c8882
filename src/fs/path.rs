use crate::fs::error::{FsError, FsResult};

/// Lexically normalize a path: collapse repeated separators, resolve `.`
/// and `..` segments without touching the filesystem, and drop trailing
/// separators (except on the root itself).
///
/// A `..` that would climb past the root of an absolute path is rejected.
pub fn normalize(path: &str) -> FsResult<String> {
    if path.is_empty() {
        return Err(FsError::InvalidPath("empty path".to_string()));
    }

    if path.contains('\0') {
        return Err(FsError::InvalidPath("path contains NUL".to_string()));
    }

    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|s| *s != "..") {
                    parts.pop();
                } else if absolute {
                    return Err(FsError::InvalidPath(format!("{path}: escapes the root")));
                } else {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let normalized = if absolute {
        if parts.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", parts.join("/"))
        }
    } else if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    };

    Ok(normalized)
}

/// Whether the normalized form of `path` starts at the root.
pub fn is_absolute(path: &str) -> bool {
    normalize(path).map(|p| p.starts_with('/')).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_root() {
        assert_eq!(normalize("/").unwrap(), "/");
        assert_eq!(normalize("///").unwrap(), "/");
    }

    #[test]
    fn test_normalize_plain() {
        assert_eq!(normalize("/data").unwrap(), "/data");
        assert_eq!(normalize("/data/files").unwrap(), "/data/files");
    }

    #[test]
    fn test_normalize_trailing_slash() {
        assert_eq!(normalize("/data/").unwrap(), "/data");
        assert_eq!(normalize("/data/files///").unwrap(), "/data/files");
    }

    #[test]
    fn test_normalize_repeated_slashes() {
        assert_eq!(normalize("//data//files").unwrap(), "/data/files");
    }

    #[test]
    fn test_normalize_dot_segments() {
        assert_eq!(normalize("/data/./files").unwrap(), "/data/files");
        assert_eq!(normalize("/data/sub/../files").unwrap(), "/data/files");
        assert_eq!(normalize("/a/b/c/../../d").unwrap(), "/a/d");
    }

    #[test]
    fn test_normalize_rejects_root_escape() {
        assert!(normalize("/..").is_err());
        assert!(normalize("/../data").is_err());
        assert!(normalize("/data/../..").is_err());
    }

    #[test]
    fn test_normalize_relative() {
        assert_eq!(normalize("data/files").unwrap(), "data/files");
        assert_eq!(normalize("./data").unwrap(), "data");
        assert_eq!(normalize("..").unwrap(), "..");
        assert_eq!(normalize("../data").unwrap(), "../data");
        assert_eq!(normalize(".").unwrap(), ".");
    }

    #[test]
    fn test_normalize_rejects_empty_and_nul() {
        assert!(normalize("").is_err());
        assert!(normalize("/da\0ta").is_err());
    }

    #[test]
    fn test_is_absolute() {
        assert!(is_absolute("/"));
        assert!(is_absolute("/data"));
        assert!(is_absolute("//data/../files"));
        assert!(!is_absolute("data"));
        assert!(!is_absolute("./data"));
        assert!(!is_absolute(""));
        assert!(!is_absolute("/.."));
    }
}
