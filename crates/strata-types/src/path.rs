//! Canonical archive paths.
//!
//! Paths are `/`-separated strings rooted at [`ROOT`]. A normalized path has
//! no repeated slashes and no trailing slash (except the root itself).

/// The root path.
pub const ROOT: &str = "/";

/// Returns `true` if `path` is the root.
pub fn is_root(path: &str) -> bool {
    path == ROOT
}

/// Join a container path and a child name.
///
/// The root container does not get an extra separator: `merge("/", "a")`
/// is `"/a"`, `merge("/a", "b")` is `"/a/b"`.
pub fn merge(container: &str, name: &str) -> String {
    if is_root(container) {
        format!("/{name}")
    } else {
        format!("{container}/{name}")
    }
}

/// Split a path into `(container, name)`.
///
/// `split("/")` returns `("/", "")`; a relative name with no separator is
/// treated as a child of the root.
pub fn split(path: &str) -> (String, String) {
    let path = normalize(path);
    if is_root(&path) {
        return (ROOT.to_string(), String::new());
    }
    match path.rfind('/') {
        Some(0) => (ROOT.to_string(), path[1..].to_string()),
        Some(idx) => (path[..idx].to_string(), path[idx + 1..].to_string()),
        None => (ROOT.to_string(), path),
    }
}

/// Collapse repeated slashes, drop trailing slashes and guarantee a leading
/// slash.
pub fn normalize(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        ROOT.to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_under_root_has_single_slash() {
        assert_eq!(merge("/", "a"), "/a");
        assert_eq!(merge("/a", "b"), "/a/b");
    }

    #[test]
    fn split_paths() {
        assert_eq!(split("/"), ("/".to_string(), String::new()));
        assert_eq!(split("/a"), ("/".to_string(), "a".to_string()));
        assert_eq!(split("/a/f.txt"), ("/a".to_string(), "f.txt".to_string()));
        assert_eq!(split("f.txt"), ("/".to_string(), "f.txt".to_string()));
    }

    #[test]
    fn split_then_merge_is_identity() {
        for path in ["/a", "/a/b", "/x/y/z.bin"] {
            let (container, name) = split(path);
            assert_eq!(merge(&container, &name), path);
        }
    }

    #[test]
    fn normalize_collapses_slashes() {
        assert_eq!(normalize("//a///b/"), "/a/b");
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("///"), "/");
        assert_eq!(normalize("a/b"), "/a/b");
    }
}
