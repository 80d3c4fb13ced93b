use std::fs;
use std::path::{Component, Path, PathBuf};

/// brings a client-supplied logical path into canonical form: forward
/// slashes only, no leading or trailing separators, no relative components.
/// `.` and `..` are dropped rather than resolved; genuine name tokens are
/// base64url and never collide with them. The result is what the entries
/// table stores in `parent_path`
pub fn normalize_path(raw: &str) -> String {
    raw.replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect::<Vec<&str>>()
        .join("/")
}

/// splits a normalized logical path into (parent path, leaf name).
/// The parent is empty for items sitting in the root
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    }
}

/// resolves a physical name against a user's storage root, guaranteeing the
/// result stays inside that root. Physical names are server-generated, so a
/// `None` here means corrupted state rather than a hostile client
pub fn safe_path(base_dir: &str, physical_name: &str) -> Option<PathBuf> {
    let trimmed = physical_name.trim_start_matches(['/', '\\']);
    let base = fs::canonicalize(base_dir).ok()?;
    let mut resolved = base.clone();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            // anything that climbs out of or restarts the tree is unsafe
            _ => return None,
        }
    }
    if resolved.starts_with(&base) {
        Some(resolved)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::create_dir_all;

    #[test]
    fn normalize_strips_separators() {
        assert_eq!("a/b/c", normalize_path("/a/b/c/"));
        assert_eq!("a/b", normalize_path("a\\b"));
        assert_eq!("a/b", normalize_path("a//b"));
        assert_eq!("", normalize_path("/"));
    }

    #[test]
    fn normalize_drops_relative_components() {
        assert_eq!("a/b", normalize_path("a/./b"));
        assert_eq!("a/b", normalize_path("a/../b"));
        assert_eq!("x", normalize_path("../x"));
        assert_eq!("", normalize_path(".."));
    }

    #[test]
    fn split_path_handles_root_items() {
        assert_eq!(("", "a"), split_path("a"));
        assert_eq!(("a/b", "c"), split_path("a/b/c"));
        assert_eq!(("", ""), split_path(""));
    }

    #[test]
    fn safe_path_confines_to_base() {
        let base = format!("./{}_safe_path", crate::test::current_thread_name());
        create_dir_all(&base).unwrap();
        let inside = safe_path(&base, "abc123").unwrap();
        assert!(inside.ends_with("abc123"));
        assert_eq!(None, safe_path(&base, "../escape"));
        assert_eq!(None, safe_path(&base, "a/../../escape"));
        // leading separators are stripped, not treated as an absolute restart
        assert!(safe_path(&base, "/abc123").is_some());
        std::fs::remove_dir_all(&base).unwrap_or(());
    }

    #[test]
    fn safe_path_requires_existing_base() {
        assert_eq!(None, safe_path("./does_not_exist_anywhere", "abc"));
    }
}
