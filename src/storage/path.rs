//! Storage key normalization.
//!
//! Keys are `/`-separated, relative to the store root, and may never escape
//! it. Every backend runs incoming keys through [`normalize`] before touching
//! anything, so `a//b/./c` and `a/b/c` address the same object.

use super::StorageError;

/// Normalize a storage key.
///
/// - `.` and empty segments are dropped (`a//./b` → `a/b`)
/// - `..` pops the previous segment; popping past the root is rejected
/// - NUL bytes and keys that normalize to nothing are rejected
///
/// ```
/// use gallery_index::storage::normalize_key;
/// assert_eq!(normalize_key("galleries//trips/./a.jpg").unwrap(), "galleries/trips/a.jpg");
/// assert_eq!(normalize_key("a/b/../c").unwrap(), "a/c");
/// assert!(normalize_key("../etc/passwd").is_err());
/// assert!(normalize_key("").is_err());
/// ```
pub fn normalize(key: &str) -> Result<String, StorageError> {
    if key.contains('\0') {
        return Err(StorageError::InvalidPath(key.to_string()));
    }
    let mut segments: Vec<&str> = Vec::new();
    for segment in key.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(StorageError::InvalidPath(key.to_string()));
                }
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return Err(StorageError::InvalidPath(key.to_string()));
    }
    Ok(segments.join("/"))
}

/// Normalize a listing prefix. Unlike keys, an empty prefix is valid and
/// means "everything".
pub fn normalize_prefix(prefix: &str) -> Result<String, StorageError> {
    if prefix.trim_matches('/').is_empty() {
        return Ok(String::new());
    }
    normalize(prefix)
}

/// True if `key` lies under `prefix` on a segment boundary.
///
/// `galleries/a` contains `galleries/a/x.jpg` but not `galleries/ab/x.jpg`.
pub fn is_under(key: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    key == prefix
        || (key.len() > prefix.len()
            && key.starts_with(prefix)
            && key.as_bytes()[prefix.len()] == b'/')
}

/// Parent "directory" of a key, or `""` for top-level keys.
pub fn parent(key: &str) -> &str {
    key.rfind('/').map(|pos| &key[..pos]).unwrap_or("")
}

/// Last segment of a key.
pub fn file_name(key: &str) -> &str {
    key.rfind('/').map(|pos| &key[pos + 1..]).unwrap_or(key)
}

/// Join a directory key and a name without producing doubled slashes.
pub fn join(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_keys_pass_through() {
        assert_eq!(normalize("galleries/a/photo.jpg").unwrap(), "galleries/a/photo.jpg");
        assert_eq!(normalize("single.json").unwrap(), "single.json");
    }

    #[test]
    fn redundant_separators_collapse() {
        assert_eq!(normalize("a//b//c").unwrap(), "a/b/c");
        assert_eq!(normalize("/a/./b/").unwrap(), "a/b");
    }

    #[test]
    fn parent_segments_resolve_inside_root() {
        assert_eq!(normalize("a/b/..").unwrap(), "a");
        assert_eq!(normalize("a/../b").unwrap(), "b");
    }

    #[test]
    fn traversal_is_rejected() {
        assert!(normalize("..").is_err());
        assert!(normalize("a/../../b").is_err());
    }

    #[test]
    fn nul_and_empty_are_rejected() {
        assert!(normalize("a\0b").is_err());
        assert!(normalize("").is_err());
        assert!(normalize("./").is_err());
        assert!(normalize("//").is_err());
    }

    #[test]
    fn empty_prefix_means_everything() {
        assert_eq!(normalize_prefix("").unwrap(), "");
        assert_eq!(normalize_prefix("/").unwrap(), "");
        assert_eq!(normalize_prefix("galleries/").unwrap(), "galleries");
    }

    #[test]
    fn is_under_respects_segment_boundaries() {
        assert!(is_under("galleries/a/x.jpg", "galleries/a"));
        assert!(!is_under("galleries/ab/x.jpg", "galleries/a"));
        assert!(is_under("anything", ""));
    }

    #[test]
    fn parent_and_file_name() {
        assert_eq!(parent("galleries/a/x.jpg"), "galleries/a");
        assert_eq!(parent("x.jpg"), "");
        assert_eq!(file_name("galleries/a/x.jpg"), "x.jpg");
        assert_eq!(join("galleries/a/", "x.jpg"), "galleries/a/x.jpg");
        assert_eq!(join("", "x.jpg"), "x.jpg");
    }
}
