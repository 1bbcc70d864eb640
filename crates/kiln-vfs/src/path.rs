//! VFS path normalization.
//!
//! VFS paths are virtual: always `/`-separated regardless of host platform,
//! absolute, and without a trailing slash. Directories are implicit.

use crate::error::VfsError;

/// File name of the sentinel that keeps an otherwise empty directory alive.
pub const PLACEHOLDER_NAME: &str = ".placeholder";

/// Normalize a path: ensure a leading `/`, collapse separators, resolve `.` and `..`.
///
/// `..` never climbs above the root. Paths that resolve to the root itself
/// or that contain NUL are rejected, since the root is not a file.
pub fn normalize(path: &str) -> Result<String, VfsError> {
    let segments = resolve(path)?;
    if segments.is_empty() {
        return Err(VfsError::InvalidPath {
            path: path.to_string(),
            reason: "resolves to the root directory",
        });
    }
    Ok(join(&segments))
}

/// Normalize a directory path. Unlike [`normalize`], the root is allowed and
/// comes back as `/`.
pub fn normalize_dir(path: &str) -> Result<String, VfsError> {
    let segments = resolve(path)?;
    if segments.is_empty() {
        return Ok("/".to_string());
    }
    Ok(join(&segments))
}

fn resolve(path: &str) -> Result<Vec<&str>, VfsError> {
    if path.contains('\0') {
        return Err(VfsError::InvalidPath {
            path: path.escape_default().to_string(),
            reason: "contains NUL",
        });
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    Ok(segments)
}

fn join(segments: &[&str]) -> String {
    let mut joined = String::new();
    for segment in segments {
        joined.push('/');
        joined.push_str(segment);
    }
    joined
}

/// True if `path` names a placeholder sentinel.
pub fn is_placeholder(path: &str) -> bool {
    path.rsplit('/').next() == Some(PLACEHOLDER_NAME)
}

/// Placeholder path for a (normalized) directory.
pub(crate) fn placeholder_for(dir: &str) -> String {
    if dir == "/" {
        format!("/{PLACEHOLDER_NAME}")
    } else {
        format!("{dir}/{PLACEHOLDER_NAME}")
    }
}

/// Path relative to the repository root, as git trees spell it (`src/app.js`).
pub fn relative(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Segments of a normalized path, without the leading empty one.
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::already_normal("/a/b.txt", "/a/b.txt")]
    #[case::relative("a/b.txt", "/a/b.txt")]
    #[case::double_slash("//a//b.txt", "/a/b.txt")]
    #[case::trailing_slash("/a/b/", "/a/b")]
    #[case::dot("/a/./b.txt", "/a/b.txt")]
    #[case::dot_dot("/a/x/../b.txt", "/a/b.txt")]
    #[case::dot_dot_past_root("/../../a.txt", "/a.txt")]
    fn normalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize(input).unwrap(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::root("/")]
    #[case::only_dots("/./..")]
    #[case::nul("/a\0b")]
    fn rejects(#[case] input: &str) {
        assert!(matches!(normalize(input), Err(VfsError::InvalidPath { .. })));
    }

    #[test]
    fn normalize_dir_allows_root() {
        assert_eq!(normalize_dir("/").unwrap(), "/");
        assert_eq!(normalize_dir("src/").unwrap(), "/src");
    }

    #[test]
    fn placeholder_detection() {
        assert!(is_placeholder("/templates/.placeholder"));
        assert!(is_placeholder("/.placeholder"));
        assert!(!is_placeholder("/templates/placeholder"));
        assert!(!is_placeholder("/.placeholder/readme.md"));
    }

    #[test]
    fn placeholder_paths() {
        assert_eq!(placeholder_for("/"), "/.placeholder");
        assert_eq!(placeholder_for("/a/b"), "/a/b/.placeholder");
    }

    #[test]
    fn relative_strips_leading_slash() {
        assert_eq!(relative("/src/app.js"), "src/app.js");
    }
}
