//! The VFS store: a flat, ordered map from absolute path to text content.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::error::VfsError;
use crate::path::{self, normalize, normalize_dir, placeholder_for};

/// Ordered path → content map. Shared representation of VFS, snapshots and baselines.
pub type FileMap = BTreeMap<String, String>;

/// In-memory virtual file system.
///
/// Keys are normalized absolute paths; directories exist only implicitly,
/// or through a `.placeholder` sentinel when empty. There is no internal
/// locking: a `Vfs` has exactly one owner and changes are observed the next
/// time someone diffs it.
///
/// A path is either a file or a directory, never both: writing `/docs` while
/// `/docs/a.md` exists (or the reverse) is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Vfs {
    files: FileMap,
}

impl Vfs {
    /// Create an empty VFS.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a VFS from arbitrary `(path, content)` pairs, normalizing every path.
    pub fn from_files<I, P, C>(files: I) -> Result<Self, VfsError>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        let mut vfs = Self::new();
        for (path, content) in files {
            vfs.set(path.as_ref(), content)?;
        }
        Ok(vfs)
    }

    /// Read a file. Returns `None` if it doesn't exist or the path is invalid.
    pub fn get(&self, path: &str) -> Option<&str> {
        let normalized = normalize(path).ok()?;
        self.files.get(&normalized).map(String::as_str)
    }

    /// Read a file, reporting a missing path as an error.
    pub fn read(&self, path: &str) -> Result<&str, VfsError> {
        let normalized = normalize(path)?;
        self.files
            .get(&normalized)
            .map(String::as_str)
            .ok_or(VfsError::NotFound(normalized))
    }

    /// Create or overwrite a file. Returns the normalized path it was stored under.
    pub fn set(&mut self, path: &str, content: impl Into<String>) -> Result<String, VfsError> {
        let normalized = normalize(path)?;
        check_shape(&self.files, &normalized)?;
        self.files.insert(normalized.clone(), content.into());
        Ok(normalized)
    }

    /// Delete a file, returning its former content.
    pub fn delete(&mut self, path: &str) -> Result<String, VfsError> {
        let normalized = normalize(path)?;
        self.files
            .remove(&normalized)
            .ok_or(VfsError::NotFound(normalized))
    }

    /// All paths, sorted. Includes placeholders.
    pub fn list(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    /// Paths under a directory (recursively), sorted. Includes placeholders.
    pub fn list_dir(&self, dir: &str) -> Result<Vec<String>, VfsError> {
        let dir = normalize_dir(dir)?;
        let prefix = if dir == "/" { dir } else { format!("{dir}/") };
        Ok(self
            .files
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    /// Create an empty directory by writing its placeholder.
    ///
    /// Returns the placeholder path.
    pub fn create_dir(&mut self, dir: &str) -> Result<String, VfsError> {
        let dir = normalize_dir(dir)?;
        let placeholder = placeholder_for(&dir);
        check_shape(&self.files, &placeholder)?;
        self.files.entry(placeholder.clone()).or_default();
        Ok(placeholder)
    }

    /// Merge many files at once, overwriting existing paths.
    ///
    /// Validation happens up front, so an invalid path leaves the VFS untouched.
    pub fn import<I, P, C>(&mut self, files: I) -> Result<Vec<String>, VfsError>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        let mut staged = self.files.clone();
        let mut written = Vec::new();
        for (path, content) in files {
            let path = normalize(path.as_ref())?;
            check_shape(&staged, &path)?;
            staged.insert(path.clone(), content.into());
            written.push(path);
        }
        self.files = staged;
        Ok(written)
    }

    /// Check if a file exists.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Number of entries, placeholders included.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate `(path, content)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate real files, skipping placeholders.
    pub fn files_only(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(k, _)| !path::is_placeholder(k))
    }

    /// Borrow the underlying map.
    pub fn files(&self) -> &FileMap {
        &self.files
    }

    /// Take an immutable deep copy.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            files: Arc::new(self.files.clone()),
        }
    }

    /// Rebuild a live VFS from a snapshot. The result never aliases the snapshot.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            files: (*snapshot.files).clone(),
        }
    }

}

/// Reject `path` if one of its parents is a file or if it is already a directory.
fn check_shape(files: &FileMap, path: &str) -> Result<(), VfsError> {
    let mut parent = String::new();
    let mut parts = path::segments(path).peekable();
    while let Some(segment) = parts.next() {
        if parts.peek().is_none() {
            break;
        }
        parent.push('/');
        parent.push_str(segment);
        if files.contains_key(&parent) {
            return Err(VfsError::InvalidPath {
                path: path.to_string(),
                reason: "a parent directory is a file",
            });
        }
    }

    let prefix = format!("{path}/");
    let is_dir = files
        .range(prefix.clone()..)
        .next()
        .is_some_and(|(k, _)| k.starts_with(&prefix));
    if is_dir {
        return Err(VfsError::InvalidPath {
            path: path.to_string(),
            reason: "is a directory",
        });
    }
    Ok(())
}

/// Immutable copy of a VFS at one instant.
///
/// Clones are cheap and share the frozen map; nothing can mutate it after
/// creation, so sharing is safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    files: Arc<FileMap>,
}

impl Snapshot {
    /// An empty snapshot.
    pub fn empty() -> Self {
        Self {
            files: Arc::new(FileMap::new()),
        }
    }

    pub fn files(&self) -> &FileMap {
        &self.files
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl From<Vfs> for Snapshot {
    fn from(vfs: Vfs) -> Self {
        Self {
            files: Arc::new(vfs.files),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut vfs = Vfs::new();
        vfs.set("/index.html", "<h1>hi</h1>").unwrap();
        assert_eq!(vfs.get("/index.html"), Some("<h1>hi</h1>"));
    }

    #[test]
    fn test_get_not_found() {
        let vfs = Vfs::new();
        assert_eq!(vfs.get("/nope.txt"), None);
        assert_eq!(
            vfs.read("/nope.txt"),
            Err(VfsError::NotFound("/nope.txt".to_string()))
        );
    }

    #[test]
    fn test_path_normalization() {
        let mut vfs = Vfs::new();
        vfs.set("a/b/c.txt", "data").unwrap();

        assert_eq!(vfs.get("/a/b/c.txt"), Some("data"));
        assert_eq!(vfs.get("a/./b/c.txt"), Some("data"));
        assert_eq!(vfs.get("/a/b/../b/c.txt"), Some("data"));
        assert_eq!(vfs.list(), vec!["/a/b/c.txt"]);
    }

    #[test]
    fn test_overwrite_file() {
        let mut vfs = Vfs::new();
        vfs.set("/file.txt", "first").unwrap();
        vfs.set("/file.txt", "second").unwrap();
        assert_eq!(vfs.get("/file.txt"), Some("second"));
        assert_eq!(vfs.len(), 1);
    }

    #[test]
    fn test_delete() {
        let mut vfs = Vfs::new();
        vfs.set("/file.txt", "data").unwrap();
        assert_eq!(vfs.delete("/file.txt").unwrap(), "data");
        assert!(!vfs.contains("/file.txt"));
        assert!(matches!(vfs.delete("/file.txt"), Err(VfsError::NotFound(_))));
    }

    #[test]
    fn test_set_root_rejected() {
        let mut vfs = Vfs::new();
        assert!(matches!(vfs.set("/", "x"), Err(VfsError::InvalidPath { .. })));
        assert!(vfs.is_empty());
    }

    #[test]
    fn test_list_is_sorted() {
        let mut vfs = Vfs::new();
        vfs.set("/b.txt", "").unwrap();
        vfs.set("/a/z.txt", "").unwrap();
        vfs.set("/a.txt", "").unwrap();
        assert_eq!(vfs.list(), vec!["/a.txt", "/a/z.txt", "/b.txt"]);
    }

    #[test]
    fn test_list_dir() {
        let mut vfs = Vfs::new();
        vfs.set("/src/a.js", "").unwrap();
        vfs.set("/src/lib/b.js", "").unwrap();
        vfs.set("/srcfile.js", "").unwrap();
        vfs.set("/other.js", "").unwrap();

        assert_eq!(vfs.list_dir("/src").unwrap(), vec!["/src/a.js", "/src/lib/b.js"]);
        assert_eq!(vfs.list_dir("/").unwrap().len(), 4);
    }

    #[test]
    fn test_create_dir_writes_placeholder() {
        let mut vfs = Vfs::new();
        let placeholder = vfs.create_dir("/templates/").unwrap();
        assert_eq!(placeholder, "/templates/.placeholder");
        assert_eq!(vfs.get("/templates/.placeholder"), Some(""));
        assert_eq!(vfs.files_only().count(), 0);
    }

    #[test]
    fn test_import_is_validated_up_front() {
        let mut vfs = Vfs::new();
        let err = vfs.import([("/ok.txt", "1"), ("/", "2")]);
        assert!(err.is_err());
        assert!(vfs.is_empty());

        let written = vfs.import([("a.txt", "1"), ("/b/c.txt", "2")]).unwrap();
        assert_eq!(written, vec!["/a.txt", "/b/c.txt"]);
    }

    #[test]
    fn test_file_under_file_rejected() {
        let mut vfs = Vfs::new();
        vfs.set("/docs", "file").unwrap();
        assert!(matches!(
            vfs.set("/docs/a.md", "x"),
            Err(VfsError::InvalidPath { reason: "a parent directory is a file", .. })
        ));
        assert!(vfs.create_dir("/docs").is_err());
        assert!(vfs.create_dir("/docs/sub").is_err());
        assert_eq!(vfs.list(), vec!["/docs"]);
    }

    #[test]
    fn test_file_over_directory_rejected() {
        let mut vfs = Vfs::new();
        vfs.set("/docs/a.md", "x").unwrap();
        vfs.create_dir("/templates").unwrap();
        assert!(matches!(
            vfs.set("/docs", "file"),
            Err(VfsError::InvalidPath { reason: "is a directory", .. })
        ));
        assert!(vfs.set("/templates", "file").is_err());
        // Siblings sharing a prefix are unrelated.
        vfs.set("/docs.md", "ok").unwrap();
        vfs.set("/docs/b.md", "ok").unwrap();
    }

    #[test]
    fn test_import_rejects_conflicts_within_batch() {
        let mut vfs = Vfs::new();
        assert!(vfs.import([("/docs", "file"), ("/docs/a.md", "x")]).is_err());
        assert!(vfs.is_empty());
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut vfs = Vfs::new();
        vfs.set("/a.txt", "one").unwrap();
        let snap = vfs.snapshot();

        vfs.set("/a.txt", "two").unwrap();
        assert_eq!(snap.get("/a.txt"), Some("one"));

        let mut restored = Vfs::from_snapshot(&snap);
        restored.set("/b.txt", "new").unwrap();
        assert_eq!(snap.len(), 1);
    }
}
