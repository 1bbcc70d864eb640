//! Batched file mutations, as emitted by the terminal simulator.
//!
//! A batch is applied action by action. A malformed action is rejected on
//! its own and recorded in the [`ApplyReport`]; the rest still apply.

use serde::{Deserialize, Serialize};

use crate::error::VfsError;
use crate::store::Vfs;

/// Kind of mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

/// One mutation: `{"action": "create", "path": "/a.js", "content": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemChange {
    pub action: ChangeAction,
    pub path: String,
    /// Only meaningful for create/update; a missing value writes an empty file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl FileSystemChange {
    pub fn create(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            action: ChangeAction::Create,
            path: path.into(),
            content: Some(content.into()),
        }
    }

    pub fn update(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            action: ChangeAction::Update,
            path: path.into(),
            content: Some(content.into()),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            action: ChangeAction::Delete,
            path: path.into(),
            content: None,
        }
    }

    /// Apply this single change to `vfs`.
    pub fn apply_to(&self, vfs: &mut Vfs) -> Result<String, VfsError> {
        match self.action {
            ChangeAction::Create | ChangeAction::Update => {
                vfs.set(&self.path, self.content.clone().unwrap_or_default())
            }
            ChangeAction::Delete => {
                let path = crate::path::normalize(&self.path)?;
                vfs.delete(&path)?;
                Ok(path)
            }
        }
    }
}

/// A change that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedChange {
    /// Position in the batch.
    pub index: usize,
    pub change: FileSystemChange,
    pub error: VfsError,
}

/// Outcome of applying a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Normalized paths that were written or deleted, in batch order.
    pub applied: Vec<String>,
    pub rejected: Vec<RejectedChange>,
}

impl ApplyReport {
    /// True if at least one action changed the VFS.
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Apply a batch to `vfs`. Not all-or-nothing.
pub fn apply_batch(vfs: &mut Vfs, batch: &[FileSystemChange]) -> ApplyReport {
    let mut report = ApplyReport::default();
    for (index, change) in batch.iter().enumerate() {
        match change.apply_to(vfs) {
            Ok(path) => report.applied.push(path),
            Err(error) => {
                tracing::warn!(index, path = %change.path, %error, "rejected file system change");
                report.rejected.push(RejectedChange {
                    index,
                    change: change.clone(),
                    error,
                });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_terminal_json() {
        let json = r#"[
            {"action": "create", "path": "/new-dir/.placeholder", "content": ""},
            {"action": "update", "path": "/index.html", "content": "<p>x</p>"},
            {"action": "delete", "path": "/old.js"}
        ]"#;
        let batch: Vec<FileSystemChange> = serde_json::from_str(json).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[2], FileSystemChange::delete("/old.js"));
    }

    #[test]
    fn test_apply_batch() {
        let mut vfs = Vfs::from_files([("/old.js", "x"), ("/index.html", "")]).unwrap();
        let report = apply_batch(
            &mut vfs,
            &[
                FileSystemChange::create("/app.js", "1"),
                FileSystemChange::update("index.html", "<p/>"),
                FileSystemChange::delete("/old.js"),
            ],
        );
        assert!(report.is_clean());
        assert_eq!(report.applied, vec!["/app.js", "/index.html", "/old.js"]);
        assert_eq!(vfs.get("/app.js"), Some("1"));
        assert_eq!(vfs.get("/index.html"), Some("<p/>"));
        assert!(!vfs.contains("/old.js"));
    }

    #[test]
    fn test_partial_apply() {
        let mut vfs = Vfs::new();
        let report = apply_batch(
            &mut vfs,
            &[
                FileSystemChange::create("/", "bad root"),
                FileSystemChange::create("/good.txt", "ok"),
                FileSystemChange::delete("/missing.txt"),
            ],
        );
        assert_eq!(report.applied, vec!["/good.txt"]);
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].index, 0);
        assert!(matches!(report.rejected[1].error, VfsError::NotFound(_)));
        assert_eq!(vfs.get("/good.txt"), Some("ok"));
    }

    #[test]
    fn test_file_directory_clash_rejected_individually() {
        let mut vfs = Vfs::from_files([("/docs", "file")]).unwrap();
        let report = apply_batch(
            &mut vfs,
            &[
                FileSystemChange::create("/docs/a.md", "x"),
                FileSystemChange::create("/notes/a.md", "y"),
            ],
        );
        assert_eq!(report.applied, vec!["/notes/a.md"]);
        assert_eq!(report.rejected.len(), 1);
        assert!(matches!(report.rejected[0].error, VfsError::InvalidPath { .. }));
        assert_eq!(vfs.get("/docs"), Some("file"));
    }

    #[test]
    fn test_create_without_content_is_empty_file() {
        let mut vfs = Vfs::new();
        let change: FileSystemChange =
            serde_json::from_str(r#"{"action": "create", "path": "/empty.txt"}"#).unwrap();
        change.apply_to(&mut vfs).unwrap();
        assert_eq!(vfs.get("/empty.txt"), Some(""));
    }
}
