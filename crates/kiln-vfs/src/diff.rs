//! Change set of the VFS against a baseline.
//!
//! Diffing is explicit and pull-based: callers invoke [`compute_diff`] when
//! they need a change set. Nothing here caches or watches.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use similar::TextDiff;

use crate::path::is_placeholder;
use crate::store::FileMap;

/// How a path differs from the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    /// In the VFS, not in the baseline.
    Added,
    /// In both, with different content.
    Modified,
    /// In the baseline, not in the VFS.
    Deleted,
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeStatus::Added => "added",
            ChangeStatus::Modified => "modified",
            ChangeStatus::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// One changed path. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub path: String,
    pub status: ChangeStatus,
}

impl ChangeRecord {
    pub fn new(path: impl Into<String>, status: ChangeStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }

    /// True for records whose content must be uploaded (added or modified).
    pub fn needs_upload(&self) -> bool {
        matches!(self.status, ChangeStatus::Added | ChangeStatus::Modified)
    }
}

/// Compare `current` against `baseline`.
///
/// Walks both ordered key sets once (a merge join), so the cost is linear in
/// the total number of paths. Placeholders are skipped. Records come out in
/// path order.
pub fn compute_diff(current: &FileMap, baseline: &FileMap) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();
    let mut cur = current.iter().peekable();
    let mut base = baseline.iter().peekable();

    loop {
        let (path, status) = match (cur.peek(), base.peek()) {
            (None, None) => break,
            (Some((path, _)), None) => {
                let path = *path;
                cur.next();
                (path, Some(ChangeStatus::Added))
            }
            (None, Some((path, _))) => {
                let path = *path;
                base.next();
                (path, Some(ChangeStatus::Deleted))
            }
            (Some((cur_path, cur_content)), Some((base_path, base_content))) => {
                match cur_path.cmp(base_path) {
                    Ordering::Less => {
                        let path = *cur_path;
                        cur.next();
                        (path, Some(ChangeStatus::Added))
                    }
                    Ordering::Greater => {
                        let path = *base_path;
                        base.next();
                        (path, Some(ChangeStatus::Deleted))
                    }
                    Ordering::Equal => {
                        let path = *cur_path;
                        let status = (cur_content != base_content).then_some(ChangeStatus::Modified);
                        cur.next();
                        base.next();
                        (path, status)
                    }
                }
            }
        };

        if let Some(status) = status {
            if !is_placeholder(path) {
                changes.push(ChangeRecord::new(path.clone(), status));
            }
        }
    }

    changes
}

/// Render a unified diff of one file for display.
///
/// Missing sides are treated as empty, so added and deleted files render
/// as all-insert and all-delete hunks.
pub fn render_patch(path: &str, old: Option<&str>, new: Option<&str>) -> String {
    let old = old.unwrap_or("");
    let new = new.unwrap_or("");
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a{path}"), &format!("b{path}"))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> FileMap {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_identical_maps_have_no_changes() {
        let m = map(&[("/a.txt", "a"), ("/b.txt", "b")]);
        assert!(compute_diff(&m, &m).is_empty());
    }

    #[test]
    fn test_deletion_detection() {
        let vfs = map(&[("/a.txt", "hi")]);
        let baseline = map(&[("/a.txt", "hi"), ("/b.txt", "bye")]);
        assert_eq!(
            compute_diff(&vfs, &baseline),
            vec![ChangeRecord::new("/b.txt", ChangeStatus::Deleted)]
        );
    }

    #[test]
    fn test_added_against_empty_baseline() {
        let vfs = map(&[("/c.txt", "new")]);
        assert_eq!(
            compute_diff(&vfs, &FileMap::new()),
            vec![ChangeRecord::new("/c.txt", ChangeStatus::Added)]
        );
    }

    #[test]
    fn test_mixed_changes_are_ordered_by_path() {
        let vfs = map(&[("/a.txt", "A"), ("/c.txt", "c"), ("/d.txt", "d")]);
        let baseline = map(&[("/a.txt", "a"), ("/b.txt", "b"), ("/c.txt", "c")]);
        assert_eq!(
            compute_diff(&vfs, &baseline),
            vec![
                ChangeRecord::new("/a.txt", ChangeStatus::Modified),
                ChangeRecord::new("/b.txt", ChangeStatus::Deleted),
                ChangeRecord::new("/d.txt", ChangeStatus::Added),
            ]
        );
    }

    #[test]
    fn test_placeholders_are_skipped() {
        let vfs = map(&[("/templates/.placeholder", ""), ("/x.txt", "x")]);
        let baseline = map(&[("/old/.placeholder", ""), ("/x.txt", "x")]);
        assert!(compute_diff(&vfs, &baseline).is_empty());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ChangeStatus::Added.to_string(), "added");
        assert_eq!(ChangeStatus::Deleted.to_string(), "deleted");
    }

    #[test]
    fn test_render_patch_modified() {
        let patch = render_patch("/a.txt", Some("one\ntwo\n"), Some("one\nthree\n"));
        assert!(patch.contains("--- a/a.txt"));
        assert!(patch.contains("+++ b/a.txt"));
        assert!(patch.contains("-two"));
        assert!(patch.contains("+three"));
    }

    #[test]
    fn test_render_patch_added() {
        let patch = render_patch("/new.txt", None, Some("hello\n"));
        assert!(patch.contains("+hello"));
    }
}
