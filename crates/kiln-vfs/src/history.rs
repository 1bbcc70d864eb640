//! Undo stack of VFS snapshots.

use crate::store::Snapshot;

/// A list of snapshots with a cursor.
///
/// Index 0 is always the state the workspace was loaded with. Pushing after
/// an undo discards everything past the cursor; there is no redo.
#[derive(Debug, Clone)]
pub struct SnapshotHistory {
    entries: Vec<Snapshot>,
    cursor: usize,
}

impl SnapshotHistory {
    /// Start a history whose only entry is `initial`.
    pub fn new(initial: Snapshot) -> Self {
        Self {
            entries: vec![initial],
            cursor: 0,
        }
    }

    /// Drop all entries and start over from `initial`.
    pub fn reset(&mut self, initial: Snapshot) {
        self.entries.clear();
        self.entries.push(initial);
        self.cursor = 0;
    }

    /// Record a snapshot, truncating any forward entries first.
    pub fn push(&mut self, snapshot: Snapshot) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(snapshot);
        self.cursor = self.entries.len() - 1;
    }

    /// Step back one entry and return it. `None` at the initial state.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    /// The snapshot under the cursor.
    pub fn current(&self) -> &Snapshot {
        &self.entries[self.cursor]
    }

    /// The initial (index 0) snapshot.
    pub fn initial(&self) -> &Snapshot {
        &self.entries[0]
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: a history holds at least its initial entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SnapshotHistory {
    fn default() -> Self {
        Self::new(Snapshot::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Vfs;

    fn snap(content: &str) -> Snapshot {
        Vfs::from_files([("/f.txt", content)]).unwrap().snapshot()
    }

    #[test]
    fn test_undo_at_initial_is_none() {
        let mut history = SnapshotHistory::new(snap("0"));
        assert!(history.undo().is_none());
        assert_eq!(history.cursor(), 0);
    }

    #[test]
    fn test_push_and_undo() {
        let mut history = SnapshotHistory::new(snap("0"));
        history.push(snap("1"));
        history.push(snap("2"));
        assert_eq!(history.len(), 3);
        assert_eq!(history.current().get("/f.txt"), Some("2"));

        assert_eq!(history.undo().unwrap().get("/f.txt"), Some("1"));
        assert_eq!(history.undo().unwrap().get("/f.txt"), Some("0"));
        assert!(history.undo().is_none());
    }

    #[test]
    fn test_push_after_undo_truncates() {
        let mut history = SnapshotHistory::new(snap("0"));
        history.push(snap("1"));
        history.push(snap("2"));
        history.undo();
        history.undo();

        history.push(snap("3"));
        assert_eq!(history.len(), 2);
        assert_eq!(history.cursor(), 1);
        assert_eq!(history.current().get("/f.txt"), Some("3"));
        assert_eq!(history.initial().get("/f.txt"), Some("0"));
    }

    #[test]
    fn test_reset() {
        let mut history = SnapshotHistory::new(snap("0"));
        history.push(snap("1"));
        history.reset(snap("loaded"));
        assert_eq!(history.len(), 1);
        assert!(!history.can_undo());
        assert_eq!(history.current().get("/f.txt"), Some("loaded"));
    }
}
