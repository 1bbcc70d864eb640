//! The workspace: single owner of VFS, undo history and baseline.

use crate::diff::{ChangeRecord, compute_diff};
use crate::error::VfsError;
use crate::history::SnapshotHistory;
use crate::mutation::{ApplyReport, FileSystemChange, apply_batch};
use crate::store::{Snapshot, Vfs};

/// Owns the live VFS together with its undo history and sync baseline.
///
/// Every mutation goes through `&mut self`, so edits from the interactive
/// editor and from the terminal simulator are serialized by ownership and
/// the last write wins. Neither the diff nor the history distinguishes
/// where a change came from.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    vfs: Vfs,
    history: SnapshotHistory,
    /// Last state known to equal the remote branch head. `None` when not connected.
    baseline: Option<Snapshot>,
}

impl Workspace {
    /// Create a workspace over `vfs` with a single-entry history and no baseline.
    pub fn new(vfs: Vfs) -> Self {
        let history = SnapshotHistory::new(vfs.snapshot());
        Self {
            vfs,
            history,
            baseline: None,
        }
    }

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    pub fn history(&self) -> &SnapshotHistory {
        &self.history
    }

    pub fn baseline(&self) -> Option<&Snapshot> {
        self.baseline.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.baseline.is_some()
    }

    // ================================================================
    // Edits
    // ================================================================

    /// Keystroke-level edit: changes the VFS without recording a snapshot.
    pub fn edit(&mut self, path: &str, content: impl Into<String>) -> Result<String, VfsError> {
        self.vfs.set(path, content)
    }

    /// Record the current VFS as a new undo point.
    pub fn checkpoint(&mut self) {
        self.history.push(self.vfs.snapshot());
    }

    /// Write a file and record an undo point.
    pub fn write_file(&mut self, path: &str, content: impl Into<String>) -> Result<String, VfsError> {
        let path = self.vfs.set(path, content)?;
        self.checkpoint();
        Ok(path)
    }

    /// Create an empty file and record an undo point.
    pub fn create_file(&mut self, path: &str) -> Result<String, VfsError> {
        self.write_file(path, String::new())
    }

    /// Create an empty directory (via its placeholder) and record an undo point.
    pub fn create_dir(&mut self, path: &str) -> Result<String, VfsError> {
        let placeholder = self.vfs.create_dir(path)?;
        self.checkpoint();
        Ok(placeholder)
    }

    /// Delete a file and record an undo point.
    pub fn delete(&mut self, path: &str) -> Result<String, VfsError> {
        let content = self.vfs.delete(path)?;
        self.checkpoint();
        Ok(content)
    }

    /// Merge uploaded files and record a single undo point.
    pub fn import<I, P, C>(&mut self, files: I) -> Result<Vec<String>, VfsError>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        let written = self.vfs.import(files)?;
        if !written.is_empty() {
            self.checkpoint();
        }
        Ok(written)
    }

    /// Apply a terminal-simulator batch. One undo point covers the whole batch,
    /// and only if something actually changed.
    pub fn apply(&mut self, batch: &[FileSystemChange]) -> ApplyReport {
        let report = apply_batch(&mut self.vfs, batch);
        if report.changed() {
            self.checkpoint();
        }
        tracing::debug!(
            applied = report.applied.len(),
            rejected = report.rejected.len(),
            "applied change batch"
        );
        report
    }

    /// Restore the previous undo point into the VFS.
    ///
    /// Returns false at the initial state. Unrecorded keystroke edits are lost.
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snapshot) => {
                self.vfs = Vfs::from_snapshot(snapshot);
                true
            }
            None => false,
        }
    }

    // ================================================================
    // Sync state
    // ================================================================

    /// Replace everything with freshly loaded remote contents.
    ///
    /// VFS and baseline become two independent copies; history restarts.
    pub fn reset_synced(&mut self, files: Vfs) {
        self.baseline = Some(files.snapshot());
        self.history.reset(files.snapshot());
        self.vfs = files;
    }

    /// Replace the VFS without connecting to a remote (restore from cache).
    pub fn reset_local(&mut self, files: Vfs) {
        self.baseline = None;
        self.history.reset(files.snapshot());
        self.vfs = files;
    }

    /// Collapse the baseline onto the current VFS after a successful push.
    pub fn mark_synced(&mut self) {
        self.baseline = Some(self.vfs.snapshot());
    }

    /// Forget the baseline. The VFS is kept as a local working copy.
    pub fn disconnect(&mut self) {
        self.baseline = None;
    }

    /// Changes against the baseline; empty when not connected.
    pub fn changes(&self) -> Vec<ChangeRecord> {
        match &self.baseline {
            Some(baseline) => compute_diff(self.vfs.files(), baseline.files()),
            None => Vec::new(),
        }
    }
}
