//! A workspace bound to a remote branch.

use std::ops::Deref;
use std::sync::Arc;

use kiln_vfs::{ApplyReport, ChangeRecord, FileSystemChange, VfsError, Workspace};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::load::{LoadReport, load_branch};
use crate::push::{CommitOutcome, commit};
use crate::remote::GitRemote;
use crate::types::{BranchInfo, RemoteRef, RepoInfo, User};

/// Owns the workspace and the remote it syncs with.
///
/// `load` and `commit` take `&mut self`: while one is awaiting the remote,
/// no other operation can touch the VFS or the baseline.
pub struct SyncSession {
    remote: Arc<dyn GitRemote>,
    config: SyncConfig,
    workspace: Workspace,
    remote_ref: Option<RemoteRef>,
}

impl SyncSession {
    pub fn new(remote: Arc<dyn GitRemote>, config: SyncConfig) -> Self {
        Self::with_workspace(remote, config, Workspace::default())
    }

    /// Start from an existing (typically restored, unconnected) workspace.
    pub fn with_workspace(remote: Arc<dyn GitRemote>, config: SyncConfig, workspace: Workspace) -> Self {
        Self {
            remote,
            config,
            workspace,
            remote_ref: None,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Edit access to the workspace. Baseline and remote binding stay under
    /// the session's control.
    pub fn workspace_mut(&mut self) -> WorkspaceMut<'_> {
        WorkspaceMut {
            workspace: &mut self.workspace,
        }
    }

    pub fn remote_ref(&self) -> Option<&RemoteRef> {
        self.remote_ref.as_ref()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.remote_ref.is_some()
    }

    pub async fn current_user(&self) -> Result<User> {
        self.remote.current_user().await
    }

    pub async fn list_repos(&self) -> Result<Vec<RepoInfo>> {
        self.remote.list_repos().await
    }

    pub async fn list_branches(&self, owner: &str, repo: &str) -> Result<Vec<BranchInfo>> {
        self.remote.list_branches(owner, repo).await
    }

    /// Replace the workspace with the contents of a branch.
    ///
    /// On failure the current workspace is kept as it was.
    pub async fn load(&mut self, owner: &str, repo: &str, branch: &str) -> Result<LoadReport> {
        let loaded = load_branch(self.remote.as_ref(), owner, repo, branch, &self.config).await?;
        self.workspace.reset_synced(loaded.files);
        self.remote_ref = Some(loaded.remote_ref);
        Ok(loaded.report)
    }

    /// Changes since the last load or push. Empty when not connected.
    pub fn changes(&self) -> Vec<ChangeRecord> {
        self.workspace.changes()
    }

    /// Push all current changes as one commit.
    ///
    /// On success the baseline becomes a copy of the VFS and the remote ref
    /// advances. On failure both stay as they were; after a
    /// [`SyncError::NonFastForward`] the branch must be reloaded.
    pub async fn commit(&mut self, message: &str) -> Result<CommitOutcome> {
        let target = self
            .remote_ref
            .as_ref()
            .ok_or(SyncError::NotConnected)?
            .target();
        let changes = self.workspace.changes();
        if changes.is_empty() {
            return Err(SyncError::NothingToCommit);
        }

        let outcome = commit(
            self.remote.as_ref(),
            &target,
            message,
            &changes,
            self.workspace.vfs(),
        )
        .await?;

        self.workspace.mark_synced();
        self.remote_ref = Some(outcome.remote_ref.clone());
        Ok(outcome)
    }

    /// Drop the remote binding. Files stay as a local working copy.
    pub fn disconnect(&mut self) {
        if let Some(r) = self.remote_ref.take() {
            tracing::info!(remote = %r.display_name(), "disconnected");
        }
        self.workspace.disconnect();
    }
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("config", &self.config)
            .field("remote_ref", &self.remote_ref)
            .field("files", &self.workspace.vfs().len())
            .finish_non_exhaustive()
    }
}

/// File edits on a session's workspace.
///
/// Reads go through `Deref`. Operations that replace or drop the baseline
/// (`reset_synced`, `mark_synced`, `disconnect`) are only reachable through
/// [`SyncSession`], so the baseline and the remote ref always agree.
pub struct WorkspaceMut<'a> {
    workspace: &'a mut Workspace,
}

impl WorkspaceMut<'_> {
    /// Keystroke-level edit, no undo point.
    pub fn edit(&mut self, path: &str, content: impl Into<String>) -> std::result::Result<String, VfsError> {
        self.workspace.edit(path, content)
    }

    pub fn checkpoint(&mut self) {
        self.workspace.checkpoint();
    }

    pub fn write_file(&mut self, path: &str, content: impl Into<String>) -> std::result::Result<String, VfsError> {
        self.workspace.write_file(path, content)
    }

    pub fn create_file(&mut self, path: &str) -> std::result::Result<String, VfsError> {
        self.workspace.create_file(path)
    }

    pub fn create_dir(&mut self, path: &str) -> std::result::Result<String, VfsError> {
        self.workspace.create_dir(path)
    }

    pub fn delete(&mut self, path: &str) -> std::result::Result<String, VfsError> {
        self.workspace.delete(path)
    }

    pub fn import<I, P, C>(&mut self, files: I) -> std::result::Result<Vec<String>, VfsError>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        self.workspace.import(files)
    }

    pub fn apply(&mut self, batch: &[FileSystemChange]) -> ApplyReport {
        self.workspace.apply(batch)
    }

    pub fn undo(&mut self) -> bool {
        self.workspace.undo()
    }
}

impl Deref for WorkspaceMut<'_> {
    type Target = Workspace;

    fn deref(&self) -> &Workspace {
        self.workspace
    }
}
