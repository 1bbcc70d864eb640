//! Committing a change set to a branch.
//!
//! A push is a saga of strictly sequential steps. Steps before
//! [`PushStep::UpdateRef`] only create unreferenced objects on the remote;
//! if any later step fails those objects are orphans the remote's garbage
//! collection removes. The ref update is the single point where the push
//! becomes visible, and it never forces.

use std::fmt;

use kiln_vfs::path::relative;
use kiln_vfs::{ChangeRecord, ChangeStatus, Vfs};

use crate::error::{Result, SyncError};
use crate::remote::GitRemote;
use crate::types::{BranchTarget, NewTreeEntry, RemoteRef};

/// Stages of a push, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStep {
    ResolveHead,
    CreateBlobs,
    CreateTree,
    CreateCommit,
    UpdateRef,
}

impl fmt::Display for PushStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PushStep::ResolveHead => "resolve head",
            PushStep::CreateBlobs => "create blobs",
            PushStep::CreateTree => "create tree",
            PushStep::CreateCommit => "create commit",
            PushStep::UpdateRef => "update ref",
        };
        f.write_str(s)
    }
}

/// A successful push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub commit_sha: String,
    /// Web link to the commit, if the remote has one.
    pub html_url: String,
    pub tree_sha: String,
    /// Where the branch now points.
    pub remote_ref: RemoteRef,
    /// Number of blobs uploaded.
    pub uploaded: usize,
    pub deleted: usize,
}

/// Commit `changes` (taking content from `vfs`) on top of `target`'s head.
///
/// The new tree is built incrementally from the previous root tree, so paths
/// not in `changes` keep their existing blobs. On any error nothing the
/// caller owns is touched.
pub async fn commit(
    remote: &dyn GitRemote,
    target: &BranchTarget,
    message: &str,
    changes: &[ChangeRecord],
    vfs: &Vfs,
) -> Result<CommitOutcome> {
    if changes.is_empty() {
        return Err(SyncError::NothingToCommit);
    }

    // Every upload must have content before the first object is created.
    let mut uploads = Vec::new();
    let mut deletions = Vec::new();
    for change in changes {
        match change.status {
            ChangeStatus::Added | ChangeStatus::Modified => {
                let content = vfs
                    .get(&change.path)
                    .ok_or_else(|| SyncError::MissingContent(change.path.clone()))?;
                uploads.push((change.path.as_str(), content));
            }
            ChangeStatus::Deleted => deletions.push(change.path.as_str()),
        }
    }

    let BranchTarget { owner, repo, branch } = target;
    let (owner, repo, branch) = (owner.as_str(), repo.as_str(), branch.as_str());

    let head = remote
        .get_branch(owner, repo, branch)
        .await
        .inspect_err(|e| step_failed(PushStep::ResolveHead, e))?;
    tracing::debug!(step = %PushStep::ResolveHead, commit = %head.commit_sha, tree = %head.tree_sha);

    let mut entries = Vec::with_capacity(uploads.len() + deletions.len());
    for (path, content) in &uploads {
        let sha = remote
            .create_blob(owner, repo, content)
            .await
            .inspect_err(|e| step_failed(PushStep::CreateBlobs, e))?;
        tracing::trace!(step = %PushStep::CreateBlobs, path, sha = %sha);
        entries.push(NewTreeEntry::file(relative(path), sha));
    }
    entries.extend(deletions.iter().map(|path| NewTreeEntry::delete(relative(path))));

    let tree_sha = remote
        .create_tree(owner, repo, &head.tree_sha, &entries)
        .await
        .inspect_err(|e| step_failed(PushStep::CreateTree, e))?;
    tracing::debug!(step = %PushStep::CreateTree, tree = %tree_sha, entries = entries.len());

    let created = remote
        .create_commit(owner, repo, message, &tree_sha, std::slice::from_ref(&head.commit_sha))
        .await
        .inspect_err(|e| step_failed(PushStep::CreateCommit, e))?;
    tracing::debug!(step = %PushStep::CreateCommit, commit = %created.sha);

    remote
        .update_ref(owner, repo, branch, &created.sha)
        .await
        .inspect_err(|e| step_failed(PushStep::UpdateRef, e))?;

    tracing::info!(
        owner,
        repo,
        branch,
        commit = %created.sha,
        uploaded = uploads.len(),
        deleted = deletions.len(),
        "pushed"
    );

    Ok(CommitOutcome {
        remote_ref: RemoteRef {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
            head_commit_sha: created.sha.clone(),
            root_tree_sha: tree_sha.clone(),
        },
        commit_sha: created.sha,
        html_url: created.html_url,
        tree_sha,
        uploaded: uploads.len(),
        deleted: deletions.len(),
    })
}

fn step_failed(step: PushStep, error: &SyncError) {
    if step == PushStep::UpdateRef {
        tracing::warn!(%step, error = %error, "push rejected; created objects are orphaned");
    } else {
        tracing::warn!(%step, error = %error, "push aborted");
    }
}
