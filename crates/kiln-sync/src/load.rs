//! Loading a branch into memory.

use futures::stream::{self, StreamExt};
use kiln_vfs::{Vfs, normalize};

use crate::config::{SyncConfig, TextPolicy};
use crate::error::{Result, SyncError};
use crate::remote::GitRemote;
use crate::types::{BranchInfo, EntryKind, RemoteRef, TreeItem};

/// A blob that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedBlob {
    /// VFS path (`/src/app.js`); the raw tree path if it cannot be normalized.
    pub path: String,
    pub sha: String,
    pub reason: String,
}

/// What a load left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Paths whose content is not text under the configured policy.
    pub skipped: Vec<String>,
    /// Blobs the remote failed to serve.
    pub failed: Vec<FailedBlob>,
    /// The remote truncated the tree listing.
    pub truncated: bool,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty() && !self.truncated
    }
}

/// Files of a branch plus the remote point they came from.
#[derive(Debug, Clone)]
pub struct LoadedBranch {
    pub files: Vfs,
    pub remote_ref: RemoteRef,
    pub report: LoadReport,
}

enum Fetched {
    Text(String, String),
    Skipped(String),
    Failed(FailedBlob),
}

/// Pick the branch to open when the user has not chosen one.
///
/// Prefers `main`, then `master`, then whatever the remote listed first.
pub fn pick_default_branch(branches: &[BranchInfo]) -> Option<&BranchInfo> {
    ["main", "master"]
        .iter()
        .find_map(|name| branches.iter().find(|b| b.name == *name))
        .or_else(|| branches.first())
}

/// Read every text file of `owner/repo@branch`.
///
/// Blob reads run up to `config.fetch_concurrency` at a time. A blob that
/// fails to download or is not text is left out and listed in the report;
/// only failures to resolve the branch or read the tree abort the load.
pub async fn load_branch(
    remote: &dyn GitRemote,
    owner: &str,
    repo: &str,
    branch: &str,
    config: &SyncConfig,
) -> Result<LoadedBranch> {
    let head = remote.get_branch(owner, repo, branch).await?;
    let tree = remote.get_tree(owner, repo, &head.tree_sha, true).await?;
    if tree.truncated {
        tracing::warn!(owner, repo, branch, "tree listing truncated by the remote; some files are missing");
    }

    let blobs: Vec<&TreeItem> = tree
        .entries
        .iter()
        .filter(|e| e.kind == EntryKind::Blob)
        .collect();
    tracing::info!(owner, repo, branch, blobs = blobs.len(), "loading branch");

    let policy = config.text_policy;
    let results: Vec<Fetched> = stream::iter(blobs)
        .map(|item| fetch_one(remote, owner, repo, item, policy))
        .buffer_unordered(config.fetch_concurrency.max(1))
        .collect()
        .await;

    let mut files = Vec::new();
    let mut report = LoadReport {
        truncated: tree.truncated,
        ..LoadReport::default()
    };
    for fetched in results {
        match fetched {
            Fetched::Text(path, content) => files.push((path, content)),
            Fetched::Skipped(path) => report.skipped.push(path),
            Fetched::Failed(failure) => report.failed.push(failure),
        }
    }
    report.skipped.sort();
    report.failed.sort_by(|a, b| a.path.cmp(&b.path));

    let files = Vfs::from_files(files)?;
    tracing::info!(
        files = files.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "branch loaded"
    );

    Ok(LoadedBranch {
        files,
        remote_ref: RemoteRef {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
            head_commit_sha: head.commit_sha,
            root_tree_sha: head.tree_sha,
        },
        report,
    })
}

async fn fetch_one(
    remote: &dyn GitRemote,
    owner: &str,
    repo: &str,
    item: &TreeItem,
    policy: TextPolicy,
) -> Fetched {
    let path = match normalize(&item.path) {
        Ok(path) => path,
        Err(e) => return failed(&item.path, item, e.into()),
    };

    let bytes = match remote.get_blob(owner, repo, &item.sha).await {
        Ok(payload) => match payload.decode() {
            Ok(bytes) => bytes,
            Err(e) => {
                return failed(
                    &path,
                    item,
                    SyncError::Decode {
                        sha: item.sha.clone(),
                        message: e.to_string(),
                    },
                );
            }
        },
        Err(e) => return failed(&path, item, e),
    };

    match policy.accept(bytes) {
        Some(text) => Fetched::Text(path, text),
        None => {
            tracing::warn!(path = %path, "skipping binary file");
            Fetched::Skipped(path)
        }
    }
}

fn failed(path: &str, item: &TreeItem, error: SyncError) -> Fetched {
    tracing::warn!(path, sha = %item.sha, error = %error, "failed to load blob");
    Fetched::Failed(FailedBlob {
        path: path.to_string(),
        sha: item.sha.clone(),
        reason: error.to_string(),
    })
}
