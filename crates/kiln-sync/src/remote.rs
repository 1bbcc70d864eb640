//! The git-hosting API seam.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    BlobPayload, BranchHead, BranchInfo, CreatedCommit, NewTreeEntry, RepoInfo, TreeListing, User,
};

/// Operations a git-hosting remote must offer for load and push.
///
/// All object operations are addressed by sha. Only [`update_ref`] changes
/// what a branch points at; everything before it creates unreferenced
/// objects.
///
/// [`update_ref`]: GitRemote::update_ref
#[async_trait]
pub trait GitRemote: Send + Sync {
    /// Who the configured credentials belong to.
    async fn current_user(&self) -> Result<User>;

    /// Repositories owned by the current user, most recently pushed first.
    async fn list_repos(&self) -> Result<Vec<RepoInfo>>;

    async fn list_branches(&self, owner: &str, repo: &str) -> Result<Vec<BranchInfo>>;

    /// Resolve a branch to its head commit and that commit's root tree.
    async fn get_branch(&self, owner: &str, repo: &str, branch: &str) -> Result<BranchHead>;

    /// Read a tree. With `recursive`, every descendant is listed with its full path.
    async fn get_tree(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
        recursive: bool,
    ) -> Result<TreeListing>;

    async fn get_blob(&self, owner: &str, repo: &str, sha: &str) -> Result<BlobPayload>;

    /// Store `content` as a blob and return its sha.
    async fn create_blob(&self, owner: &str, repo: &str, content: &str) -> Result<String>;

    /// Create a tree from `base_tree` with `entries` overlaid. Returns the new tree sha.
    async fn create_tree(
        &self,
        owner: &str,
        repo: &str,
        base_tree: &str,
        entries: &[NewTreeEntry],
    ) -> Result<String>;

    async fn create_commit(
        &self,
        owner: &str,
        repo: &str,
        message: &str,
        tree_sha: &str,
        parents: &[String],
    ) -> Result<CreatedCommit>;

    /// Fast-forward `heads/<branch>` to `sha`. Never forces.
    ///
    /// Fails with [`SyncError::NonFastForward`](crate::SyncError::NonFastForward)
    /// if the branch head is no longer an ancestor of `sha`.
    async fn update_ref(&self, owner: &str, repo: &str, branch: &str, sha: &str) -> Result<()>;
}
