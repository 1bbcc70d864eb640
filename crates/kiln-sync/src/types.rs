//! Data types exchanged with a git remote.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Git file mode for a regular (non-executable) file.
pub const MODE_FILE: &str = "100644";

/// Git file mode for a subtree.
pub const MODE_TREE: &str = "040000";

/// The remote point a workspace is synced with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRef {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub head_commit_sha: String,
    pub root_tree_sha: String,
}

impl RemoteRef {
    /// `owner/repo@branch`, for log lines and prompts.
    pub fn display_name(&self) -> String {
        format!("{}/{}@{}", self.owner, self.repo, self.branch)
    }

    pub fn target(&self) -> BranchTarget {
        BranchTarget::new(&self.owner, &self.repo, &self.branch)
    }
}

/// Where a push goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchTarget {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl BranchTarget {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }
}

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    #[serde(default)]
    pub html_url: String,
}

/// A repository the user can push to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub owner: String,
    pub name: String,
    pub default_branch: Option<String>,
}

impl RepoInfo {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// A branch and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    pub commit_sha: String,
}

/// A branch resolved down to its root tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchHead {
    pub name: String,
    pub commit_sha: String,
    pub tree_sha: String,
}

/// Object type of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    /// Submodule pointer. Listed by the remote, never loaded.
    Commit,
}

/// One entry of a (recursive) tree listing. `path` is relative to the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeItem {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub sha: String,
}

/// Result of a tree read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeListing {
    pub sha: String,
    pub entries: Vec<TreeItem>,
    /// The remote cut the listing short; some entries are missing.
    pub truncated: bool,
}

/// Blob payload as transported by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobPayload {
    pub content: String,
    /// `base64` or `utf-8`.
    pub encoding: String,
}

impl BlobPayload {
    /// Encode raw bytes the way the GitHub API does: base64, wrapped at 60 columns.
    pub fn base64(bytes: &[u8]) -> Self {
        let encoded = STANDARD.encode(bytes);
        let wrapped = encoded
            .as_bytes()
            .chunks(60)
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            content: wrapped,
            encoding: "base64".to_string(),
        }
    }

    /// Raw bytes of the blob. Any encoding other than base64 is taken verbatim.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        if self.encoding != "base64" {
            return Ok(self.content.clone().into_bytes());
        }
        let compact: String = self
            .content
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        STANDARD.decode(compact)
    }
}

/// An entry for tree creation. `sha: None` deletes the path from the base tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub sha: Option<String>,
}

impl NewTreeEntry {
    /// Point `path` at an uploaded blob.
    pub fn file(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: MODE_FILE.to_string(),
            kind: EntryKind::Blob,
            sha: Some(sha.into()),
        }
    }

    /// Remove `path` from the base tree.
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: MODE_FILE.to_string(),
            kind: EntryKind::Blob,
            sha: None,
        }
    }
}

/// A freshly created commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedCommit {
    pub sha: String,
    #[serde(default)]
    pub html_url: String,
}
