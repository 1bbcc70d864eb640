//! GitHub REST v3 remote.

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Method, Response, Url};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};

use async_trait::async_trait;

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::remote::GitRemote;
use crate::types::{
    BlobPayload, BranchHead, BranchInfo, CreatedCommit, NewTreeEntry, RepoInfo, TreeItem,
    TreeListing, User,
};

const API_VERSION: &str = "2022-11-28";
const PAGE_SIZE: &str = "100";

/// [`GitRemote`] backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubRemote {
    client: Client,
    api_base: Url,
}

impl GithubRemote {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| SyncError::Config("token contains invalid characters".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()?;

        let api_base = Url::parse(&config.api_base)
            .map_err(|e| SyncError::Config(format!("api_base {:?}: {e}", config.api_base)))?;
        if api_base.cannot_be_a_base() {
            return Err(SyncError::Config(format!("api_base {:?} cannot hold a path", config.api_base)));
        }

        Ok(Self { client, api_base })
    }

    /// API URL for `segments`, each percent-encoded as one path segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| SyncError::Config(format!("api_base {} cannot hold a path", self.api_base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Like [`url`](Self::url), with a branch name appended. Slashes in the
    /// branch stay separators; everything else is encoded.
    fn branch_url(&self, prefix: &[&str], branch: &str) -> Result<Url> {
        let segments: Vec<&str> = prefix.iter().copied().chain(branch.split('/')).collect();
        self.url(&segments)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<T> {
        tracing::trace!(operation, %url, "GET");
        let response = self.client.get(url).query(query).send().await?;
        read_json(operation, response).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<T> {
        tracing::trace!(operation, %url, %method, "send");
        let response = self
            .client
            .request(method, url)
            .json(body)
            .send()
            .await?;
        read_json(operation, response).await
    }
}

async fn read_json<T: DeserializeOwned>(operation: &'static str, response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(operation, status.as_u16(), &body))
}

/// Map a failure status to [`SyncError::Network`], using the API's `message` if present.
fn status_error(operation: &'static str, status: u16, body: &str) -> SyncError {
    #[derive(Deserialize)]
    struct ApiError {
        message: String,
    }

    let message = match serde_json::from_str::<ApiError>(body) {
        Ok(err) => err.message,
        Err(_) if body.trim().is_empty() => "no response body".to_string(),
        Err(_) => body.chars().take(200).collect(),
    };
    SyncError::Network {
        operation,
        status: Some(status),
        message,
    }
}

/// Classify a failed ref update. GitHub reports a moved branch as 409, or
/// as 422 "Update is not a fast forward".
fn ref_update_error(branch: &str, status: u16, body: &str) -> SyncError {
    let not_fast_forward = status == 409
        || (status == 422 && body.to_ascii_lowercase().contains("fast forward"));
    if not_fast_forward {
        return SyncError::NonFastForward {
            branch: branch.to_string(),
        };
    }
    status_error("update_ref", status, body)
}

// Wire shapes. Only the fields that are read.

#[derive(Deserialize)]
struct WireOwner {
    login: String,
}

#[derive(Deserialize)]
struct WireRepo {
    name: String,
    owner: WireOwner,
    default_branch: Option<String>,
}

#[derive(Deserialize)]
struct WireSha {
    sha: String,
}

#[derive(Deserialize)]
struct WireBranch {
    name: String,
    commit: WireSha,
}

#[derive(Deserialize)]
struct WireBranchDetail {
    name: String,
    commit: WireBranchCommit,
}

#[derive(Deserialize)]
struct WireBranchCommit {
    sha: String,
    commit: WireCommitBody,
}

#[derive(Deserialize)]
struct WireCommitBody {
    tree: WireSha,
}

#[derive(Deserialize)]
struct WireTree {
    sha: String,
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Serialize)]
struct NewBlob<'a> {
    content: &'a str,
    encoding: &'static str,
}

#[derive(Serialize)]
struct NewTree<'a> {
    base_tree: &'a str,
    tree: &'a [NewTreeEntry],
}

#[derive(Serialize)]
struct NewCommit<'a> {
    message: &'a str,
    tree: &'a str,
    parents: &'a [String],
}

#[derive(Serialize)]
struct RefUpdate<'a> {
    sha: &'a str,
    force: bool,
}

impl From<WireRepo> for RepoInfo {
    fn from(repo: WireRepo) -> Self {
        RepoInfo {
            owner: repo.owner.login,
            name: repo.name,
            default_branch: repo.default_branch,
        }
    }
}

impl From<WireBranchDetail> for BranchHead {
    fn from(branch: WireBranchDetail) -> Self {
        BranchHead {
            name: branch.name,
            commit_sha: branch.commit.sha,
            tree_sha: branch.commit.commit.tree.sha,
        }
    }
}

#[async_trait]
impl GitRemote for GithubRemote {
    async fn current_user(&self) -> Result<User> {
        self.get_json("current_user", self.url(&["user"])?, &[]).await
    }

    async fn list_repos(&self) -> Result<Vec<RepoInfo>> {
        let repos: Vec<WireRepo> = self
            .get_json(
                "list_repos",
                self.url(&["user", "repos"])?,
                &[("per_page", PAGE_SIZE), ("type", "owner"), ("sort", "pushed")],
            )
            .await?;
        Ok(repos.into_iter().map(RepoInfo::from).collect())
    }

    async fn list_branches(&self, owner: &str, repo: &str) -> Result<Vec<BranchInfo>> {
        let branches: Vec<WireBranch> = self
            .get_json(
                "list_branches",
                self.url(&["repos", owner, repo, "branches"])?,
                &[("per_page", PAGE_SIZE)],
            )
            .await?;
        Ok(branches
            .into_iter()
            .map(|b| BranchInfo {
                name: b.name,
                commit_sha: b.commit.sha,
            })
            .collect())
    }

    async fn get_branch(&self, owner: &str, repo: &str, branch: &str) -> Result<BranchHead> {
        let detail: WireBranchDetail = self
            .get_json(
                "get_branch",
                self.branch_url(&["repos", owner, repo, "branches"], branch)?,
                &[],
            )
            .await?;
        Ok(detail.into())
    }

    async fn get_tree(&self, owner: &str, repo: &str, sha: &str, recursive: bool) -> Result<TreeListing> {
        let query: &[(&str, &str)] = if recursive { &[("recursive", "1")] } else { &[] };
        let tree: WireTree = self
            .get_json("get_tree", self.url(&["repos", owner, repo, "git", "trees", sha])?, query)
            .await?;
        Ok(TreeListing {
            sha: tree.sha,
            entries: tree.tree,
            truncated: tree.truncated,
        })
    }

    async fn get_blob(&self, owner: &str, repo: &str, sha: &str) -> Result<BlobPayload> {
        self.get_json("get_blob", self.url(&["repos", owner, repo, "git", "blobs", sha])?, &[])
            .await
    }

    async fn create_blob(&self, owner: &str, repo: &str, content: &str) -> Result<String> {
        let created: WireSha = self
            .send_json(
                "create_blob",
                Method::POST,
                self.url(&["repos", owner, repo, "git", "blobs"])?,
                &NewBlob {
                    content,
                    encoding: "utf-8",
                },
            )
            .await?;
        Ok(created.sha)
    }

    async fn create_tree(
        &self,
        owner: &str,
        repo: &str,
        base_tree: &str,
        entries: &[NewTreeEntry],
    ) -> Result<String> {
        let created: WireSha = self
            .send_json(
                "create_tree",
                Method::POST,
                self.url(&["repos", owner, repo, "git", "trees"])?,
                &NewTree {
                    base_tree,
                    tree: entries,
                },
            )
            .await?;
        Ok(created.sha)
    }

    async fn create_commit(
        &self,
        owner: &str,
        repo: &str,
        message: &str,
        tree_sha: &str,
        parents: &[String],
    ) -> Result<CreatedCommit> {
        self.send_json(
            "create_commit",
            Method::POST,
            self.url(&["repos", owner, repo, "git", "commits"])?,
            &NewCommit {
                message,
                tree: tree_sha,
                parents,
            },
        )
        .await
    }

    async fn update_ref(&self, owner: &str, repo: &str, branch: &str, sha: &str) -> Result<()> {
        let url = self.branch_url(&["repos", owner, repo, "git", "refs", "heads"], branch)?;
        let response = self
            .client
            .patch(url)
            .json(&RefUpdate { sha, force: false })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let _: IgnoredAny = response.json().await?;
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ref_update_error(branch, status.as_u16(), &body))
    }
}
