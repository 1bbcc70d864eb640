//! In-memory git remote.
//!
//! A content-addressed object store with real git object ids, incremental
//! `base_tree` semantics and fast-forward-only refs. Used by tests and by
//! the REPL's offline mode. Faults can be injected per operation or per blob.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Result, SyncError};
use crate::object::{TreeRecord, blob_sha, commit_body, hash_object, tree_sha};
use crate::remote::GitRemote;
use crate::types::{
    BlobPayload, BranchHead, BranchInfo, CreatedCommit, EntryKind, MODE_FILE, MODE_TREE,
    NewTreeEntry, RepoInfo, TreeItem, TreeListing, User,
};

const DEFAULT_BRANCH: &str = "main";

#[derive(Debug, Clone)]
enum Object {
    Blob(Vec<u8>),
    Tree(Vec<TreeRecord>),
    Commit { tree: String, parents: Vec<String> },
}

/// Flattened tree: relative path → (mode, blob sha).
type FlatTree = BTreeMap<String, (String, String)>;

#[derive(Debug, Default)]
struct Repo {
    objects: HashMap<String, Object>,
    branches: BTreeMap<String, String>,
    default_branch: String,
    pushed_at: u64,
    /// Files an "external client" pushes right before the next ref update.
    interloper: Option<(String, Vec<(String, Vec<u8>)>)>,
}

#[derive(Debug, Default)]
struct State {
    repos: BTreeMap<(String, String), Repo>,
    failing_ops: HashSet<String>,
    failing_blobs: HashSet<String>,
    truncate_next_tree: bool,
    calls: HashMap<&'static str, usize>,
    clock: u64,
}

/// Git remote held entirely in memory.
///
/// Thread-safe via internal `RwLock`. All data is lost when dropped.
#[derive(Debug)]
pub struct MemoryRemote {
    user: User,
    state: RwLock<State>,
}

impl MemoryRemote {
    /// Create a remote whose authenticated user is `login`.
    pub fn new(login: impl Into<String>) -> Self {
        let login = login.into();
        Self {
            user: User {
                html_url: format!("memory://{login}"),
                login,
            },
            state: RwLock::new(State::default()),
        }
    }

    /// Create a repository with a `main` branch holding one commit of `files`.
    ///
    /// An empty `files` gives a branch whose tree is empty. Returns the
    /// head commit sha.
    pub async fn create_repo<I, P, C>(&self, owner: &str, name: &str, files: I) -> Result<String>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: AsRef<[u8]>,
    {
        let mut state = self.state.write().await;
        let clock = state.tick();
        let repo = state
            .repos
            .entry((owner.to_string(), name.to_string()))
            .or_default();
        repo.default_branch = DEFAULT_BRANCH.to_string();

        let mut flat = FlatTree::new();
        for (path, content) in files {
            let sha = repo.put(Object::Blob(content.as_ref().to_vec()))?;
            flat.insert(relative(path.as_ref()), (MODE_FILE.to_string(), sha));
        }
        let tree = repo.write_flat(&flat)?;
        let commit = repo.put_commit(&tree, Vec::new(), "Initial commit", clock)?;
        repo.branches.insert(DEFAULT_BRANCH.to_string(), commit.clone());
        repo.pushed_at = clock;
        Ok(commit)
    }

    /// Add a branch pointing at an existing commit.
    pub async fn create_branch(&self, owner: &str, repo: &str, branch: &str, commit: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let repo = state.repo_mut(owner, repo)?;
        if !matches!(repo.objects.get(commit), Some(Object::Commit { .. })) {
            return Err(SyncError::not_found("commit", commit));
        }
        repo.branches.insert(branch.to_string(), commit.to_string());
        Ok(())
    }

    /// Commit `files` on top of `branch` as another client would.
    pub async fn push_files<I, P, C>(&self, owner: &str, repo: &str, branch: &str, files: I) -> Result<String>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: AsRef<[u8]>,
    {
        let files = owned_files(files);
        let mut state = self.state.write().await;
        let clock = state.tick();
        state.repo_mut(owner, repo)?.external_push(branch, &files, clock)
    }

    /// Arrange for another client to push `files` to `branch` immediately
    /// before the next ref update on this repository.
    pub async fn push_before_next_ref_update<I, P, C>(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        files: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: AsRef<[u8]>,
    {
        let files = owned_files(files);
        let mut state = self.state.write().await;
        state.repo_mut(owner, repo)?.interloper = Some((branch.to_string(), files));
        Ok(())
    }

    /// Make the next call to `operation` (e.g. `"create_tree"`) fail with a 500.
    pub async fn fail_next(&self, operation: &str) {
        self.state.write().await.failing_ops.insert(operation.to_string());
    }

    /// Make every read of blob `sha` fail with a 500.
    pub async fn fail_blob(&self, sha: &str) {
        self.state.write().await.failing_blobs.insert(sha.to_string());
    }

    /// Make the next tree read drop its last entry and report itself truncated.
    pub async fn truncate_next_tree(&self) {
        self.state.write().await.truncate_next_tree = true;
    }

    /// How many times `operation` was called.
    pub async fn calls(&self, operation: &str) -> usize {
        self.state.read().await.calls.get(operation).copied().unwrap_or(0)
    }

    /// Head commit of a branch.
    pub async fn head(&self, owner: &str, repo: &str, branch: &str) -> Option<String> {
        let state = self.state.read().await;
        state.repos.get(&key(owner, repo))?.branches.get(branch).cloned()
    }

    /// Blob sha at `path` on `branch`, if present.
    pub async fn blob_at(&self, owner: &str, repo: &str, branch: &str, path: &str) -> Option<String> {
        let state = self.state.read().await;
        let repo = state.repos.get(&key(owner, repo))?;
        let tree = repo.commit_tree(repo.branches.get(branch)?).ok()?;
        let flat = repo.flatten(&tree).ok()?;
        flat.get(&relative(path)).map(|(_, sha)| sha.clone())
    }

    /// Content of `path` on `branch` as text, if present.
    pub async fn read_file(&self, owner: &str, repo: &str, branch: &str, path: &str) -> Option<String> {
        let sha = self.blob_at(owner, repo, branch, path).await?;
        let state = self.state.read().await;
        match state.repos.get(&key(owner, repo))?.objects.get(&sha)? {
            Object::Blob(bytes) => String::from_utf8(bytes.clone()).ok(),
            _ => None,
        }
    }

    /// Number of objects stored for a repository.
    pub async fn object_count(&self, owner: &str, repo: &str) -> usize {
        let state = self.state.read().await;
        state.repos.get(&key(owner, repo)).map_or(0, |r| r.objects.len())
    }

    /// Count the call and consume an injected failure for `operation`.
    async fn enter(&self, operation: &'static str) -> Result<()> {
        let mut state = self.state.write().await;
        *state.calls.entry(operation).or_default() += 1;
        if state.failing_ops.remove(operation) {
            tracing::debug!(operation, "injected failure");
            return Err(server_error(operation, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl GitRemote for MemoryRemote {
    async fn current_user(&self) -> Result<User> {
        self.enter("current_user").await?;
        Ok(self.user.clone())
    }

    async fn list_repos(&self) -> Result<Vec<RepoInfo>> {
        self.enter("list_repos").await?;
        let state = self.state.read().await;
        let mut repos: Vec<(&(String, String), &Repo)> = state
            .repos
            .iter()
            .filter(|((owner, _), _)| *owner == self.user.login)
            .collect();
        repos.sort_by(|a, b| b.1.pushed_at.cmp(&a.1.pushed_at));
        Ok(repos
            .into_iter()
            .map(|((owner, name), repo)| RepoInfo {
                owner: owner.clone(),
                name: name.clone(),
                default_branch: Some(repo.default_branch.clone()),
            })
            .collect())
    }

    async fn list_branches(&self, owner: &str, repo: &str) -> Result<Vec<BranchInfo>> {
        self.enter("list_branches").await?;
        let state = self.state.read().await;
        Ok(state
            .repo(owner, repo)?
            .branches
            .iter()
            .map(|(name, sha)| BranchInfo {
                name: name.clone(),
                commit_sha: sha.clone(),
            })
            .collect())
    }

    async fn get_branch(&self, owner: &str, repo: &str, branch: &str) -> Result<BranchHead> {
        self.enter("get_branch").await?;
        let state = self.state.read().await;
        let repo = state.repo(owner, repo)?;
        let commit = repo
            .branches
            .get(branch)
            .ok_or_else(|| SyncError::not_found("branch", branch))?;
        Ok(BranchHead {
            name: branch.to_string(),
            commit_sha: commit.clone(),
            tree_sha: repo.commit_tree(commit)?,
        })
    }

    async fn get_tree(&self, owner: &str, repo: &str, sha: &str, recursive: bool) -> Result<TreeListing> {
        self.enter("get_tree").await?;
        let mut state = self.state.write().await;
        let truncated = std::mem::take(&mut state.truncate_next_tree);
        let repo = state.repo(owner, repo)?;
        let mut entries = Vec::new();
        repo.list_tree(sha, "", recursive, &mut entries)?;
        if truncated {
            entries.pop();
        }
        Ok(TreeListing {
            sha: sha.to_string(),
            entries,
            truncated,
        })
    }

    async fn get_blob(&self, owner: &str, repo: &str, sha: &str) -> Result<BlobPayload> {
        self.enter("get_blob").await?;
        let state = self.state.read().await;
        if state.failing_blobs.contains(sha) {
            return Err(server_error("get_blob", "injected failure"));
        }
        match state.repo(owner, repo)?.objects.get(sha) {
            Some(Object::Blob(bytes)) => Ok(BlobPayload::base64(bytes)),
            _ => Err(SyncError::not_found("blob", sha)),
        }
    }

    async fn create_blob(&self, owner: &str, repo: &str, content: &str) -> Result<String> {
        self.enter("create_blob").await?;
        let mut state = self.state.write().await;
        state
            .repo_mut(owner, repo)?
            .put(Object::Blob(content.as_bytes().to_vec()))
    }

    async fn create_tree(
        &self,
        owner: &str,
        repo: &str,
        base_tree: &str,
        entries: &[NewTreeEntry],
    ) -> Result<String> {
        self.enter("create_tree").await?;
        let mut state = self.state.write().await;
        let repo = state.repo_mut(owner, repo)?;

        let mut flat = repo.flatten(base_tree)?;
        for entry in entries {
            if entry.kind != EntryKind::Blob {
                return Err(unprocessable("create_tree", format!("unsupported entry type for {}", entry.path)));
            }
            match &entry.sha {
                Some(sha) => {
                    if !matches!(repo.objects.get(sha), Some(Object::Blob(_))) {
                        return Err(unprocessable("create_tree", format!("unknown blob {sha}")));
                    }
                    flat.insert(entry.path.clone(), (entry.mode.clone(), sha.clone()));
                }
                None => {
                    if flat.remove(&entry.path).is_none() {
                        return Err(unprocessable(
                            "create_tree",
                            format!("cannot delete {}: not in base tree", entry.path),
                        ));
                    }
                }
            }
        }
        repo.write_flat(&flat)
    }

    async fn create_commit(
        &self,
        owner: &str,
        repo: &str,
        message: &str,
        tree_sha: &str,
        parents: &[String],
    ) -> Result<CreatedCommit> {
        self.enter("create_commit").await?;
        let mut state = self.state.write().await;
        let clock = state.tick();
        let (owner_name, repo_name) = (owner.to_string(), repo.to_string());
        let repo = state.repo_mut(owner, repo)?;

        if !matches!(repo.objects.get(tree_sha), Some(Object::Tree(_))) {
            return Err(unprocessable("create_commit", format!("unknown tree {tree_sha}")));
        }
        if let Some(missing) = parents.iter().find(|p| !repo.objects.contains_key(*p)) {
            return Err(unprocessable("create_commit", format!("unknown parent {missing}")));
        }
        let sha = repo.put_commit(tree_sha, parents.to_vec(), message, clock)?;
        Ok(CreatedCommit {
            html_url: format!("memory://{owner_name}/{repo_name}/commit/{sha}"),
            sha,
        })
    }

    async fn update_ref(&self, owner: &str, repo: &str, branch: &str, sha: &str) -> Result<()> {
        self.enter("update_ref").await?;
        let mut state = self.state.write().await;
        let clock = state.tick();
        let repo = state.repo_mut(owner, repo)?;

        if let Some((target, files)) = repo.interloper.take() {
            let moved = repo.external_push(&target, &files, clock)?;
            tracing::debug!(branch = %target, head = %moved, "external push");
        }

        let current = repo
            .branches
            .get(branch)
            .ok_or_else(|| SyncError::not_found("branch", branch))?;
        if !repo.is_ancestor(current, sha) {
            return Err(SyncError::NonFastForward {
                branch: branch.to_string(),
            });
        }
        repo.branches.insert(branch.to_string(), sha.to_string());
        repo.pushed_at = clock;
        Ok(())
    }
}

impl State {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn repo(&self, owner: &str, name: &str) -> Result<&Repo> {
        self.repos
            .get(&key(owner, name))
            .ok_or_else(|| SyncError::not_found("repository", format!("{owner}/{name}")))
    }

    fn repo_mut(&mut self, owner: &str, name: &str) -> Result<&mut Repo> {
        self.repos
            .get_mut(&key(owner, name))
            .ok_or_else(|| SyncError::not_found("repository", format!("{owner}/{name}")))
    }
}

impl Repo {
    /// Store an object and return its id.
    fn put(&mut self, object: Object) -> Result<String> {
        let sha = match &object {
            Object::Blob(bytes) => blob_sha(bytes),
            Object::Tree(records) => tree_sha(records)
                .ok_or_else(|| unprocessable("create_tree", "malformed entry sha"))?,
            Object::Commit { .. } => {
                return Err(unprocessable("create_commit", "use put_commit"));
            }
        };
        self.objects.insert(sha.clone(), object);
        Ok(sha)
    }

    fn put_commit(&mut self, tree: &str, parents: Vec<String>, message: &str, clock: u64) -> Result<String> {
        let sha = hash_object("commit", &commit_body(tree, &parents, message, clock));
        self.objects.insert(
            sha.clone(),
            Object::Commit {
                tree: tree.to_string(),
                parents,
            },
        );
        Ok(sha)
    }

    fn commit_tree(&self, commit: &str) -> Result<String> {
        match self.objects.get(commit) {
            Some(Object::Commit { tree, .. }) => Ok(tree.clone()),
            _ => Err(SyncError::not_found("commit", commit)),
        }
    }

    fn tree_records(&self, sha: &str) -> Result<&[TreeRecord]> {
        match self.objects.get(sha) {
            Some(Object::Tree(records)) => Ok(records),
            _ => Err(SyncError::not_found("tree", sha)),
        }
    }

    fn list_tree(&self, sha: &str, prefix: &str, recursive: bool, out: &mut Vec<TreeItem>) -> Result<()> {
        let mut records = self.tree_records(sha)?.to_vec();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        for record in records {
            let path = format!("{prefix}{}", record.name);
            if record.is_tree() {
                out.push(TreeItem {
                    path: path.clone(),
                    mode: MODE_TREE.to_string(),
                    kind: EntryKind::Tree,
                    sha: record.sha.clone(),
                });
                if recursive {
                    self.list_tree(&record.sha, &format!("{path}/"), true, out)?;
                }
            } else {
                out.push(TreeItem {
                    path,
                    mode: record.mode.clone(),
                    kind: EntryKind::Blob,
                    sha: record.sha.clone(),
                });
            }
        }
        Ok(())
    }

    fn flatten(&self, tree: &str) -> Result<FlatTree> {
        let mut items = Vec::new();
        self.list_tree(tree, "", true, &mut items)?;
        Ok(items
            .into_iter()
            .filter(|item| item.kind == EntryKind::Blob)
            .map(|item| (item.path, (item.mode, item.sha)))
            .collect())
    }

    /// Write nested tree objects for a flat listing and return the root id.
    fn write_flat(&mut self, flat: &FlatTree) -> Result<String> {
        let mut files = Vec::new();
        let mut dirs: BTreeMap<&str, FlatTree> = BTreeMap::new();
        for (path, (mode, sha)) in flat {
            match path.split_once('/') {
                Some((dir, rest)) => {
                    dirs.entry(dir)
                        .or_default()
                        .insert(rest.to_string(), (mode.clone(), sha.clone()));
                }
                None => files.push(TreeRecord {
                    name: path.clone(),
                    mode: mode.clone(),
                    sha: sha.clone(),
                }),
            }
        }
        if let Some(clash) = files.iter().find(|f| dirs.contains_key(f.name.as_str())) {
            return Err(unprocessable(
                "create_tree",
                format!("{} is both a file and a directory", clash.name),
            ));
        }
        for (name, children) in dirs {
            let sha = self.write_flat(&children)?;
            files.push(TreeRecord {
                name: name.to_string(),
                mode: MODE_TREE.to_string(),
                sha,
            });
        }
        self.put(Object::Tree(files))
    }

    /// True if `ancestor` is reachable from `commit` through parent links.
    fn is_ancestor(&self, ancestor: &str, commit: &str) -> bool {
        let mut pending = vec![commit.to_string()];
        let mut seen = HashSet::new();
        while let Some(sha) = pending.pop() {
            if sha == ancestor {
                return true;
            }
            if !seen.insert(sha.clone()) {
                continue;
            }
            if let Some(Object::Commit { parents, .. }) = self.objects.get(&sha) {
                pending.extend(parents.iter().cloned());
            }
        }
        false
    }

    fn external_push(&mut self, branch: &str, files: &[(String, Vec<u8>)], clock: u64) -> Result<String> {
        let head = self
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| SyncError::not_found("branch", branch))?;
        let mut flat = self.flatten(&self.commit_tree(&head)?)?;
        for (path, content) in files {
            let sha = self.put(Object::Blob(content.clone()))?;
            flat.insert(path.clone(), (MODE_FILE.to_string(), sha));
        }
        let tree = self.write_flat(&flat)?;
        let commit = self.put_commit(&tree, vec![head], "External change", clock)?;
        self.branches.insert(branch.to_string(), commit.clone());
        self.pushed_at = clock;
        Ok(commit)
    }
}

fn key(owner: &str, repo: &str) -> (String, String) {
    (owner.to_string(), repo.to_string())
}

fn relative(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

fn owned_files<I, P, C>(files: I) -> Vec<(String, Vec<u8>)>
where
    I: IntoIterator<Item = (P, C)>,
    P: AsRef<str>,
    C: AsRef<[u8]>,
{
    files
        .into_iter()
        .map(|(p, c)| (relative(p.as_ref()), c.as_ref().to_vec()))
        .collect()
}

fn server_error(operation: &'static str, message: &str) -> SyncError {
    SyncError::Network {
        operation,
        status: Some(500),
        message: message.to_string(),
    }
}

fn unprocessable(operation: &'static str, message: impl Into<String>) -> SyncError {
    SyncError::Network {
        operation,
        status: Some(422),
        message: message.into(),
    }
}
