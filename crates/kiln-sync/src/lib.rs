//! kiln-sync: load a git branch into a workspace and push changes back.
//!
//! Talks to a git host through the [`GitRemote`] trait. Two implementations
//! ship here:
//!
//! - [`GithubRemote`]: the GitHub REST API over `reqwest`
//! - [`MemoryRemote`]: an in-memory object store with real git object ids,
//!   used by tests and offline sessions
//!
//! # Push model
//!
//! A commit is built from the diff of the workspace against its baseline:
//! blobs for added and modified files, null entries for deletions, a tree
//! on top of the previous root tree, a commit, and finally a non-forced ref
//! update. Only the ref update is visible to other clients.

pub mod config;
mod error;
pub mod github;
pub mod load;
pub mod memory;
mod object;
pub mod push;
mod remote;
mod session;
pub mod types;

pub use config::{SyncConfig, TextPolicy};
pub use error::{Result, SyncError};
pub use github::GithubRemote;
pub use load::{FailedBlob, LoadReport, LoadedBranch, load_branch, pick_default_branch};
pub use memory::MemoryRemote;
pub use object::blob_sha;
pub use push::{CommitOutcome, PushStep, commit};
pub use remote::GitRemote;
pub use session::{SyncSession, WorkspaceMut};
pub use types::{BranchInfo, BranchTarget, RemoteRef, RepoInfo, User};
