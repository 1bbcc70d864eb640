//! Errors for remote operations.

use kiln_vfs::VfsError;

/// All errors that can occur while talking to a git remote.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The remote answered with a failure status (auth, rate limit, 4xx/5xx).
    #[error("{operation} failed{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Network {
        operation: &'static str,
        status: Option<u16>,
        message: String,
    },

    /// Transport-level failure: DNS, TLS, timeout, malformed response body.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The branch moved between reading its head and updating it.
    #[error("branch {branch} moved on the remote; reload before pushing again")]
    NonFastForward { branch: String },

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// A blob payload could not be decoded.
    #[error("cannot decode blob {sha}: {message}")]
    Decode { sha: String, message: String },

    /// The change set refers to content the VFS no longer has.
    #[error("no content in the workspace for changed path {0}")]
    MissingContent(String),

    #[error("nothing to commit")]
    NothingToCommit,

    #[error("not connected to a remote branch")]
    NotConnected,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Vfs(#[from] VfsError),
}

impl SyncError {
    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        SyncError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// True for a rejected ref update. The caller must reload before retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::NonFastForward { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
