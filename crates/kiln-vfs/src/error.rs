//! Error types for the VFS and the persistence adapter.

/// Errors from VFS operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VfsError {
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("not found: {0}")]
    NotFound(String),
}

/// Errors from the persistence adapter.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid key {0:?}")]
    InvalidKey(String),

    #[error("persisted workspace is unusable: {0}")]
    Vfs(#[from] VfsError),
}
