//! kiln-vfs: the in-memory working copy behind kiln.
//!
//! This crate provides:
//!
//! - **Vfs**: flat path → text map, the single source of truth for project contents
//! - **Tree**: directory/file tree derived from the flat map for display
//! - **SnapshotHistory**: forward-truncating undo stack
//! - **Diff**: change set of the VFS against a baseline snapshot
//! - **Mutations**: batches of create/update/delete actions from the terminal simulator
//! - **Workspace**: single owner of VFS, history and baseline
//! - **Persistence**: key-value adapter for caching a workspace between sessions
//!
//! # Design
//!
//! Everything here is synchronous and lock-free except the persistence
//! adapter. The VFS is a plain value with one owner; snapshots and baselines
//! are deep copies, never shared references to the live map.
//!
//! ```text
//!   load ──► Workspace { vfs, history, baseline }
//!              │   edit / apply / undo mutate vfs (+ history)
//!              ▼
//!          compute_diff(vfs, baseline) ──► push ──► mark_synced()
//! ```

pub mod diff;
mod error;
pub mod history;
pub mod mutation;
pub mod path;
pub mod paths;
pub mod persist;
mod store;
pub mod tree;
mod workspace;

pub use diff::{ChangeRecord, ChangeStatus, compute_diff, render_patch};
pub use error::{PersistError, VfsError};
pub use history::SnapshotHistory;
pub use mutation::{ApplyReport, ChangeAction, FileSystemChange, RejectedChange, apply_batch};
pub use path::{PLACEHOLDER_NAME, is_placeholder, normalize};
pub use persist::{
    EditorState, FileStore, KeyValueStore, MemoryStore, PersistedWorkspace, WORKSPACE_KEY,
    load_workspace, save_workspace,
};
pub use store::{FileMap, Snapshot, Vfs};
pub use tree::{DirNode, TreeNode, build_tree, render_tree};
pub use workspace::Workspace;
