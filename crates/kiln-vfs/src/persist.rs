//! Durable caching of a workspace between sessions.
//!
//! The backing store is opaque: anything that can `get` and `set` a JSON
//! value by key. The whole workspace is written as one value under
//! [`WORKSPACE_KEY`]; there is no transaction across keys.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::PersistError;
use crate::store::{FileMap, Vfs};
use crate::workspace::Workspace;

/// Key the workspace blob is stored under.
pub const WORKSPACE_KEY: &str = "workspace";

/// Abstract key-value persistence.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch a value. `Ok(None)` if the key was never set.
    async fn get(&self, key: &str) -> Result<Option<Value>, PersistError>;

    /// Store a value, replacing any previous one.
    async fn set(&self, key: &str, value: Value) -> Result<(), PersistError>;
}

/// In-memory store. All data is lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, PersistError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), PersistError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// One JSON file per key under a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store under the XDG data directory.
    pub fn default_location() -> Self {
        Self::new(crate::paths::store_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_for(&self, key: &str) -> Result<PathBuf, PersistError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(PersistError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, PersistError> {
        let path = self.file_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), PersistError> {
        let path = self.file_for(key)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let tmp = self.root.join(format!(".{key}.json.tmp"));
        let bytes = serde_json::to_vec_pretty(&value)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// Editor-facing state cached next to the files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorState {
    pub open_files: Vec<String>,
    pub active_file: Option<String>,
    pub preview_root: Option<String>,
    pub terminal_cwd: Option<String>,
}

/// The cached blob: files plus editor state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedWorkspace {
    pub files: FileMap,
    #[serde(default)]
    pub editor: EditorState,
    /// RFC 3339 timestamp of the save.
    pub saved_at: String,
}

impl PersistedWorkspace {
    /// Capture a workspace's current VFS.
    pub fn capture(workspace: &Workspace, editor: EditorState) -> Self {
        Self {
            files: workspace.vfs().files().clone(),
            editor,
            saved_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Rebuild a local (unconnected) workspace.
    ///
    /// Paths are re-normalized and re-checked, since the blob may have been
    /// written by something other than this crate.
    pub fn restore(self) -> Result<(Workspace, EditorState), PersistError> {
        let files = Vfs::from_files(self.files)?;
        let mut workspace = Workspace::default();
        workspace.reset_local(files);
        Ok((workspace, self.editor))
    }
}

/// Write a workspace to `store`.
pub async fn save_workspace(
    store: &dyn KeyValueStore,
    workspace: &Workspace,
    editor: EditorState,
) -> Result<(), PersistError> {
    let blob = PersistedWorkspace::capture(workspace, editor);
    let files = blob.files.len();
    store.set(WORKSPACE_KEY, serde_json::to_value(blob)?).await?;
    tracing::debug!(files, "saved workspace");
    Ok(())
}

/// Read a workspace from `store`. `Ok(None)` if nothing was saved.
pub async fn load_workspace(
    store: &dyn KeyValueStore,
) -> Result<Option<(Workspace, EditorState)>, PersistError> {
    let Some(value) = store.get(WORKSPACE_KEY).await? else {
        return Ok(None);
    };
    let blob: PersistedWorkspace = serde_json::from_value(value)?;
    tracing::debug!(files = blob.files.len(), saved_at = %blob.saved_at, "loaded workspace");
    blob.restore().map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VfsError;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get("k").await.unwrap().is_none());
        store.set("k", json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        assert!(store.get("workspace").await.unwrap().is_none());
        store.set("workspace", json!(["x"])).await.unwrap();
        store.set("workspace", json!(["y"])).await.unwrap();
        assert_eq!(store.get("workspace").await.unwrap(), Some(json!(["y"])));
        assert!(dir.path().join("nested/workspace.json").exists());
    }

    #[tokio::test]
    async fn test_file_store_rejects_bad_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        for key in ["", "../escape", ".hidden", "a/b"] {
            assert!(
                matches!(store.get(key).await, Err(PersistError::InvalidKey(_))),
                "key {key:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_workspace_save_and_load() {
        let store = MemoryStore::new();
        let mut ws = Workspace::new(Vfs::from_files([("/index.html", "<h1/>")]).unwrap());
        ws.create_dir("/templates").unwrap();
        ws.mark_synced();

        let editor = EditorState {
            open_files: vec!["/index.html".into()],
            active_file: Some("/index.html".into()),
            ..Default::default()
        };
        save_workspace(&store, &ws, editor.clone()).await.unwrap();

        let (restored, restored_editor) = load_workspace(&store).await.unwrap().unwrap();
        assert_eq!(restored.vfs(), ws.vfs());
        assert_eq!(restored_editor, editor);
        // A restored workspace is local: no baseline, fresh history.
        assert!(restored.baseline().is_none());
        assert_eq!(restored.history().len(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_workspace() {
        let store = MemoryStore::new();
        assert!(load_workspace(&store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_normalizes_foreign_paths() {
        let store = MemoryStore::new();
        store
            .set(
                WORKSPACE_KEY,
                json!({"files": {"a//b.txt": "x"}, "savedAt": "2024-01-01T00:00:00Z"}),
            )
            .await
            .unwrap();
        let (ws, editor) = load_workspace(&store).await.unwrap().unwrap();
        assert_eq!(ws.vfs().get("/a/b.txt"), Some("x"));
        assert_eq!(editor, EditorState::default());
    }

    #[tokio::test]
    async fn test_restore_rejects_file_directory_clash() {
        let store = MemoryStore::new();
        store
            .set(
                WORKSPACE_KEY,
                json!({"files": {"/docs": "f", "/docs/a.md": "x"}, "savedAt": "2024-01-01T00:00:00Z"}),
            )
            .await
            .unwrap();
        assert!(matches!(
            load_workspace(&store).await,
            Err(PersistError::Vfs(VfsError::InvalidPath { .. }))
        ));
    }
}
