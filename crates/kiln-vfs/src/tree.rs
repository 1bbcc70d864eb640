//! Hierarchical view of the flat VFS.
//!
//! The tree is derived on demand and never stored. Directories are
//! synthesized from path prefixes; a directory kept alive only by its
//! `.placeholder` still shows up, but the placeholder itself does not.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::path::{PLACEHOLDER_NAME, segments};
use crate::store::Vfs;

/// A node in the rendered tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    Dir(DirNode),
    File { name: String, path: String },
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Dir(d) => &d.name,
            TreeNode::File { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            TreeNode::Dir(d) => &d.path,
            TreeNode::File { path, .. } => path,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, TreeNode::Dir(_))
    }
}

/// A directory and its sorted children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirNode {
    /// Directory name; empty for the root.
    pub name: String,
    /// Absolute path; `/` for the root.
    pub path: String,
    /// Directories first, then files, each group ordered by name.
    pub children: Vec<TreeNode>,
}

impl DirNode {
    /// Look up a direct child by name.
    pub fn child(&self, name: &str) -> Option<&TreeNode> {
        self.children.iter().find(|c| c.name() == name)
    }

    /// Total number of file nodes below this directory.
    pub fn file_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| match c {
                TreeNode::Dir(d) => d.file_count(),
                TreeNode::File { .. } => 1,
            })
            .sum()
    }
}

/// Intermediate builder: names map to either a subdirectory or a file.
#[derive(Default)]
struct Builder {
    dirs: BTreeMap<String, Builder>,
    files: BTreeMap<String, String>,
}

impl Builder {
    fn into_node(self, name: String, path: String) -> DirNode {
        let mut children = Vec::with_capacity(self.dirs.len() + self.files.len());
        for (child_name, child) in self.dirs {
            let child_path = join(&path, &child_name);
            children.push(TreeNode::Dir(child.into_node(child_name, child_path)));
        }
        for (child_name, child_path) in self.files {
            children.push(TreeNode::File {
                name: child_name,
                path: child_path,
            });
        }
        DirNode {
            name,
            path,
            children,
        }
    }
}

fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Build the directory tree for a VFS.
///
/// Pure and idempotent; safe to call on every refresh.
pub fn build_tree(vfs: &Vfs) -> DirNode {
    let mut root = Builder::default();

    for (path, _) in vfs.iter() {
        let parts: Vec<&str> = segments(path).collect();
        let Some((file_name, dirs)) = parts.split_last() else {
            continue;
        };

        let mut level = &mut root;
        for dir in dirs {
            level = level.dirs.entry((*dir).to_string()).or_default();
        }

        if *file_name == PLACEHOLDER_NAME {
            continue;
        }
        level.files.insert((*file_name).to_string(), path.to_string());
    }

    root.into_node(String::new(), "/".to_string())
}

/// Draw a tree with box-drawing characters, one entry per line.
///
/// Directories carry a trailing `/`. No trailing newline.
pub fn render_tree(root: &DirNode) -> String {
    let mut lines = vec!["/".to_string()];
    render_children(root, "", &mut lines);
    lines.join("\n")
}

fn render_children(dir: &DirNode, prefix: &str, lines: &mut Vec<String>) {
    let count = dir.children.len();
    for (i, child) in dir.children.iter().enumerate() {
        let last = i + 1 == count;
        let branch = if last { "└── " } else { "├── " };
        match child {
            TreeNode::Dir(d) => {
                lines.push(format!("{prefix}{branch}{}/", d.name));
                let extension = if last { "    " } else { "│   " };
                render_children(d, &format!("{prefix}{extension}"), lines);
            }
            TreeNode::File { name, .. } => lines.push(format!("{prefix}{branch}{name}")),
        }
    }
}
