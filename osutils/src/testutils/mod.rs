//! In-memory [`FilesDir`](crate::files_dir::FilesDir) for tests.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::anyhow;

use crate::files_dir::{FilesDir, FilesDirError, LocalPath, NodeKind, NodeMetadata};

#[derive(Debug, Clone)]
enum Node {
    File { contents: Vec<u8>, mode: u32 },
    Directory { mode: u32 },
    Symlink { target: String },
    Fifo,
}

/// A files directory held in memory. Parent directories are created
/// implicitly. Every access is logged so tests can assert on it.
#[derive(Debug, Default)]
pub struct MemoryFilesDir {
    nodes: BTreeMap<PathBuf, Node>,
    accessed: Mutex<Vec<PathBuf>>,
}

impl MemoryFilesDir {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(mut self, path: &str, node: Node) -> Self {
        let path = PathBuf::from(path.trim_start_matches('/'));
        for ancestor in path.ancestors().skip(1) {
            if !ancestor.as_os_str().is_empty() {
                self.nodes
                    .entry(ancestor.to_path_buf())
                    .or_insert(Node::Directory { mode: 0o755 });
            }
        }
        self.nodes.insert(path, node);
        self
    }

    pub fn file(self, path: &str, contents: impl Into<Vec<u8>>, mode: u32) -> Self {
        self.insert(
            path,
            Node::File {
                contents: contents.into(),
                mode,
            },
        )
    }

    pub fn dir(self, path: &str, mode: u32) -> Self {
        self.insert(path, Node::Directory { mode })
    }

    pub fn symlink(self, path: &str, target: &str) -> Self {
        self.insert(
            path,
            Node::Symlink {
                target: target.into(),
            },
        )
    }

    pub fn fifo(self, path: &str) -> Self {
        self.insert(path, Node::Fifo)
    }

    /// Paths accessed so far, in order.
    pub fn accessed(&self) -> Vec<PathBuf> {
        self.accessed
            .lock()
            .map(|accessed| accessed.clone())
            .unwrap_or_default()
    }

    fn lookup(&self, path: &LocalPath) -> Result<&Node, FilesDirError> {
        if let Ok(mut accessed) = self.accessed.lock() {
            accessed.push(path.as_path().to_path_buf());
        }
        self.nodes
            .get(path.as_path())
            .ok_or_else(|| anyhow!("{}: no such file or directory", path).into())
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.as_os_str().is_empty() || matches!(self.nodes.get(path), Some(Node::Directory { .. }))
    }
}

impl FilesDir for MemoryFilesDir {
    fn metadata(&self, path: &LocalPath) -> Result<NodeMetadata, FilesDirError> {
        if path.as_path().as_os_str().is_empty() {
            return Ok(NodeMetadata {
                kind: NodeKind::Directory,
                mode: 0o755,
            });
        }
        Ok(match self.lookup(path)? {
            Node::File { mode, .. } => NodeMetadata {
                kind: NodeKind::File,
                mode: *mode,
            },
            Node::Directory { mode } => NodeMetadata {
                kind: NodeKind::Directory,
                mode: *mode,
            },
            Node::Symlink { .. } => NodeMetadata {
                kind: NodeKind::Symlink,
                mode: 0o777,
            },
            Node::Fifo => NodeMetadata {
                kind: NodeKind::Other,
                mode: 0o644,
            },
        })
    }

    fn read(&self, path: &LocalPath) -> Result<Vec<u8>, FilesDirError> {
        match self.lookup(path)? {
            Node::File { contents, .. } => Ok(contents.clone()),
            _ => Err(anyhow!("{path}: not a regular file").into()),
        }
    }

    fn read_dir(&self, path: &LocalPath) -> Result<Vec<String>, FilesDirError> {
        if !path.as_path().as_os_str().is_empty() {
            self.lookup(path)?;
        }
        if !self.is_dir(path.as_path()) {
            return Err(anyhow!("{path}: not a directory").into());
        }
        Ok(self
            .nodes
            .keys()
            .filter(|candidate| candidate.parent() == Some(path.as_path()))
            .filter_map(|candidate| candidate.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    fn read_link(&self, path: &LocalPath) -> Result<String, FilesDirError> {
        match self.lookup(path)? {
            Node::Symlink { target } => Ok(target.clone()),
            _ => Err(anyhow!("{path}: not a symlink").into()),
        }
    }
}
