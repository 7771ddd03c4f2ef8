//! Read-only access to the directory that `local` references resolve in.

use std::{
    ffi::OsStr,
    fmt::Debug,
    fs,
    os::unix::fs::PermissionsExt,
    path::{Component, Path, PathBuf},
};

use anyhow::{anyhow, Context, Error};
use log::{debug, trace};
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum FilesDirError {
    #[error("local file path traverses outside the files directory")]
    Escape,

    #[error(transparent)]
    Io(#[from] Error),
}

/// Type of a node found in the files directory. Symlinks are never followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
    Symlink,
    /// Sockets, FIFOs, device nodes.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeMetadata {
    pub kind: NodeKind,
    /// Permission bits, including setuid/setgid/sticky.
    pub mode: u32,
}

impl NodeMetadata {
    pub fn is_executable(&self) -> bool {
        self.mode & 0o111 != 0
    }
}

/// A path inside the files directory, normalized lexically. Constructing one
/// from a path that climbs out of the directory fails before anything is
/// read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalPath(PathBuf);

impl LocalPath {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, FilesDirError> {
        let mut normalized = PathBuf::new();
        for component in path.as_ref().components() {
            match component {
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(FilesDirError::Escape);
                    }
                }
                Component::Normal(name) => normalized.push(name),
            }
        }
        Ok(Self(normalized))
    }

    /// The files directory itself.
    pub fn root() -> Self {
        Self(PathBuf::new())
    }

    /// Appends a single directory entry name.
    pub fn join(&self, name: &str) -> Self {
        Self(self.0.join(name))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Path relative to `base`, if this path lies under it.
    pub fn relative_to(&self, base: &LocalPath) -> Option<&Path> {
        self.0.strip_prefix(&base.0).ok()
    }
}

impl std::fmt::Display for LocalPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Read capability over the files directory.
pub trait FilesDir: Debug + Send + Sync {
    /// Metadata of `path` itself; a symlink is not followed.
    fn metadata(&self, path: &LocalPath) -> Result<NodeMetadata, FilesDirError>;

    /// Contents of the regular file at `path`.
    fn read(&self, path: &LocalPath) -> Result<Vec<u8>, FilesDirError>;

    /// Names of the entries of the directory at `path`, sorted.
    fn read_dir(&self, path: &LocalPath) -> Result<Vec<String>, FilesDirError>;

    /// Literal target of the symlink at `path`.
    fn read_link(&self, path: &LocalPath) -> Result<String, FilesDirError>;

    /// Every node below `root` (excluding `root`), depth first, with entries
    /// of a directory visited in name order.
    fn walk(&self, root: &LocalPath) -> Result<Vec<(LocalPath, NodeMetadata)>, FilesDirError> {
        let mut nodes = Vec::new();
        walk_into(self, root, &mut nodes)?;
        Ok(nodes)
    }
}

fn walk_into<D: FilesDir + ?Sized>(
    dir: &D,
    at: &LocalPath,
    nodes: &mut Vec<(LocalPath, NodeMetadata)>,
) -> Result<(), FilesDirError> {
    for name in dir.read_dir(at)? {
        let child = at.join(&name);
        let metadata = dir.metadata(&child)?;
        nodes.push((child.clone(), metadata));
        if metadata.kind == NodeKind::Directory {
            walk_into(dir, &child, nodes)?;
        }
    }
    Ok(())
}

/// [`FilesDir`] backed by a directory on the host.
#[derive(Debug, Clone)]
pub struct HostFilesDir {
    root: PathBuf,
}

impl HostFilesDir {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, Error> {
        let root = root.as_ref().canonicalize().with_context(|| {
            format!("Failed to open files directory {}", root.as_ref().display())
        })?;
        debug!("Using files directory {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host path of `path`. Symlinks among its ancestors must not lead out of
    /// the root.
    fn resolve(&self, path: &LocalPath) -> Result<PathBuf, FilesDirError> {
        let full = self.root.join(path.as_path());
        if let Some(parent) = full.parent().filter(|_| !path.as_path().as_os_str().is_empty()) {
            let parent = parent
                .canonicalize()
                .with_context(|| format!("Failed to resolve {}", parent.display()))?;
            if !parent.starts_with(&self.root) {
                return Err(FilesDirError::Escape);
            }
        }
        Ok(full)
    }

    /// Like [`Self::resolve`], but follows `path` itself as well.
    fn resolve_followed(&self, path: &LocalPath) -> Result<PathBuf, FilesDirError> {
        let full = self.resolve(path)?;
        let canonical = full
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", full.display()))?;
        if !canonical.starts_with(&self.root) {
            return Err(FilesDirError::Escape);
        }
        Ok(canonical)
    }
}

fn node_metadata(metadata: &fs::Metadata) -> NodeMetadata {
    let file_type = metadata.file_type();
    let kind = if file_type.is_symlink() {
        NodeKind::Symlink
    } else if file_type.is_dir() {
        NodeKind::Directory
    } else if file_type.is_file() {
        NodeKind::File
    } else {
        NodeKind::Other
    };
    NodeMetadata {
        kind,
        mode: metadata.permissions().mode() & 0o7777,
    }
}

impl FilesDir for HostFilesDir {
    fn metadata(&self, path: &LocalPath) -> Result<NodeMetadata, FilesDirError> {
        let full = self.resolve(path)?;
        let metadata = fs::symlink_metadata(&full)
            .with_context(|| format!("Failed to stat {}", full.display()))?;
        Ok(node_metadata(&metadata))
    }

    fn read(&self, path: &LocalPath) -> Result<Vec<u8>, FilesDirError> {
        let full = self.resolve_followed(path)?;
        trace!("Reading {}", full.display());
        Ok(fs::read(&full).with_context(|| format!("Failed to read {}", full.display()))?)
    }

    fn read_dir(&self, path: &LocalPath) -> Result<Vec<String>, FilesDirError> {
        let full = self.resolve_followed(path)?;
        let mut names = Vec::new();
        for entry in fs::read_dir(&full)
            .with_context(|| format!("Failed to read directory {}", full.display()))?
        {
            let entry = entry
                .with_context(|| format!("Failed to read directory {}", full.display()))?;
            names.push(utf8(&entry.file_name(), &entry.path())?);
        }
        names.sort();
        Ok(names)
    }

    fn read_link(&self, path: &LocalPath) -> Result<String, FilesDirError> {
        let full = self.resolve(path)?;
        let target = fs::read_link(&full)
            .with_context(|| format!("Failed to read link {}", full.display()))?;
        utf8(target.as_os_str(), &full)
    }

    fn walk(&self, root: &LocalPath) -> Result<Vec<(LocalPath, NodeMetadata)>, FilesDirError> {
        let start = self.resolve_followed(root)?;
        let mut nodes = Vec::new();
        for entry in WalkDir::new(&start)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry =
                entry.with_context(|| format!("Failed to walk {}", start.display()))?;
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|_| FilesDirError::Escape)?;
            utf8(relative.as_os_str(), entry.path())?;
            let metadata = entry
                .metadata()
                .with_context(|| format!("Failed to stat {}", entry.path().display()))?;
            nodes.push((LocalPath::new(relative)?, node_metadata(&metadata)));
        }
        Ok(nodes)
    }
}

/// `name` as UTF-8. Names that are not fail rather than being replaced.
fn utf8(name: &OsStr, at: &Path) -> Result<String, FilesDirError> {
    name.to_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{} is not valid UTF-8", at.display()).into())
}
