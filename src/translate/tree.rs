//! Expansion of `storage.trees` into files, directories and links.

use std::collections::HashSet;

use anyhow::Context;
use butane_api::{
    config::base::v0_5,
    error::TranslationError,
    ignition::v3_4,
    path::{Path, JSON, YAML},
    Report, TranslationSet,
};
use log::debug;
use osutils::files_dir::{FilesDirError, LocalPath, NodeKind};
use serde::Serialize;

use crate::{error::TranslateError, options::TranslateOptions, translate::resource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    File,
    Directory,
    Link,
}

fn node_owner(owner: &v0_5::Owner) -> v3_4::NodeOwner {
    v3_4::NodeOwner {
        id: owner.id,
        name: owner.name.clone(),
    }
}

/// Destination of `relative` below the tree's `path`.
fn target_path(prefix: &str, relative: &std::path::Path) -> String {
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        relative.to_string_lossy()
    )
}

fn storage_path() -> Path {
    Path::root(JSON).append("storage")
}

fn report_files_dir_error(e: FilesDirError, local: &str, c: &Path, r: &mut Report) {
    match e {
        FilesDirError::Escape => r.add_error(c.clone(), TranslationError::FilesDirEscape),
        FilesDirError::Io(e) => r.add_error(
            c.clone(),
            TranslationError::ReadLocal {
                path: local.to_string(),
                reason: format!("{e:#}"),
            },
        ),
    }
}

/// Tracks which paths trees created and records the provenance of what they
/// add to the target storage.
struct TreeExpander<'a, L> {
    storage: &'a mut v3_4::Storage<L>,
    ts: &'a mut TranslationSet,
    created: HashSet<String>,
}

impl<'a, L> TreeExpander<'a, L> {
    /// Kind of the user or tree node already at `path`, if any.
    fn existing(&self, path: &str) -> Option<(Kind, usize)> {
        if let Some(i) = self.storage.files.iter().position(|f| f.path == path) {
            return Some((Kind::File, i));
        }
        if let Some(i) = self.storage.directories.iter().position(|d| d.path == path) {
            return Some((Kind::Directory, i));
        }
        self.storage
            .links
            .iter()
            .position(|l| l.path == path)
            .map(|i| (Kind::Link, i))
    }

    fn add_node<T: Serialize>(&mut self, c: &Path, list: &str, index: usize, node: &T) -> Result<(), TranslateError> {
        let value = serde_json::to_value(node).context("Failed to serialize tree node")?;
        let list_path = storage_path().append(list);
        if self.ts.get(&storage_path()).is_none() {
            self.ts.add(c.clone(), storage_path());
        }
        if self.ts.get(&list_path).is_none() {
            self.ts.add(c.clone(), list_path.clone());
        }
        self.ts
            .add_from_common_source(c, &list_path.append(index), &value);
        Ok(())
    }

    fn file(
        &mut self,
        c: &Path,
        tree: &v0_5::Tree,
        path: String,
        contents: v3_4::Resource,
        mode: i32,
        r: &mut Report,
    ) -> Result<(), TranslateError> {
        match self.existing(&path) {
            None => {
                let file = v3_4::File {
                    path: path.clone(),
                    contents,
                    mode: Some(mode),
                    user: node_owner(&tree.user),
                    group: node_owner(&tree.group),
                    ..Default::default()
                };
                let index = self.storage.files.len();
                self.add_node(c, "files", index, &file)?;
                self.storage.files.push(file);
            }
            Some((Kind::File, i))
                if !self.created.contains(&path) && self.storage.files[i].contents.source.is_none() =>
            {
                let at = storage_path().append("files").append(i);
                let file = &mut self.storage.files[i];
                let value = serde_json::to_value(&contents).context("Failed to serialize tree node")?;
                file.contents = contents;
                self.ts.add_from_common_source(c, &at.append("contents"), &value);
                if file.mode.is_none() {
                    file.mode = Some(mode);
                    self.ts.add(c.clone(), at.append("mode"));
                }
                fill_owner(&mut file.user, &tree.user, c, &at.append("user"), self.ts)?;
                fill_owner(&mut file.group, &tree.group, c, &at.append("group"), self.ts)?;
            }
            Some(_) => {
                r.add_error(c.clone(), TranslationError::NodeExists);
                return Ok(());
            }
        }
        self.created.insert(path);
        Ok(())
    }

    fn link(
        &mut self,
        c: &Path,
        tree: &v0_5::Tree,
        path: String,
        target: String,
        r: &mut Report,
    ) -> Result<(), TranslateError> {
        match self.existing(&path) {
            None => {
                let link = v3_4::Link {
                    path: path.clone(),
                    target: Some(target),
                    user: node_owner(&tree.user),
                    group: node_owner(&tree.group),
                    ..Default::default()
                };
                let index = self.storage.links.len();
                self.add_node(c, "links", index, &link)?;
                self.storage.links.push(link);
            }
            Some((Kind::Link, i))
                if !self.created.contains(&path) && self.storage.links[i].target.is_none() =>
            {
                let at = storage_path().append("links").append(i);
                let link = &mut self.storage.links[i];
                link.target = Some(target);
                self.ts.add(c.clone(), at.append("target"));
                fill_owner(&mut link.user, &tree.user, c, &at.append("user"), self.ts)?;
                fill_owner(&mut link.group, &tree.group, c, &at.append("group"), self.ts)?;
            }
            Some(_) => {
                r.add_error(c.clone(), TranslationError::NodeExists);
                return Ok(());
            }
        }
        self.created.insert(path);
        Ok(())
    }

    fn directory(
        &mut self,
        c: &Path,
        tree: &v0_5::Tree,
        path: String,
        r: &mut Report,
    ) -> Result<(), TranslateError> {
        let existing = self.existing(&path);
        if matches!(existing, Some((Kind::File | Kind::Link, _))) {
            r.add_error(c.clone(), TranslationError::NodeExists);
            return Ok(());
        }
        let Some(mode) = tree.dir_mode else {
            return Ok(());
        };
        match existing {
            Some((_, i)) => {
                let at = storage_path().append("directories").append(i);
                let directory = &mut self.storage.directories[i];
                if directory.mode.is_none() {
                    directory.mode = Some(mode);
                    self.ts.add(c.clone(), at.append("mode"));
                }
                fill_owner(&mut directory.user, &tree.user, c, &at.append("user"), self.ts)?;
                fill_owner(&mut directory.group, &tree.group, c, &at.append("group"), self.ts)?;
            }
            None => {
                let directory = v3_4::Directory {
                    path: path.clone(),
                    mode: Some(mode),
                    user: node_owner(&tree.user),
                    group: node_owner(&tree.group),
                    ..Default::default()
                };
                let index = self.storage.directories.len();
                self.add_node(c, "directories", index, &directory)?;
                self.storage.directories.push(directory);
            }
        }
        self.created.insert(path);
        Ok(())
    }
}

/// Sets an owner the user left empty from the tree's owner.
fn fill_owner(
    owner: &mut v3_4::NodeOwner,
    tree_owner: &v0_5::Owner,
    c: &Path,
    at: &Path,
    ts: &mut TranslationSet,
) -> Result<(), TranslateError> {
    if *owner != v3_4::NodeOwner::default() || *tree_owner == v0_5::Owner::default() {
        return Ok(());
    }
    *owner = node_owner(tree_owner);
    let value = serde_json::to_value(&*owner).context("Failed to serialize owner")?;
    ts.add_from_common_source(c, at, &value);
    Ok(())
}

/// Expands every tree into `storage`. Tree nodes fill in user-declared nodes
/// of the same kind that have no contents or target of their own.
pub(crate) fn process_trees<L>(
    trees: &[v0_5::Tree],
    storage: &mut v3_4::Storage<L>,
    ts: &mut TranslationSet,
    options: &TranslateOptions,
) -> Result<Report, TranslateError> {
    let mut r = Report::new();
    let mut expander = TreeExpander {
        storage,
        ts,
        created: HashSet::new(),
    };

    for (i, tree) in trees.iter().enumerate() {
        let c = Path::root(YAML).append("storage").append("trees").append(i);
        let local_c = c.append("local");
        if tree.local.is_empty() {
            continue;
        }
        let Some(files_dir) = &options.files_dir else {
            r.add_error(local_c, TranslationError::NoFilesDir);
            continue;
        };
        let root = match LocalPath::new(&tree.local) {
            Ok(root) => root,
            Err(e) => {
                report_files_dir_error(e, &tree.local, &local_c, &mut r);
                continue;
            }
        };
        match files_dir.metadata(&root) {
            Ok(metadata) if metadata.kind == NodeKind::Directory => {}
            Ok(_) => {
                r.add_error(local_c, TranslationError::TreeNotDirectory);
                continue;
            }
            Err(e) => {
                report_files_dir_error(e, &tree.local, &local_c, &mut r);
                continue;
            }
        }
        let nodes = match files_dir.walk(&root) {
            Ok(nodes) => nodes,
            Err(e) => {
                report_files_dir_error(e, &tree.local, &local_c, &mut r);
                continue;
            }
        };

        let prefix = tree.path.as_deref().unwrap_or("/");
        debug!("Expanding tree '{}' into '{prefix}'", tree.local);
        for (node, metadata) in nodes {
            let Some(relative) = node.relative_to(&root) else {
                continue;
            };
            let path = target_path(prefix, relative);
            match metadata.kind {
                NodeKind::File => {
                    let data = match files_dir.read(&node) {
                        Ok(data) => data,
                        Err(e) => {
                            report_files_dir_error(e, &node.to_string(), &local_c, &mut r);
                            continue;
                        }
                    };
                    let encoded =
                        resource::encode(&data, None, !options.no_resource_auto_compression)?;
                    let contents = v3_4::Resource {
                        source: Some(encoded.source),
                        compression: encoded.compression,
                        ..Default::default()
                    };
                    let mode = tree.file_mode.unwrap_or(if metadata.is_executable() {
                        0o755
                    } else {
                        0o644
                    });
                    expander.file(&c, tree, path, contents, mode, &mut r)?;
                }
                NodeKind::Symlink => {
                    let target = match files_dir.read_link(&node) {
                        Ok(target) => target,
                        Err(e) => {
                            report_files_dir_error(e, &node.to_string(), &local_c, &mut r);
                            continue;
                        }
                    };
                    expander.link(&c, tree, path, target, &mut r)?;
                }
                NodeKind::Directory => expander.directory(&c, tree, path, &mut r)?,
                NodeKind::Other => r.add_error(c.clone(), TranslationError::FileType),
            }
        }
    }
    Ok(r)
}
