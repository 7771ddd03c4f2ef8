//! Merging of two Ignition configs, the way the provisioning agent merges a
//! config into the one it extends.
//!
//! Keyed list entries (see [`keys`](super::keys)) are merged field by field,
//! other list entries are appended and child scalars win. Besides the result
//! the merge returns transcripts mapping every parent and child node to its
//! position in the result, so translation sets can follow the move.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::{
    ignition::keys::entry_key,
    path::{Path, JSON},
    translation::TranslationSet,
};

/// Output of [`merge`].
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub value: Value,
    /// Parent node -> result node.
    pub parent: TranslationSet,
    /// Child node -> result node.
    pub child: TranslationSet,
}

impl Merged {
    /// Moves translation sets describing the parent and the child onto the
    /// merged document. Child provenance wins where both sides contributed.
    pub fn map_translations(
        &self,
        parent: &TranslationSet,
        child: &TranslationSet,
    ) -> TranslationSet {
        let mut ret = parent.map(&self.parent);
        ret.merge(child.map(&self.child));
        ret
    }
}

/// Merges `child` over `parent`. Both are Ignition configs as JSON values.
pub fn merge(parent: &Value, child: &Value) -> Merged {
    let mut merger = Merger {
        parent: TranslationSet::new(JSON, JSON),
        child: TranslationSet::new(JSON, JSON),
    };
    let root = Path::root(JSON);
    let value = merger.merge_node(parent, &root, child, &root, &root);
    Merged {
        value,
        parent: merger.parent,
        child: merger.child,
    }
}

#[derive(Clone, Copy)]
enum Side {
    Parent,
    Child,
}

struct Merger {
    parent: TranslationSet,
    child: TranslationSet,
}

impl Merger {
    fn transcript(&mut self, side: Side) -> &mut TranslationSet {
        match side {
            Side::Parent => &mut self.parent,
            Side::Child => &mut self.child,
        }
    }

    /// Copies a subtree from one side unchanged, recording where each of its
    /// nodes lands.
    fn copy(&mut self, side: Side, value: &Value, from: &Path, to: &Path) -> Value {
        self.transcript(side).add(from.clone(), to.clone());
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    self.copy(side, child, &from.append(key), &to.append(key));
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    self.copy(side, child, &from.append(i), &to.append(i));
                }
            }
            _ => {}
        }
        value.clone()
    }

    fn merge_node(
        &mut self,
        parent: &Value,
        parent_at: &Path,
        child: &Value,
        child_at: &Path,
        at: &Path,
    ) -> Value {
        match (parent, child) {
            (Value::Object(parent_map), Value::Object(child_map)) => {
                self.parent.add(parent_at.clone(), at.clone());
                self.child.add(child_at.clone(), at.clone());
                let mut result = Map::new();
                for (key, parent_value) in parent_map {
                    let value = match child_map.get(key) {
                        Some(child_value) => self.merge_node(
                            parent_value,
                            &parent_at.append(key),
                            child_value,
                            &child_at.append(key),
                            &at.append(key),
                        ),
                        None => self.copy(
                            Side::Parent,
                            parent_value,
                            &parent_at.append(key),
                            &at.append(key),
                        ),
                    };
                    result.insert(key.clone(), value);
                }
                for (key, child_value) in child_map {
                    if !parent_map.contains_key(key) {
                        let value = self.copy(
                            Side::Child,
                            child_value,
                            &child_at.append(key),
                            &at.append(key),
                        );
                        result.insert(key.clone(), value);
                    }
                }
                Value::Object(result)
            }
            (Value::Array(parent_items), Value::Array(child_items)) => {
                self.parent.add(parent_at.clone(), at.clone());
                self.child.add(child_at.clone(), at.clone());
                Value::Array(self.merge_list(parent_items, parent_at, child_items, child_at, at))
            }
            _ => {
                // the parent subtree is replaced as a whole
                self.parent.add(parent_at.clone(), at.clone());
                self.copy(Side::Child, child, child_at, at)
            }
        }
    }

    fn merge_list(
        &mut self,
        parent: &[Value],
        parent_at: &Path,
        child: &[Value],
        child_at: &Path,
        at: &Path,
    ) -> Vec<Value> {
        let mut keyed = HashMap::new();
        for (i, item) in parent.iter().enumerate() {
            if let Some(key) = entry_key(at, item) {
                keyed.entry(key).or_insert(i);
            }
        }

        // parent index -> child index
        let mut matches: HashMap<usize, usize> = HashMap::new();
        let mut appended = Vec::new();
        for (j, item) in child.iter().enumerate() {
            match entry_key(at, item).and_then(|key| keyed.get(&key).copied()) {
                Some(i) if !matches.contains_key(&i) => {
                    matches.insert(i, j);
                }
                _ => appended.push(j),
            }
        }

        let mut result = Vec::with_capacity(parent.len() + appended.len());
        for (i, item) in parent.iter().enumerate() {
            let to = at.append(result.len());
            let value = match matches.get(&i) {
                Some(&j) => self.merge_node(
                    item,
                    &parent_at.append(i),
                    &child[j],
                    &child_at.append(j),
                    &to,
                ),
                None => self.copy(Side::Parent, item, &parent_at.append(i), &to),
            };
            result.push(value);
        }
        for j in appended {
            let to = at.append(result.len());
            let value = self.copy(Side::Child, &child[j], &child_at.append(j), &to);
            result.push(value);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_keyed_merge() {
        let parent = json!({
            "storage": {
                "filesystems": [{"device": "/dev/md/md-root", "format": "xfs", "label": "root"}],
                "files": [{"path": "/a", "mode": 420}]
            },
            "systemd": {"units": [{"name": "var.mount", "enabled": true, "contents": "generated"}]}
        });
        let child = json!({
            "ignition": {"version": "3.4.0"},
            "storage": {
                "filesystems": [{"device": "/dev/md/md-root", "format": "ext4"}],
                "files": [{"path": "/b"}]
            },
            "systemd": {"units": [{"name": "var.mount", "contents": "user"}]}
        });
        let merged = merge(&parent, &child);
        assert_eq!(
            merged.value,
            json!({
                "ignition": {"version": "3.4.0"},
                "storage": {
                    "filesystems": [{"device": "/dev/md/md-root", "format": "ext4", "label": "root"}],
                    "files": [{"path": "/a", "mode": 420}, {"path": "/b"}]
                },
                "systemd": {"units": [{"name": "var.mount", "enabled": true, "contents": "user"}]}
            })
        );

        let moved = |transcript: &TranslationSet, from: Path| {
            transcript
                .iter()
                .find(|t| t.from == from)
                .map(|t| t.to.clone())
        };
        assert_eq!(
            moved(&merged.child, path!(JSON, "storage", "files", 0, "path")),
            Some(path!(JSON, "storage", "files", 1, "path"))
        );
        assert_eq!(
            moved(&merged.parent, path!(JSON, "systemd", "units", 0, "enabled")),
            Some(path!(JSON, "systemd", "units", 0, "enabled"))
        );
    }

    #[test]
    fn test_append_and_scalar_lists() {
        let parent = json!({
            "kernelArguments": {"shouldExist": ["a", "b"]},
            "storage": {"files": [{"path": "/f", "append": [{"source": "data:,1"}]}]}
        });
        let child = json!({
            "kernelArguments": {"shouldExist": ["b", "c"]},
            "storage": {"files": [{"path": "/f", "append": [{"source": "data:,2"}]}]}
        });
        let merged = merge(&parent, &child);
        assert_eq!(merged.value["kernelArguments"]["shouldExist"], json!(["a", "b", "c"]));
        assert_eq!(
            merged.value["storage"]["files"][0]["append"],
            json!([{"source": "data:,1"}, {"source": "data:,2"}])
        );
    }

    #[test]
    fn test_map_translations() {
        let parent = json!({"storage": {"files": [{"path": "/a"}]}});
        let child = json!({"storage": {"files": [{"path": "/b"}, {"path": "/a", "mode": 384}]}});
        let merged = merge(&parent, &child);

        let mut parent_ts = TranslationSet::new(crate::path::YAML, JSON);
        parent_ts.add(
            path!(crate::path::YAML, "trees", 0),
            path!(JSON, "storage", "files", 0, "path"),
        );
        let mut child_ts = TranslationSet::new(crate::path::YAML, JSON);
        child_ts.add(
            path!(crate::path::YAML, "storage", "files", 1, "mode"),
            path!(JSON, "storage", "files", 1, "mode"),
        );
        child_ts.add(
            path!(crate::path::YAML, "storage", "files", 0, "path"),
            path!(JSON, "storage", "files", 0, "path"),
        );

        let ts = merged.map_translations(&parent_ts, &child_ts);
        assert_eq!(
            ts.get(&path!(JSON, "storage", "files", 0, "mode")).unwrap().from,
            path!(crate::path::YAML, "storage", "files", 1, "mode")
        );
        assert_eq!(
            ts.get(&path!(JSON, "storage", "files", 1, "path")).unwrap().from,
            path!(crate::path::YAML, "storage", "files", 0, "path")
        );
    }
}
