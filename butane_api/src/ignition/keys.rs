//! Identity of entries in Ignition's keyed lists. Shared by duplicate
//! detection and by config merging.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use serde_json::Value;

use crate::{
    error::IgnitionError,
    path::{Path, PathElement, PathPattern},
    report::Report,
};

/// How the entries of a list are told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKey {
    /// By the value of one field.
    Field(&'static str),
    /// Partitions: by label, or by number when unlabeled.
    Partition,
}

lazy_static! {
    static ref KEYED_LISTS: Vec<(PathPattern, ListKey)> = [
        ("ignition.config.merge", ListKey::Field("source")),
        ("ignition.security.tls.certificateAuthorities", ListKey::Field("source")),
        ("storage.directories", ListKey::Field("path")),
        ("storage.disks", ListKey::Field("device")),
        ("storage.disks.*.partitions", ListKey::Partition),
        ("storage.files", ListKey::Field("path")),
        ("storage.filesystems", ListKey::Field("device")),
        ("storage.links", ListKey::Field("path")),
        ("storage.luks", ListKey::Field("name")),
        ("storage.luks.*.clevis.tang", ListKey::Field("url")),
        ("storage.raid", ListKey::Field("name")),
        ("systemd.units", ListKey::Field("name")),
        ("systemd.units.*.dropins", ListKey::Field("name")),
        ("passwd.users", ListKey::Field("name")),
        ("passwd.groups", ListKey::Field("name")),
    ]
    .into_iter()
    .map(|(pattern, key)| (PathPattern::new(pattern), key))
    .collect();
}

/// The key rule of the list at `list`, or `None` when its records are never
/// merged (e.g. `storage.files.*.append`).
pub fn list_key(list: &Path) -> Option<ListKey> {
    if list.last() == Some(&PathElement::from("httpHeaders")) {
        return Some(ListKey::Field("name"));
    }
    KEYED_LISTS
        .iter()
        .find(|(pattern, _)| pattern.matches(list))
        .map(|(_, key)| *key)
}

/// Identity of one list entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    /// Field holding the key; `None` for scalar entries keyed by value.
    pub field: Option<&'static str>,
    pub value: String,
}

/// Computes the key of `entry` in the list at `list`. Records in unkeyed
/// lists and records missing their key field have no key.
pub fn entry_key(list: &Path, entry: &Value) -> Option<EntryKey> {
    match entry {
        Value::Object(map) => match list_key(list)? {
            ListKey::Field(field) => map.get(field).and_then(scalar).map(|value| EntryKey {
                field: Some(field),
                value,
            }),
            ListKey::Partition => {
                if let Some(label) = map.get("label").and_then(scalar) {
                    Some(EntryKey {
                        field: Some("label"),
                        value: label,
                    })
                } else {
                    map.get("number")
                        .and_then(scalar)
                        .filter(|number| number != "0")
                        .map(|value| EntryKey {
                            field: Some("number"),
                            value,
                        })
                }
            }
        },
        Value::Array(_) | Value::Null => None,
        _ => scalar(entry).map(|value| EntryKey { field: None, value }),
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Reports records that share a key with an earlier record of the same list,
/// and filesystem nodes whose path is already used by a node of another kind.
pub fn check_duplicates(config: &Value, root: &Path) -> Report {
    let mut r = Report::new();
    walk_lists(config, &Path::root(root.tag()), root, &mut r);
    check_node_conflicts(config, root, &mut r);
    r
}

/// `at` is relative to the Ignition root, which sits at `root` in the
/// reported document.
fn walk_lists(value: &Value, at: &Path, root: &Path, r: &mut Report) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk_lists(child, &at.append(key), root, r);
            }
        }
        Value::Array(items) => {
            let mut seen: HashSet<EntryKey> = HashSet::new();
            for (i, item) in items.iter().enumerate() {
                if let Some(key) = entry_key(at, item) {
                    if let Some(field) = key.field {
                        if !seen.insert(key) {
                            r.add_error(
                                root.join(at).append(i).append(field),
                                IgnitionError::Duplicate,
                            );
                        }
                    }
                }
                walk_lists(item, &at.append(i), root, r);
            }
        }
        _ => {}
    }
}

fn check_node_conflicts(config: &Value, root: &Path, r: &mut Report) {
    let mut owners: HashMap<&str, &str> = HashMap::new();
    for kind in ["files", "directories", "links"] {
        let Some(nodes) = config
            .get("storage")
            .and_then(|s| s.get(kind))
            .and_then(Value::as_array)
        else {
            continue;
        };
        for (i, node) in nodes.iter().enumerate() {
            let Some(path) = node.get("path").and_then(Value::as_str) else {
                continue;
            };
            match owners.get(path) {
                Some(owner) if *owner != kind => r.add_error(
                    root.append("storage").append(kind).append(i).append("path"),
                    IgnitionError::Duplicate,
                ),
                Some(_) => {}
                None => {
                    owners.insert(path, kind);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::path::JSON;

    #[test]
    fn test_list_key() {
        assert_eq!(
            list_key(&path!(JSON, "storage", "files")),
            Some(ListKey::Field("path"))
        );
        assert_eq!(
            list_key(&path!(JSON, "storage", "disks", 1, "partitions")),
            Some(ListKey::Partition)
        );
        assert_eq!(
            list_key(&path!(JSON, "storage", "files", 0, "contents", "httpHeaders")),
            Some(ListKey::Field("name"))
        );
        assert_eq!(list_key(&path!(JSON, "storage", "files", 0, "append")), None);
    }

    #[test]
    fn test_entry_key() {
        let partitions = path!(JSON, "storage", "disks", 0, "partitions");
        assert_eq!(
            entry_key(&partitions, &json!({"label": "root", "number": 4})),
            Some(EntryKey {
                field: Some("label"),
                value: "root".into()
            })
        );
        assert_eq!(
            entry_key(&partitions, &json!({"number": 4})).map(|k| k.value),
            Some("4".to_string())
        );
        assert_eq!(entry_key(&partitions, &json!({"sizeMiB": 10})), None);

        let args = path!(JSON, "kernelArguments", "shouldExist");
        assert_eq!(
            entry_key(&args, &json!("quiet")),
            Some(EntryKey {
                field: None,
                value: "quiet".into()
            })
        );
    }

    #[test]
    fn test_check_duplicates() {
        let config = json!({
            "storage": {
                "files": [{"path": "/a"}, {"path": "/b"}, {"path": "/a"}],
                "directories": [{"path": "/b"}],
                "links": [{"path": "/c", "target": "/a"}]
            },
            "systemd": {
                "units": [{"name": "a.service", "dropins": [{"name": "x.conf"}, {"name": "x.conf"}]}]
            }
        });
        let r = check_duplicates(&config, &Path::root(JSON));
        let paths: Vec<String> = r.entries.iter().map(|e| e.context.to_string()).collect();
        assert_eq!(
            paths,
            vec![
                "$.storage.files.2.path",
                "$.systemd.units.0.dropins.1.name",
                "$.storage.directories.0.path",
            ]
        );
    }
}
