use std::{
    collections::{BTreeMap, HashMap},
    fmt::{self, Display},
};

use log::{trace, warn};
use serde::Serialize;
use serde_json::Value;

use crate::{
    path::{Path, PathElement},
    report::Report,
};

/// Records that the target node at `to` was produced from the source node at
/// `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Translation {
    pub from: Path,
    pub to: Path,
}

impl Display for Translation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} -> {}:{}", self.from.tag(), self.from, self.to.tag(), self.to)
    }
}

/// Returned by [`TranslationSet::debug_verify_coverage`] when target nodes have
/// no recorded provenance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no translation recorded for target paths: {}", .missing.join(", "))]
pub struct MissingTranslations {
    pub missing: Vec<String>,
}

/// Provenance map from target paths back to source paths. Holds at most one
/// translation per target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationSet {
    from_tag: &'static str,
    to_tag: &'static str,
    set: BTreeMap<String, Translation>,
}

impl TranslationSet {
    pub fn new(from_tag: &'static str, to_tag: &'static str) -> Self {
        Self {
            from_tag,
            to_tag,
            set: BTreeMap::new(),
        }
    }

    pub fn from_tag(&self) -> &'static str {
        self.from_tag
    }

    pub fn to_tag(&self) -> &'static str {
        self.to_tag
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Translation> {
        self.set.values()
    }

    pub fn get(&self, to: &Path) -> Option<&Translation> {
        self.set.get(&to.to_string())
    }

    /// Records `from -> to`, replacing any earlier translation for `to`.
    pub fn add(&mut self, from: Path, to: Path) {
        debug_assert_eq!(from.tag(), self.from_tag, "source tag mismatch for {from}");
        debug_assert_eq!(to.tag(), self.to_tag, "target tag mismatch for {to}");
        self.set.insert(to.to_string(), Translation { from, to });
    }

    /// Attributes every node of `to` (rooted at `to_prefix`) to the single
    /// source position `common`. Used when a whole subtree is synthesized from
    /// one source point.
    pub fn add_from_common_source(&mut self, common: &Path, to_prefix: &Path, to: &Value) {
        if to.is_null() {
            return;
        }
        self.add(common.clone(), to_prefix.clone());
        match to {
            Value::Object(map) => {
                for (key, child) in map {
                    self.add_from_common_source(common, &to_prefix.append(key), child);
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    self.add_from_common_source(common, &to_prefix.append(index), child);
                }
            }
            _ => {}
        }
    }

    /// Adds every translation of `other`; entries of `other` win on conflict.
    pub fn merge(&mut self, other: TranslationSet) {
        debug_assert_eq!(self.from_tag, other.from_tag);
        debug_assert_eq!(self.to_tag, other.to_tag);
        self.set.extend(other.set);
    }

    /// Returns a copy with `from_prefix` prepended to every source path and
    /// `to_prefix` prepended to every target path.
    pub fn prefix(&self, from_prefix: &Path, to_prefix: &Path) -> Self {
        let mut ret = Self::new(self.from_tag, self.to_tag);
        for t in self.set.values() {
            ret.add(from_prefix.join(&t.from), to_prefix.join(&t.to));
        }
        ret
    }

    /// Keeps only the translations whose target lies under `to_prefix` and
    /// strips that prefix from them.
    pub fn descend(&self, to_prefix: &Path) -> Self {
        let mut ret = Self::new(self.from_tag, self.to_tag);
        for t in self.set.values() {
            if let Some(to) = t.to.strip_prefix(to_prefix) {
                ret.add(t.from.clone(), to);
            }
        }
        ret
    }

    /// Rewrites target paths through `rewrites`, a set mapping current target
    /// paths to new target paths. Translations whose target is not rewritten
    /// are kept as they are.
    pub fn map(&self, rewrites: &TranslationSet) -> Self {
        let index: HashMap<String, &Path> = rewrites
            .set
            .values()
            .map(|t| (t.from.to_string(), &t.to))
            .collect();
        let mut ret = Self::new(self.from_tag, self.to_tag);
        for t in self.set.values() {
            let to = match index.get(&t.to.to_string()) {
                Some(to) => to.retag(self.to_tag),
                None => t.to.clone(),
            };
            ret.add(t.from.clone(), to);
        }
        ret
    }

    /// Drops translations whose target node is absent or null in `target`.
    pub fn retain_present(&mut self, target: &Value) {
        self.set.retain(|_, t| {
            target
                .pointer(&t.to.to_pointer())
                .is_some_and(|value| !value.is_null())
        });
    }

    /// Finds the translation of `to` or of its nearest ancestor that has one.
    pub fn nearest(&self, to: &Path) -> Option<&Translation> {
        let mut current = Some(to.clone());
        while let Some(p) = current {
            if let Some(t) = self.get(&p) {
                return Some(t);
            }
            current = p.parent();
        }
        None
    }

    /// Rewrites every entry of `report` that points into the target document
    /// so that it points at the source position that produced it. Entries
    /// without any recorded ancestor keep their target path.
    pub fn translate_report(&self, mut report: Report) -> Report {
        for entry in &mut report.entries {
            if entry.context.tag() != self.to_tag {
                continue;
            }
            match self.nearest(&entry.context) {
                Some(t) => {
                    trace!("Rewriting report path {} to {}", entry.context, t.from);
                    entry.context = t.from.clone();
                }
                None => warn!("Missing translation for {}", entry.context),
            }
        }
        report
    }

    /// Checks that every non-zero node of `target` has a translation. Zero
    /// values (null, false, 0, empty strings, lists and records) are exempt.
    pub fn debug_verify_coverage(&self, target: &Value) -> Result<(), MissingTranslations> {
        let mut missing = Vec::new();
        self.collect_missing(&Path::root(self.to_tag), target, &mut missing);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MissingTranslations { missing })
        }
    }

    fn collect_missing(&self, at: &Path, value: &Value, missing: &mut Vec<String>) {
        if is_zero(value) {
            return;
        }
        if !at.is_empty() && self.get(at).is_none() {
            missing.push(at.to_string());
        }
        let children: Vec<(PathElement, &Value)> = match value {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| (PathElement::from(k), v))
                .collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (PathElement::from(i), v))
                .collect(),
            _ => Vec::new(),
        };
        for (element, child) in children {
            self.collect_missing(&at.append(element), child, missing);
        }
    }
}

impl Display for TranslationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in self.set.values() {
            writeln!(f, "{t}")?;
        }
        Ok(())
    }
}

/// Whether `value` is the zero value of its kind.
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
