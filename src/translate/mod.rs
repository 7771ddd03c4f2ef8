//! Generic source-to-target translation.
//!
//! Source records are serialized to JSON values and walked node by node.
//! Every copied node gets its snake_case key rewritten to the target's
//! camelCase key and a translation recorded from its source path to its
//! target path. Custom translators registered for a source path pattern take
//! over whole subtrees; skipped paths are left to the passes that own them.

use anyhow::Context;
use butane_api::{
    ignition::merge,
    path::{Path, PathPattern, JSON, YAML},
    Report, TranslationSet,
};
use log::trace;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::{error::TranslateError, options::TranslateOptions};

pub(crate) mod mount_units;
pub(crate) mod passwd;
pub(crate) mod resource;
pub(crate) mod systemd;
pub(crate) mod tree;

/// Output of a translation step: the target record, where each of its nodes
/// came from, and what went wrong on the way.
pub type Translation<D> = (D, TranslationSet, Report);

type CustomFn<'a> =
    Box<dyn Fn(&Value, &TranslateOptions) -> Result<Translation<Value>, TranslateError> + 'a>;

/// Walks a source record into a target record.
pub struct Translator<'a> {
    options: &'a TranslateOptions,
    skips: Vec<PathPattern>,
    customs: Vec<(PathPattern, CustomFn<'a>)>,
}

impl<'a> Translator<'a> {
    pub fn new(options: &'a TranslateOptions) -> Self {
        Self {
            options,
            skips: Vec::new(),
            customs: Vec::new(),
        }
    }

    /// Leaves source nodes matching `pattern` untranslated.
    pub fn skip(mut self, pattern: &str) -> Self {
        self.skips.push(PathPattern::new(pattern));
        self
    }

    /// Translates source nodes matching `pattern` with `f` instead of walking
    /// them. Paths in the returned translation set and report are relative to
    /// the matched node.
    pub fn custom<S, D, F>(mut self, pattern: &str, f: F) -> Self
    where
        S: DeserializeOwned,
        D: Serialize,
        F: Fn(S, &TranslateOptions) -> Result<Translation<D>, TranslateError> + 'a,
    {
        let name = pattern.to_string();
        let custom = move |value: &Value, options: &TranslateOptions| {
            let source: S = serde_json::from_value(value.clone())
                .with_context(|| format!("Failed to read source node at {name}"))?;
            let (dest, ts, r) = f(source, options)?;
            let dest = serde_json::to_value(dest)
                .with_context(|| format!("Failed to write target node for {name}"))?;
            Ok((dest, ts, r))
        };
        self.customs
            .push((PathPattern::new(pattern), Box::new(custom)));
        self
    }

    /// Translates `source` into a `D`. Translations of nodes that do not
    /// survive into `D` are dropped.
    pub fn translate<S, D>(&self, source: &S) -> Result<Translation<D>, TranslateError>
    where
        S: Serialize,
        D: Serialize + DeserializeOwned,
    {
        let value = serde_json::to_value(source).context("Failed to serialize source config")?;
        let mut ts = TranslationSet::new(YAML, JSON);
        let mut r = Report::new();
        let translated = self
            .walk(&value, &Path::root(YAML), &Path::root(JSON), &mut ts, &mut r)?
            .unwrap_or(Value::Object(Map::new()));

        let dest: D =
            serde_json::from_value(translated).context("Failed to build target config")?;
        ts.retain_present(&serde_json::to_value(&dest).context("Failed to serialize target")?);
        Ok((dest, ts, r))
    }

    fn walk(
        &self,
        value: &Value,
        from: &Path,
        to: &Path,
        ts: &mut TranslationSet,
        r: &mut Report,
    ) -> Result<Option<Value>, TranslateError> {
        if value.is_null() || self.skips.iter().any(|skip| skip.matches(from)) {
            return Ok(None);
        }

        if let Some((pattern, custom)) = self.customs.iter().find(|(p, _)| p.matches(from)) {
            trace!("Translating {from} with custom translator for {pattern}");
            let (dest, custom_ts, custom_r) = custom(value, self.options)?;
            ts.merge(custom_ts.prefix(from, to));
            r.merge(custom_r.prefixed(from));
            ts.add(from.clone(), to.clone());
            return Ok(Some(dest));
        }

        let dest = match value {
            Value::Object(map) => {
                let mut dest = Map::new();
                for (key, child) in map {
                    let name = json_name(key);
                    let child_to = to.append(name.as_str());
                    if let Some(translated) =
                        self.walk(child, &from.append(key.as_str()), &child_to, ts, r)?
                    {
                        dest.insert(name, translated);
                    }
                }
                Value::Object(dest)
            }
            Value::Array(items) => {
                let mut dest = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let translated = self
                        .walk(item, &from.append(i), &to.append(dest.len()), ts, r)?
                        .unwrap_or(Value::Null);
                    dest.push(translated);
                }
                Value::Array(dest)
            }
            leaf => leaf.clone(),
        };
        if !from.is_empty() {
            ts.add(from.clone(), to.clone());
        }
        Ok(Some(dest))
    }
}

/// Target key of a source key: `size_mib` becomes `sizeMiB`, everything else
/// is plain camelCase.
pub(crate) fn json_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for (i, word) in key.split('_').enumerate() {
        if i == 0 {
            name.push_str(word);
        } else if word == "mib" {
            name.push_str("MiB");
        } else {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                name.extend(first.to_uppercase());
                name.push_str(chars.as_str());
            }
        }
    }
    name
}

/// Merges a synthesized partial config under `target` and moves both
/// translation sets onto the result. User values in `target` win.
pub(crate) fn merge_parent<T>(
    target: T,
    ts: TranslationSet,
    parent: Value,
    parent_ts: TranslationSet,
) -> Result<(T, TranslationSet), TranslateError>
where
    T: Serialize + DeserializeOwned,
{
    let child = serde_json::to_value(&target).context("Failed to serialize config for merge")?;
    let merged = merge::merge(&parent, &child);
    let mut ts = merged.map_translations(&parent_ts, &ts);
    let target: T =
        serde_json::from_value(merged.value).context("Failed to read merged config")?;
    ts.retain_present(&serde_json::to_value(&target).context("Failed to serialize merged config")?);
    Ok((target, ts))
}

/// Records `ignition.version` and attributes it to the source `version`.
pub(crate) fn add_version_translations(ts: &mut TranslationSet, prefix: &Path) {
    let version = Path::root(YAML).append("version");
    ts.add(version.clone(), prefix.append("ignition"));
    ts.add(version, prefix.append("ignition").append("version"));
}
