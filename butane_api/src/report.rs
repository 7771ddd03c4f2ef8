use std::{
    collections::HashMap,
    fmt::{self, Display},
};

use serde::Serialize;

use crate::path::Path;

/// Severity of a [`Report`] entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "lowercase")]
pub enum EntryKind {
    Error,
    #[strum(serialize = "warning")]
    Warn,
    Info,
}

/// Position of a node in the source text. Both fields are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Marker {
    pub line: usize,
    pub column: usize,
}

/// A single diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub kind: EntryKind,
    pub message: String,
    pub context: Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
}

impl Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.context)?;
        if let Some(marker) = self.marker {
            write!(f, ", line {} col {}", marker.line, marker.column)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Source positions of every node in a decoded document, keyed by the node's
/// path string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationMap {
    markers: HashMap<String, Marker>,
}

impl LocationMap {
    pub fn insert(&mut self, path: &Path, marker: Marker) {
        self.markers.insert(path.to_string(), marker);
    }

    pub fn get(&self, path: &Path) -> Option<Marker> {
        self.markers.get(&path.to_string()).copied()
    }

    /// Marker of `path`, or of its nearest ancestor with a known position.
    pub fn nearest(&self, path: &Path) -> Option<Marker> {
        let mut current = Some(path.clone());
        while let Some(p) = current {
            if let Some(marker) = self.get(&p) {
                return Some(marker);
            }
            current = p.parent();
        }
        None
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Ordered list of diagnostics accumulated over a translation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub entries: Vec<Entry>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, kind: EntryKind, context: Path, message: impl Display) {
        self.entries.push(Entry {
            kind,
            message: message.to_string(),
            context,
            marker: None,
        });
    }

    pub fn add_error(&mut self, context: Path, message: impl Display) {
        self.add(EntryKind::Error, context, message);
    }

    pub fn add_warn(&mut self, context: Path, message: impl Display) {
        self.add(EntryKind::Warn, context, message);
    }

    pub fn add_info(&mut self, context: Path, message: impl Display) {
        self.add(EntryKind::Info, context, message);
    }

    /// Appends every entry of `other`.
    pub fn merge(&mut self, other: Report) {
        self.entries.extend(other.entries);
    }

    pub fn is_fatal(&self) -> bool {
        self.entries.iter().any(|e| e.kind == EntryKind::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.entries.iter().any(|e| e.kind == EntryKind::Warn)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebases every entry whose path uses `prefix`'s tag under `prefix`.
    pub fn prefixed(mut self, prefix: &Path) -> Self {
        for entry in &mut self.entries {
            if entry.context.tag() == prefix.tag() {
                entry.context = prefix.join(&entry.context);
            }
        }
        self
    }

    /// Attaches source markers to every entry whose path is in the source
    /// surface of `locations`.
    pub fn correlate(&mut self, tag: &str, locations: &LocationMap) {
        for entry in &mut self.entries {
            if entry.marker.is_none() && entry.context.tag() == tag {
                entry.marker = locations.nearest(&entry.context);
            }
        }
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{JSON, YAML};

    #[test]
    fn test_fatality() {
        let mut r = Report::new();
        assert!(!r.is_fatal());
        r.add_warn(path!(YAML, "a"), "careful");
        r.add_info(path!(YAML, "b"), "fyi");
        assert!(!r.is_fatal());
        assert!(r.has_warnings());
        r.add_error(path!(YAML, "c"), "broken");
        assert!(r.is_fatal());
    }

    #[test]
    fn test_merge_preserves_order() {
        let mut first = Report::new();
        first.add_error(path!(YAML, "a"), "one");
        let mut second = Report::new();
        second.add_warn(path!(YAML, "b"), "two");
        second.add_info(path!(YAML, "c"), "three");
        first.merge(second);
        let messages: Vec<_> = first.entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_display() {
        let mut r = Report::new();
        r.add_error(path!(YAML, "storage", "files", 0, "path"), "path not absolute");
        assert_eq!(
            r.to_string(),
            "error at $.storage.files.0.path: path not absolute\n"
        );
        r.entries[0].marker = Some(Marker { line: 4, column: 7 });
        assert_eq!(
            r.to_string(),
            "error at $.storage.files.0.path, line 4 col 7: path not absolute\n"
        );
        assert_eq!(EntryKind::Warn.to_string(), "warning");
        assert_eq!(EntryKind::Info.to_string(), "info");
    }

    #[test]
    fn test_prefixed_only_touches_matching_tag() {
        let mut r = Report::new();
        r.add_error(path!(YAML, "local"), "missing");
        r.add_error(path!(JSON, "source"), "bad");
        let r = r.prefixed(&path!(YAML, "storage", "files", 3, "contents"));
        assert_eq!(
            r.entries[0].context,
            path!(YAML, "storage", "files", 3, "contents", "local")
        );
        assert_eq!(r.entries[1].context, path!(JSON, "source"));
    }

    #[test]
    fn test_correlate_walks_to_ancestor() {
        let mut locations = LocationMap::default();
        locations.insert(&path!(YAML, "storage"), Marker { line: 3, column: 1 });
        locations.insert(
            &path!(YAML, "storage", "files", 0),
            Marker { line: 5, column: 5 },
        );

        let mut r = Report::new();
        r.add_error(path!(YAML, "storage", "files", 0, "mode"), "bad mode");
        r.add_error(path!(YAML, "storage", "disks"), "bad disk");
        r.add_error(path!(JSON, "storage", "files", 0), "untouched");
        r.correlate(YAML, &locations);

        assert_eq!(r.entries[0].marker, Some(Marker { line: 5, column: 5 }));
        assert_eq!(r.entries[1].marker, Some(Marker { line: 3, column: 1 }));
        assert_eq!(r.entries[2].marker, None);
    }
}
