use std::fmt::{self, Display};

use serde::{Serialize, Serializer};

/// Surface tag for paths into the YAML source document.
pub const YAML: &str = "yaml";

/// Surface tag for paths into the JSON target document.
pub const JSON: &str = "json";

/// One step of a [`Path`]: a record field or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathElement {
    Key(String),
    Index(usize),
}

impl Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Key(key) => f.write_str(key),
            PathElement::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathElement {
    fn from(key: &str) -> Self {
        PathElement::Key(key.to_string())
    }
}

impl From<String> for PathElement {
    fn from(key: String) -> Self {
        PathElement::Key(key)
    }
}

impl From<&String> for PathElement {
    fn from(key: &String) -> Self {
        PathElement::Key(key.clone())
    }
}

impl From<usize> for PathElement {
    fn from(index: usize) -> Self {
        PathElement::Index(index)
    }
}

/// A location inside a document, tagged with the surface (`yaml` or `json`)
/// whose field names it uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    tag: &'static str,
    elements: Vec<PathElement>,
}

/// Builds a [`Path`] from a tag and any number of elements.
///
/// ```
/// use butane_api::path;
///
/// let p = path!("yaml", "storage", "files", 0, "path");
/// assert_eq!(p.to_string(), "$.storage.files.0.path");
/// ```
#[macro_export]
macro_rules! path {
    ($tag:expr $(, $element:expr)* $(,)?) => {
        $crate::path::Path::new($tag, vec![$($crate::path::PathElement::from($element)),*])
    };
}

impl Path {
    pub fn new(tag: &'static str, elements: Vec<PathElement>) -> Self {
        Self { tag, elements }
    }

    /// The root of a document in the given surface.
    pub fn root(tag: &'static str) -> Self {
        Self::new(tag, Vec::new())
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn last(&self) -> Option<&PathElement> {
        self.elements.last()
    }

    /// Returns a new path with `element` appended.
    pub fn append(&self, element: impl Into<PathElement>) -> Self {
        let mut elements = self.elements.clone();
        elements.push(element.into());
        Self::new(self.tag, elements)
    }

    /// Returns a new path with every element of `other` appended. The tag of
    /// `other` is ignored.
    pub fn join(&self, other: &Path) -> Self {
        let mut elements = self.elements.clone();
        elements.extend(other.elements.iter().cloned());
        Self::new(self.tag, elements)
    }

    /// Returns the parent path, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.elements.is_empty() {
            return None;
        }
        Some(Self::new(
            self.tag,
            self.elements[..self.elements.len() - 1].to_vec(),
        ))
    }

    /// Returns the same elements under a different surface tag.
    pub fn retag(&self, tag: &'static str) -> Self {
        Self::new(tag, self.elements.clone())
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.elements.starts_with(&prefix.elements)
    }

    /// Strips `prefix` from the front of this path.
    pub fn strip_prefix(&self, prefix: &Path) -> Option<Self> {
        self.elements
            .strip_prefix(prefix.elements.as_slice())
            .map(|rest| Self::new(self.tag, rest.to_vec()))
    }

    /// Dotted form without list indices, e.g. `storage.files.contents`.
    pub fn index_stripped(&self) -> String {
        self.elements
            .iter()
            .filter_map(|e| match e {
                PathElement::Key(key) => Some(key.as_str()),
                PathElement::Index(_) => None,
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// RFC 6901 pointer into a `serde_json::Value` for this path.
    pub fn to_pointer(&self) -> String {
        let mut pointer = String::new();
        for element in &self.elements {
            pointer.push('/');
            match element {
                PathElement::Key(key) => pointer.push_str(&key.replace('~', "~0").replace('/', "~1")),
                PathElement::Index(index) => pointer.push_str(&index.to_string()),
            }
        }
        pointer
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for element in &self.elements {
            write!(f, ".{element}")?;
        }
        Ok(())
    }
}

impl Serialize for Path {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Glob-like pattern over paths where `*` matches any single list index.
///
/// Patterns are written in dotted form without the leading `$`, e.g.
/// `storage.files.*.contents`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    AnyIndex,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Self {
        let segments = pattern
            .split('.')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "*" => Segment::AnyIndex,
                key => Segment::Key(key.to_string()),
            })
            .collect();
        Self { segments }
    }

    /// Whether `path` matches the whole pattern.
    pub fn matches(&self, path: &Path) -> bool {
        self.segments.len() == path.elements.len()
            && self
                .segments
                .iter()
                .zip(&path.elements)
                .all(|(segment, element)| match (segment, element) {
                    (Segment::AnyIndex, PathElement::Index(_)) => true,
                    (Segment::Key(want), PathElement::Key(key)) => want == key,
                    _ => false,
                })
    }
}

impl Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<&str> = self
            .segments
            .iter()
            .map(|s| match s {
                Segment::Key(key) => key.as_str(),
                Segment::AnyIndex => "*",
            })
            .collect();
        f.write_str(&rendered.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Path::root(YAML).to_string(), "$");
        assert_eq!(
            path!(JSON, "storage", "files", 0, "contents").to_string(),
            "$.storage.files.0.contents"
        );
    }

    #[test]
    fn test_append_and_parent() {
        let base = path!(YAML, "storage");
        let files = base.append("files").append(2);
        assert_eq!(files, path!(YAML, "storage", "files", 2));
        assert_eq!(files.parent(), Some(path!(YAML, "storage", "files")));
        assert_eq!(Path::root(YAML).parent(), None);
        // appending never mutates the original
        assert_eq!(base, path!(YAML, "storage"));
    }

    #[test]
    fn test_equality_includes_tag() {
        assert_ne!(path!(YAML, "storage"), path!(JSON, "storage"));
        assert_eq!(path!(YAML, "storage").retag(JSON), path!(JSON, "storage"));
    }

    #[test]
    fn test_prefix_operations() {
        let p = path!(JSON, "spec", "config", "storage", "files", 1);
        let prefix = path!(JSON, "spec", "config");
        assert!(p.starts_with(&prefix));
        assert_eq!(
            p.strip_prefix(&prefix),
            Some(path!(JSON, "storage", "files", 1))
        );
        assert_eq!(p.strip_prefix(&path!(JSON, "metadata")), None);
        assert_eq!(prefix.join(&path!(YAML, "a", 0)), path!(JSON, "spec", "config", "a", 0));
    }

    #[test]
    fn test_index_stripped() {
        assert_eq!(
            path!(JSON, "storage", "disks", 3, "partitions", 0, "label").index_stripped(),
            "storage.disks.partitions.label"
        );
    }

    #[test]
    fn test_pointer_escaping() {
        assert_eq!(
            path!(JSON, "metadata", "labels", "machineconfiguration.openshift.io/role").to_pointer(),
            "/metadata/labels/machineconfiguration.openshift.io~1role"
        );
        assert_eq!(path!(JSON, "a", 0).to_pointer(), "/a/0");
        assert_eq!(Path::root(JSON).to_pointer(), "");
    }

    #[test]
    fn test_pattern_matching() {
        let pattern = PathPattern::new("storage.files.*.append");
        assert!(pattern.matches(&path!(JSON, "storage", "files", 4, "append")));
        assert!(!pattern.matches(&path!(JSON, "storage", "files", "append")));
        assert!(!pattern.matches(&path!(JSON, "storage", "files", 4)));
        assert_eq!(pattern.to_string(), "storage.files.*.append");
    }
}
