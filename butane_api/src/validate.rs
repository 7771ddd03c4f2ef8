use crate::{path::Path, report::Report};

/// Per-node semantic checks. Implementations report against paths under `c`,
/// the position of `self` in its document, and recurse into their children.
pub trait Validate {
    fn validate(&self, c: &Path) -> Report;
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        for (i, item) in self.iter().enumerate() {
            r.merge(item.validate(&c.append(i)));
        }
        r
    }
}

impl<T: Validate> Validate for Option<T> {
    fn validate(&self, c: &Path) -> Report {
        match self {
            Some(inner) => inner.validate(c),
            None => Report::new(),
        }
    }
}
