//! The closed set of `(variant, version)` pairs that can be translated.

use std::{collections::BTreeMap, fmt};

use butane_api::config::{fcos, openshift, r4e};
use lazy_static::lazy_static;
use semver::Version;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::{error::TranslateFailure, options::TranslateBytesOptions, run, Translated};

/// A registered source schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
pub enum Entry {
    Fcos1_5,
    Fcos1_6,
    OpenShift4_15,
    R4e1_1,
}

impl Entry {
    pub fn variant(self) -> &'static str {
        match self {
            Entry::Fcos1_5 | Entry::Fcos1_6 => "fcos",
            Entry::OpenShift4_15 => "openshift",
            Entry::R4e1_1 => "r4e",
        }
    }

    pub fn version(self) -> Version {
        match self {
            Entry::Fcos1_5 => Version::new(1, 5, 0),
            Entry::Fcos1_6 => Version::new(1, 6, 0),
            Entry::OpenShift4_15 => Version::new(4, 15, 0),
            Entry::R4e1_1 => Version::new(1, 1, 0),
        }
    }

    /// Decodes, validates and translates `input` with this entry's schema.
    pub(crate) fn translate(
        self,
        input: &str,
        options: &TranslateBytesOptions,
    ) -> Result<Translated, TranslateFailure> {
        match self {
            Entry::Fcos1_5 => run::<fcos::v1_5::Config>(input, options),
            Entry::Fcos1_6 => run::<fcos::v1_6::Config>(input, options),
            Entry::OpenShift4_15 => run::<openshift::v4_15::Config>(input, options),
            Entry::R4e1_1 => run::<r4e::v1_1::Config>(input, options),
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.variant(), self.version())
    }
}

lazy_static! {
    static ref REGISTRY: BTreeMap<&'static str, BTreeMap<Version, Entry>> =
        Entry::iter().fold(BTreeMap::new(), |mut registry, entry| {
            registry
                .entry(entry.variant())
                .or_insert_with(BTreeMap::new)
                .insert(entry.version(), entry);
            registry
        });
}

/// Finds the entry for an exact `(variant, version)` match. Pre-release and
/// build metadata are significant.
pub fn lookup(variant: &str, version: &Version) -> Option<Entry> {
    REGISTRY.get(variant)?.get(version).copied()
}

/// Every registered entry, ordered by variant and version.
pub fn entries() -> impl Iterator<Item = Entry> {
    REGISTRY.values().flat_map(|versions| versions.values().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(
            lookup("fcos", &Version::parse("1.5.0").unwrap()),
            Some(Entry::Fcos1_5)
        );
        assert_eq!(
            lookup("openshift", &Version::parse("4.15.0").unwrap()),
            Some(Entry::OpenShift4_15)
        );
        assert_eq!(lookup("fcos", &Version::parse("1.5.1").unwrap()), None);
        assert_eq!(
            lookup("fcos", &Version::parse("1.6.0-experimental").unwrap()),
            None
        );
        assert_eq!(lookup("rhcos", &Version::parse("1.5.0").unwrap()), None);
        assert_eq!(
            lookup("fcos", &Version::parse("1.5.0+build").unwrap()),
            None
        );
    }

    #[test]
    fn test_entries() {
        let names: Vec<String> = entries().map(|entry| entry.to_string()).collect();
        assert_eq!(
            names,
            vec!["fcos 1.5.0", "fcos 1.6.0", "openshift 4.15.0", "r4e 1.1.0"]
        );
    }
}
