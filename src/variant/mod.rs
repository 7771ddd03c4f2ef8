//! Variant front ends. Every registered schema version is a [`Source`] that
//! knows how to translate itself into its [`Target`].

use anyhow::Context;
use butane_api::{
    config::base::v0_5,
    ignition::{keys, v3_4},
    path::{Path, JSON},
    validate::Validate,
    Report, TranslationSet,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    error::TranslateError,
    options::{TranslateBytesOptions, TranslateOptions},
    translate::{
        add_version_translations, merge_parent, mount_units, passwd, resource, systemd, tree,
        Translation, Translator,
    },
};

pub(crate) mod fcos;
pub(crate) mod filters;
pub mod openshift;
pub(crate) mod r4e;

/// A decoded source document of one registered schema version.
pub trait Source: DeserializeOwned + Validate {
    type Target: Target;

    fn translate(
        self,
        options: &TranslateBytesOptions,
    ) -> Result<Translation<Self::Target>, TranslateError>;
}

/// A generated document.
pub trait Target {
    /// Structural checks, reported at paths into the generated document.
    fn validate_target(&self) -> Result<Report, TranslateError>;

    fn encode(&self, pretty: bool) -> Result<Vec<u8>, TranslateError>;
}

impl<L: Serialize + Validate> Target for v3_4::Config<L> {
    fn validate_target(&self) -> Result<Report, TranslateError> {
        let root = Path::root(JSON);
        let mut r = self.validate(&root);
        let value = serde_json::to_value(self).context("Failed to serialize generated config")?;
        r.merge(keys::check_duplicates(&value, &root));
        Ok(r)
    }

    fn encode(&self, pretty: bool) -> Result<Vec<u8>, TranslateError> {
        let encoded = if pretty {
            serde_json::to_vec_pretty(self)
        } else {
            serde_json::to_vec(self)
        };
        Ok(encoded.context("Failed to encode Ignition config")?)
    }
}

/// Field walker with the translations every variant shares. Sugar fields that
/// later passes consume are skipped.
pub(crate) fn base_translator(options: &TranslateOptions) -> Translator<'_> {
    let translator = Translator::new(options)
        .skip("variant")
        .skip("version")
        .skip("storage.trees")
        .skip("storage.filesystems.*.with_mount_unit");
    resource::register(translator)
        .custom("systemd.units.*", systemd::translate_unit)
        .custom("passwd.users.*", passwd::translate_user)
}

/// Walks `source` with `translator`, then expands `storage`'s trees and adds
/// mount units for its filesystems.
pub(crate) fn translate_base<S, SL, L>(
    translator: Translator<'_>,
    source: &S,
    storage: &v0_5::Storage<SL>,
    options: &TranslateOptions,
) -> Result<Translation<v3_4::Config<L>>, TranslateError>
where
    S: Serialize,
    L: Serialize + DeserializeOwned,
{
    let (mut config, mut ts, mut r) = translator.translate::<_, v3_4::Config<L>>(source)?;
    r.merge(tree::process_trees(
        &storage.trees,
        &mut config.storage,
        &mut ts,
        options,
    )?);
    if let Some((parent, parent_ts)) = mount_units::build(&storage.filesystems) {
        (config, ts) = merge_parent(config, ts, parent, parent_ts)?;
    }
    Ok((config, ts, r))
}

/// Stamps the Ignition spec version onto `config`.
pub(crate) fn set_version<L>(config: &mut v3_4::Config<L>, ts: &mut TranslationSet, version: &str) {
    config.ignition.version = version.to_string();
    add_version_translations(ts, &Path::root(JSON));
}
