//! Fedora CoreOS: the base passes plus boot device and GRUB expansion.

use butane_api::{
    config::fcos::{v1_5, v1_6, BootLuks},
    ignition::{v3_4, v3_5},
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    error::TranslateError,
    options::{TranslateBytesOptions, TranslateOptions},
    translate::{merge_parent, Translation},
    variant::{base_translator, set_version, translate_base, Source},
};

pub(crate) mod boot_device;
pub(crate) mod grub;

/// Translates any Fedora CoreOS schema version into an Ignition config of
/// spec `version`.
pub(crate) fn translate<SL, L, B>(
    config: &v1_5::Config<SL, B>,
    options: &TranslateOptions,
    version: &str,
) -> Result<Translation<v3_4::Config<L>>, TranslateError>
where
    SL: Serialize,
    L: Serialize + DeserializeOwned,
    B: BootLuks + Serialize,
{
    let translator = base_translator(options).skip("boot_device").skip("grub");
    let (mut target, mut ts, r) = translate_base(translator, config, &config.storage, options)?;

    if let Some((parent, parent_ts)) = boot_device::build(&config.boot_device)? {
        (target, ts) = merge_parent(target, ts, parent, parent_ts)?;
    }
    if let Some((parent, parent_ts)) = grub::build(&config.grub, options)? {
        (target, ts) = merge_parent(target, ts, parent, parent_ts)?;
    }

    set_version(&mut target, &mut ts, version);
    Ok((target, ts, r))
}

impl Source for v1_5::Config {
    type Target = v3_4::Config;

    fn translate(
        self,
        options: &TranslateBytesOptions,
    ) -> Result<Translation<Self::Target>, TranslateError> {
        translate(&self, &options.translate, v3_4::VERSION)
    }
}

impl Source for v1_6::Config {
    type Target = v3_5::Config;

    fn translate(
        self,
        options: &TranslateBytesOptions,
    ) -> Result<Translation<Self::Target>, TranslateError> {
        translate(&self, &options.translate, v3_5::VERSION)
    }
}
