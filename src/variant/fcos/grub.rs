//! GRUB superuser configuration, appended to the bootloader's `user.cfg`.

use butane_api::{
    config::fcos::v1_5::Grub,
    path::{Path, JSON, YAML},
    TranslationSet,
};
use serde_json::{json, Value};

use crate::{error::TranslateError, options::TranslateOptions, translate::resource};

const BOOT_DEVICE: &str = "/dev/disk/by-label/boot";
const BOOT_MOUNT: &str = "/boot";
const USER_CFG: &str = "/boot/grub2/user.cfg";

fn user_cfg(grub: &Grub) -> String {
    let names: Vec<&str> = grub.users.iter().map(|user| user.name.as_str()).collect();
    let mut cfg = format!(
        "# Generated by Butane\n\nset superusers=\"{}\"\n",
        names.join(" ")
    );
    for user in &grub.users {
        cfg.push_str(&format!(
            "password_pbkdf2 {} {}\n",
            user.name,
            user.password_hash.as_deref().unwrap_or_default()
        ));
    }
    cfg
}

/// Builds the partial target mounting the boot filesystem and appending the
/// superusers to `user.cfg`, or `None` without GRUB users.
pub(crate) fn build(
    grub: &Grub,
    options: &TranslateOptions,
) -> Result<Option<(Value, TranslationSet)>, TranslateError> {
    if grub.users.is_empty() {
        return Ok(None);
    }
    let encoded = resource::encode(
        user_cfg(grub).as_bytes(),
        None,
        !options.no_resource_auto_compression,
    )?;
    let parent = json!({
        "storage": {
            "files": [{
                "append": [{
                    "compression": encoded.compression,
                    "source": encoded.source,
                }],
                "path": USER_CFG,
            }],
            "filesystems": [{
                "device": BOOT_DEVICE,
                "format": "ext4",
                "path": BOOT_MOUNT,
            }],
        }
    });

    let mut ts = TranslationSet::new(YAML, JSON);
    ts.add_from_common_source(
        &Path::root(YAML).append("grub").append("users"),
        &Path::root(JSON),
        &parent,
    );
    Ok(Some((parent, ts)))
}
