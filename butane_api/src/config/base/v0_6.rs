//! Base schema 0.6: schema 0.5 plus IBM Crypto Express (CEX) bound LUKS
//! volumes.

use serde::{Deserialize, Serialize};

pub use super::v0_5::{
    Clevis, ClevisCustom, Directory, Disk, Dropin, File, Filesystem, HttpHeader, Ignition,
    IgnitionConfig, KernelArguments, Link, Owner, Partition, Passwd, PasswdGroup, PasswdUser,
    Proxy, Raid, Resource, Security, Systemd, Tang, Timeouts, Tls, Tree, Unit, Verification,
};
use crate::{path::Path, report::Report, validate::Validate};

pub type Config = super::v0_5::Config<Luks>;
pub type Storage = super::v0_5::Storage<Luks>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Luks {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default)]
    pub cex: Cex,
    #[serde(default)]
    pub clevis: Clevis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discard: Option<bool>,
    #[serde(default)]
    pub key_file: Resource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub open_options: Vec<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wipe_volume: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl Validate for Luks {
    fn validate(&self, c: &Path) -> Report {
        self.key_file.validate(&c.append("key_file"))
    }
}
