//! Ignition config spec 3.5.0: 3.4.0 plus CEX-bound LUKS volumes.

use serde::{Deserialize, Serialize};

pub use super::v3_4::{
    Clevis, ClevisCustom, Directory, Disk, Dropin, File, Filesystem, HttpHeader, Ignition,
    IgnitionConfig, KernelArguments, Link, NodeOwner, Partition, Passwd, PasswdGroup, PasswdUser,
    Proxy, Raid, Resource, Security, Systemd, Tang, Timeouts, Tls, Unit, Verification,
};
use crate::is_default;

pub const VERSION: &str = "3.5.0";

pub type Config = super::v3_4::Config<Luks>;
pub type Storage = super::v3_4::Storage<Luks>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Luks {
    #[serde(default, skip_serializing_if = "is_default")]
    pub cex: Cex,
    #[serde(default, skip_serializing_if = "is_default")]
    pub clevis: Clevis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discard: Option<bool>,
    #[serde(default, skip_serializing_if = "is_default")]
    pub key_file: Resource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub open_options: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wipe_volume: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}
